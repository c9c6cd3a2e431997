use std::env;
use tracing::warn;

const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
const DEFAULT_TIMEZONE_LABEL: &str = "Asia/Kolkata";
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 600;
const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    /// Fixed civil offset every slot label is rendered in.
    pub clinic_utc_offset_minutes: i32,
    pub clinic_timezone_label: String,
    pub promotion_sweep_interval_seconds: u64,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            clinic_utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            clinic_timezone_label: DEFAULT_TIMEZONE_LABEL.to_string(),
            promotion_sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, promotion sweep will use the anon key");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: parse_offset(env::var("CLINIC_UTC_OFFSET_MINUTES").ok()),
            clinic_timezone_label: env::var("CLINIC_TIMEZONE_LABEL")
                .unwrap_or_else(|_| DEFAULT_TIMEZONE_LABEL.to_string()),
            promotion_sweep_interval_seconds: parse_or_default(
                "PROMOTION_SWEEP_INTERVAL_SECONDS",
                env::var("PROMOTION_SWEEP_INTERVAL_SECONDS").ok(),
                DEFAULT_SWEEP_INTERVAL_SECONDS,
            ),
            server_port: parse_or_default(
                "SERVER_PORT",
                env::var("SERVER_PORT").ok(),
                DEFAULT_SERVER_PORT,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key used by background jobs that run without a caller token.
    pub fn background_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_offset(raw: Option<String>) -> i32 {
    let Some(raw) = raw else {
        return DEFAULT_UTC_OFFSET_MINUTES;
    };

    match raw.trim().parse::<i32>() {
        Ok(minutes) if minutes.abs() <= MAX_UTC_OFFSET_MINUTES => minutes,
        Ok(minutes) => {
            warn!("CLINIC_UTC_OFFSET_MINUTES={} is out of range, using {}", minutes, DEFAULT_UTC_OFFSET_MINUTES);
            DEFAULT_UTC_OFFSET_MINUTES
        }
        Err(_) => {
            warn!("CLINIC_UTC_OFFSET_MINUTES={:?} is not a number, using {}", raw, DEFAULT_UTC_OFFSET_MINUTES);
            DEFAULT_UTC_OFFSET_MINUTES
        }
    }
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{}={:?} is invalid, using {}", name, value, default);
            default
        }),
        None => default,
    }
}
