use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::models::SweepReport;
use crate::services::booking::AppointmentService;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Wakes the promotion sweep outside its regular interval.
#[derive(Clone, Default)]
pub struct SweepHandle {
    notify: Arc<Notify>,
}

impl SweepHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_now(&self) {
        self.notify.notify_one();
    }

    /// Request a sweep right away if `deadline` has already passed. Future
    /// deadlines are picked up by the regular interval. Returns whether a
    /// sweep was requested.
    pub fn request_if_elapsed(&self, deadline: DateTime<Utc>) -> bool {
        if deadline > Utc::now() {
            return false;
        }
        self.request_now();
        true
    }

    async fn requested(&self) {
        self.notify.notified().await;
    }
}

/// Recurring task that promotes elapsed appointments and finishes stranded
/// cancellations. Runs with the service's own credentials.
pub struct PromotionSweeper {
    service: Arc<AppointmentService>,
    interval: Duration,
    handle: SweepHandle,
}

impl PromotionSweeper {
    pub fn new(service: Arc<AppointmentService>, interval: Duration, handle: SweepHandle) -> Self {
        Self {
            service,
            interval: interval.max(MIN_SWEEP_INTERVAL),
            handle,
        }
    }

    /// One pass. Stranded cancellations are finished before promotion so an
    /// elapsed appointment with a cancellation record ends up cancelled.
    /// Failures are logged and retried on the next pass.
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.service.reconcile_cancellations(None).await {
            Ok(reconciled) => report.reconciled = reconciled,
            Err(e) => error!("Cancellation reconciliation failed: {}", e),
        }

        match self.service.promote_elapsed(Utc::now(), None).await {
            Ok(promoted) => report.promoted = promoted.len(),
            Err(e) => error!("Promotion sweep failed: {}", e),
        }

        debug!("Sweep pass finished: {:?}", report);
        report
    }

    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        info!("Promotion sweep started (every {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping promotion sweep");
                    break;
                }
                _ = ticker.tick() => {}
                _ = self.handle.requested() => {
                    debug!("Promotion sweep requested");
                }
            }

            self.run_once().await;
        }
    }
}
