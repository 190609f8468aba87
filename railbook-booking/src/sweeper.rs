use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::service::BookingService;

/// Periodic reclaim of lapsed holds. Expiry is enforced at write time by
/// the store's deadline checks; the sweeper only settles the record,
/// flipping overdue pending bookings to expired and their seats to free.
pub struct Sweeper {
    service: Arc<BookingService>,
    period: Duration,
}

impl Sweeper {
    pub fn new(service: Arc<BookingService>, period: Duration) -> Self {
        Self { service, period }
    }

    /// Runs until the task is dropped. A failed pass is logged and
    /// retried on the next tick; stale rows are reclaimed then.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = self.period.as_secs(), "expiry sweeper started");

        loop {
            ticker.tick().await;
            match self.service.sweep_once().await {
                Ok(0) => debug!("sweep pass found nothing to reclaim"),
                Ok(n) => info!(expired = n, "reclaimed lapsed bookings"),
                Err(e) => error!(error = %e, "sweep pass failed"),
            }
        }
    }
}
