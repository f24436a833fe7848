//! Daily schedule trigger.
//!
//! Fires the orchestrator once per day at a fixed UTC wall-clock time.
//! Sleep-until rather than a fixed interval, so restarts never drift the
//! fire time.

use crate::orchestrator::{Orchestrator, RunOptions};
use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

/// Next `hour:minute` UTC occurrence strictly after `now`.
///
/// If today's fire time has already passed (or is exactly now), the result
/// rolls over to tomorrow. `hour`/`minute` must be a valid wall-clock time;
/// config loading rejects anything else.
pub fn next_fire(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    debug_assert!(hour <= 23 && minute <= 59, "fire time out of range");

    let today_fire = now
        .with_hour(hour)
        .and_then(|t| t.with_minute(minute))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    if today_fire > now {
        today_fire
    } else {
        today_fire + Duration::days(1)
    }
}

pub struct ScheduleTrigger {
    orchestrator: Arc<Orchestrator>,
    hour: u32,
    minute: u32,
}

impl ScheduleTrigger {
    pub fn new(orchestrator: Arc<Orchestrator>, hour: u32, minute: u32) -> Self {
        Self {
            orchestrator,
            hour,
            minute,
        }
    }

    /// Runs forever, firing a full unforced sweep once per day.
    pub async fn run(self) {
        loop {
            let now = Utc::now();
            let fire_at = next_fire(now, self.hour, self.minute);
            let wait = (fire_at - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            info!(fire_at = %fire_at, "Next scheduled sync run");
            sleep(wait).await;

            match self.orchestrator.run(RunOptions::default()).await {
                Ok(report) => {
                    info!(
                        tenants = report.total,
                        updated = ?report.updated,
                        errors = ?report.errors,
                        "Scheduled sync run completed"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Scheduled sync run aborted");
                }
            }
        }
    }
}
