//! Periodic acquisition scheduler
//!
//! Waits out a startup delay, then asks the engine thread for one cycle per
//! period. A failed cycle is logged and the schedule carries on; only a dead
//! engine thread ends the loop.

use crate::{AppState, CycleOutcome};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

/// Timing of the measurement schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time between cycle starts
    pub period: Duration,
    /// Delay before the first cycle
    pub startup_delay: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
            startup_delay: Duration::from_millis(2000),
        }
    }
}

/// Run cycles on `schedule` until the engine thread goes away
pub async fn run_scheduler(state: AppState, schedule: Schedule) {
    tokio::time::sleep(schedule.startup_delay).await;

    let mut interval = tokio::time::interval(schedule.period.max(Duration::from_millis(1)));
    // A slow cycle pushes the schedule back instead of bursting to catch up
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match state.measure_now().await {
            Ok(report) => {
                if let CycleOutcome::Failed(fault) = report.outcome {
                    debug!(error = %fault, "Scheduled cycle failed, retrying next period");
                }
            }
            Err(e) => {
                error!("Scheduler stopping: {}", e);
                break;
            }
        }
    }
}
