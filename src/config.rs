//! Domain configuration for the lending engine.
//!
//! The loan period and claim window are policy knobs, not protocol
//! constants: deployments tune them without code changes. Defaults are
//! 14 days to return a book and 24 hours to claim a reserved copy.

use chrono::Duration as ChronoDuration;
use std::time::Duration;

/// Default loan period in days.
pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;

/// Default claim window in hours for notified queue entries.
pub const DEFAULT_CLAIM_WINDOW_HOURS: i64 = 24;

/// Default interval between expiry sweeps in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Policy configuration shared by the engine and the expiry scheduler.
#[derive(Debug, Clone, Copy)]
pub struct LendingConfig {
    /// How long a student keeps an allocated book before it is due.
    pub loan_period_days: i64,
    /// How long a notified student has to claim a reserved copy.
    pub claim_window_hours: i64,
    /// How often the scheduler sweeps for expired notifications.
    pub sweep_interval: Duration,
}

impl LendingConfig {
    /// Loan period as a chrono duration for due-date arithmetic.
    #[must_use]
    pub fn loan_period(&self) -> ChronoDuration {
        ChronoDuration::days(self.loan_period_days)
    }

    /// Claim window as a chrono duration for expiry arithmetic.
    #[must_use]
    pub fn claim_window(&self) -> ChronoDuration {
        ChronoDuration::hours(self.claim_window_hours)
    }
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            claim_window_hours: DEFAULT_CLAIM_WINDOW_HOURS,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}
