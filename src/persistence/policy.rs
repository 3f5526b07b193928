use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Interval used by [`PersistencePolicy::default`].
pub const DEFAULT_PERIODIC_INTERVAL: Duration = Duration::from_secs(60);
/// Delay used when a debounced policy is requested without one.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_secs(5);

/// Shortest interval or delay a policy will actually use.
pub(crate) const MIN_TIMER: Duration = Duration::from_millis(10);

/// When a database's engine state gets written to its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Flush on a fixed interval regardless of activity. A tick that finds a flush still in
    /// flight is skipped.
    Periodic { interval_ms: u64 },
    /// Flush once, `delay_ms` after the most recent committed transaction.
    Debounced { delay_ms: u64 },
    /// Flush after every committed transaction, before its success callback runs.
    AfterCommit,
    /// Flush only when asked to.
    Manual,
}

impl Default for PersistencePolicy {
    fn default() -> Self {
        Self::periodic(DEFAULT_PERIODIC_INTERVAL)
    }
}

impl PersistencePolicy {
    #[must_use]
    pub fn periodic(interval: Duration) -> Self {
        Self::Periodic {
            interval_ms: duration_ms(interval),
        }
    }

    #[must_use]
    pub fn debounced(delay: Duration) -> Self {
        Self::Debounced {
            delay_ms: duration_ms(delay),
        }
    }

    /// Build a policy from a CLI-style mode plus an optional timer duration.
    #[must_use]
    pub fn from_mode(mode: PersistenceMode, timer: Option<Duration>) -> Self {
        match mode {
            PersistenceMode::Periodic => {
                Self::periodic(timer.unwrap_or(DEFAULT_PERIODIC_INTERVAL))
            }
            PersistenceMode::Debounced => Self::debounced(timer.unwrap_or(DEFAULT_DEBOUNCE_DELAY)),
            PersistenceMode::AfterCommit => Self::AfterCommit,
            PersistenceMode::Manual => Self::Manual,
        }
    }

    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        match self {
            Self::Periodic { .. } => PersistenceMode::Periodic,
            Self::Debounced { .. } => PersistenceMode::Debounced,
            Self::AfterCommit => PersistenceMode::AfterCommit,
            Self::Manual => PersistenceMode::Manual,
        }
    }

    /// The interval or delay this policy runs on, clamped to a small minimum.
    #[must_use]
    pub fn timer(&self) -> Option<Duration> {
        match self {
            Self::Periodic { interval_ms } => Some(Duration::from_millis(*interval_ms)),
            Self::Debounced { delay_ms } => Some(Duration::from_millis(*delay_ms)),
            Self::AfterCommit | Self::Manual => None,
        }
        .map(|timer| timer.max(MIN_TIMER))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Flush strategy names, as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum PersistenceMode {
    Periodic,
    Debounced,
    AfterCommit,
    Manual,
}
