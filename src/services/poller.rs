// src/services/poller.rs
//! Fixed-interval polling for long-running generation jobs.
//!
//! [`poll_until_done`] sleeps for [`PollConfig::interval`] before each
//! check and gives up after [`PollConfig::max_attempts`] checks, returning
//! [`PollOutcome::TimedOut`] instead of looping forever.

use crate::errors::CampaignError;
use log::debug;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before every check.
    pub interval: Duration,
    /// Upper bound on the number of checks.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32 },
}

/// Run `check` until it yields `Some`, an error, or the attempt budget is spent.
pub async fn poll_until_done<T, F, Fut>(
    config: &PollConfig,
    mut check: F,
) -> Result<PollOutcome<T>, CampaignError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, CampaignError>>,
{
    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.interval).await;

        debug!("Polling job, attempt {}/{}", attempt, config.max_attempts);
        if let Some(value) = check(attempt).await? {
            return Ok(PollOutcome::Ready(value));
        }
    }

    Ok(PollOutcome::TimedOut {
        attempts: config.max_attempts,
    })
}
