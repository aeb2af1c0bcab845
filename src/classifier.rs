//! Duplicate/Failure Classifier.
//!
//! Runs right after a submission. Each poll looks for the duplicate-document
//! banner first, then the expected success signal, then any other error
//! banner. Nothing within the bound means the outcome is still unknown.

use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use crate::driver::{Browser, DriverError};
use crate::locator::{LocatorStrategy, Resolution, resolve};
use crate::targets;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// The identity document already holds a ticket.
    Duplicate,
    /// Neither signal appeared within the bound.
    Transient,
    /// An error banner the classifier does not recognise, with its text.
    UnknownError(String),
}

pub struct Classifier {
    budget: Duration,
    poll: Duration,
}

impl Classifier {
    pub fn new(budget: Duration, poll: Duration) -> Self {
        Self { budget, poll }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub async fn classify<B: Browser>(
        &self,
        browser: &mut B,
        expected: &LocatorStrategy,
    ) -> Result<Classification, DriverError> {
        self.classify_within(browser, expected, self.budget).await
    }

    /// Like [`classify`](Self::classify) with a different bound, for slow confirmations.
    pub async fn classify_within<B: Browser>(
        &self,
        browser: &mut B,
        expected: &LocatorStrategy,
        budget: Duration,
    ) -> Result<Classification, DriverError> {
        let duplicate = targets::duplicate_banner();
        let banner = targets::error_banner();
        let deadline = Instant::now() + budget;
        let mut polls = 0u32;

        loop {
            polls += 1;
            let allowance = deadline
                .saturating_duration_since(Instant::now())
                .max(self.poll);
            match timeout(allowance, self.inspect(browser, &duplicate, expected, &banner)).await {
                Ok(Ok(Some(found))) => {
                    debug!(?found, polls, "submission classified");
                    return Ok(found);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                Ok(Err(e)) => debug!(error = %e, "classification poll failed"),
                Err(_) => debug!(polls, "classification poll ran past the deadline"),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(self.poll.min(deadline - now)).await;
        }
        Ok(Classification::Transient)
    }

    async fn inspect<B: Browser>(
        &self,
        browser: &mut B,
        duplicate: &LocatorStrategy,
        expected: &LocatorStrategy,
        banner: &LocatorStrategy,
    ) -> Result<Option<Classification>, DriverError> {
        if let Resolution::Found { .. } = resolve(browser, duplicate).await? {
            return Ok(Some(Classification::Duplicate));
        }
        if let Resolution::Found { .. } = resolve(browser, expected).await? {
            return Ok(Some(Classification::Success));
        }
        if let Resolution::Found { element, .. } = resolve(browser, banner).await? {
            let text = browser.text(&element).await?;
            return Ok(Some(Classification::UnknownError(text)));
        }
        Ok(None)
    }
}
