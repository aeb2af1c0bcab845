//! Step Executor: find a control in the remote document, then act on it.
//!
//! Every step polls at a fixed interval up to its budget and re-resolves the
//! target on each poll, since the remote UI recreates elements freely. A
//! timing miss is reported as [`StepOutcome::Transient`], never as an error;
//! only a lost session escapes as `Err`.

use std::fmt;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use crate::driver::{Browser, ClickStyle, DriverError, ElementId};
use crate::locator::{LocatorStrategy, Resolution, resolve};

/// Whether the browser renders a visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Headless,
    Visible,
}

impl Mode {
    pub fn from_headless(headless: bool) -> Self {
        if headless { Mode::Headless } else { Mode::Visible }
    }

    /// Headless sessions click from script; visible ones scroll and click natively.
    pub fn click_style(self) -> ClickStyle {
        match self {
            Mode::Headless => ClickStyle::Script,
            Mode::Visible => ClickStyle::Native,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Headless => write!(f, "headless"),
            Mode::Visible => write!(f, "visible"),
        }
    }
}

/// Wait budgets per operating mode plus the shared poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub headless: Duration,
    pub visible: Duration,
    pub poll: Duration,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            headless: Duration::from_millis(3000),
            visible: Duration::from_millis(5000),
            poll: Duration::from_millis(250),
        }
    }
}

impl Budgets {
    pub fn for_mode(&self, mode: Mode) -> Duration {
        match mode {
            Mode::Headless => self.headless,
            Mode::Visible => self.visible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click,
    TypeText(String),
    ReadText,
    WaitForPresence,
    WaitForAbsence,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click => write!(f, "click"),
            Action::TypeText(_) => write!(f, "type"),
            Action::ReadText => write!(f, "read"),
            Action::WaitForPresence => write!(f, "wait for"),
            Action::WaitForAbsence => write!(f, "wait for absence of"),
        }
    }
}

/// Result of one step, with enough context to diagnose it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded {
        /// Predicate that resolved the target; `None` when absence was awaited.
        matched: Option<String>,
        /// Captured text for [`Action::ReadText`].
        text: Option<String>,
    },
    /// The budget ran out; the caller decides whether to retry.
    Transient {
        target: String,
        attempted: Vec<String>,
        detail: Option<String>,
    },
    /// The driver refused the action in a way retrying will not fix.
    Terminal { target: String, detail: String },
}

enum Applied {
    Done(Option<String>),
    StillPresent,
}

pub struct StepExecutor {
    mode: Mode,
    budgets: Budgets,
}

impl StepExecutor {
    pub fn new(mode: Mode, budgets: Budgets) -> Self {
        Self { mode, budgets }
    }

    /// Perform `action` on `target` within the current mode's budget.
    pub async fn perform<B: Browser>(
        &self,
        browser: &mut B,
        target: &LocatorStrategy,
        action: &Action,
    ) -> Result<StepOutcome, DriverError> {
        self.perform_within(browser, target, action, self.budgets.for_mode(self.mode))
            .await
    }

    /// Perform `action` on `target`, polling for at most `budget`.
    pub async fn perform_within<B: Browser>(
        &self,
        browser: &mut B,
        target: &LocatorStrategy,
        action: &Action,
        budget: Duration,
    ) -> Result<StepOutcome, DriverError> {
        let deadline = Instant::now() + budget;
        let mut attempted = Vec::new();
        let mut detail = None;
        let mut polls = 0u32;

        loop {
            polls += 1;
            // A lookup may run past the deadline by at most one poll interval.
            let allowance = deadline
                .saturating_duration_since(Instant::now())
                .max(self.budgets.poll);

            match timeout(allowance, resolve(browser, target)).await {
                Err(_) => detail = Some(format!("lookup exceeded {}ms", budget.as_millis())),
                Ok(Ok(Resolution::Found { element, matched })) => {
                    match self.apply(browser, &element, action).await {
                        Ok(Applied::Done(text)) => {
                            debug!(step = target.name(), %action, %matched, polls, "step done");
                            return Ok(StepOutcome::Succeeded {
                                matched: Some(matched),
                                text,
                            });
                        }
                        Ok(Applied::StillPresent) => {
                            detail = Some(format!("still present via {matched}"));
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) if e.is_transient() => detail = Some(e.to_string()),
                        Err(e) => {
                            return Ok(StepOutcome::Terminal {
                                target: target.name().to_string(),
                                detail: e.to_string(),
                            });
                        }
                    }
                }
                Ok(Ok(Resolution::Missing { attempted: tried })) => {
                    if *action == Action::WaitForAbsence {
                        return Ok(StepOutcome::Succeeded {
                            matched: None,
                            text: None,
                        });
                    }
                    attempted = tried;
                }
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                // The document changed under the lookup; the next poll starts fresh.
                Ok(Err(e)) => detail = Some(e.to_string()),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(self.budgets.poll.min(deadline - now)).await;
        }

        debug!(step = target.name(), %action, polls, "step timed out");
        Ok(StepOutcome::Transient {
            target: target.name().to_string(),
            attempted,
            detail,
        })
    }

    async fn apply<B: Browser>(
        &self,
        browser: &mut B,
        element: &ElementId,
        action: &Action,
    ) -> Result<Applied, DriverError> {
        match action {
            Action::Click => {
                browser.click(element, self.mode.click_style()).await?;
                Ok(Applied::Done(None))
            }
            Action::TypeText(text) => {
                browser.type_text(element, text).await?;
                Ok(Applied::Done(None))
            }
            Action::ReadText => Ok(Applied::Done(Some(browser.text(element).await?))),
            Action::WaitForPresence => Ok(Applied::Done(None)),
            Action::WaitForAbsence => Ok(Applied::StillPresent),
        }
    }
}
