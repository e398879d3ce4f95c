use anyhow::Result;
use log::{debug, error, info, warn};

use crate::alerts::{Alert, DeviceInfo};
use crate::classifier::{Category, Classifier, PauseReason};
use crate::clock::Clock;
use crate::config::{CategoriesConfig, constants};
use crate::error::error_kind;
use crate::event_log::{EventLog, EventTag};
use crate::notifier::Notifier;
use crate::tailer::LineSource;

/// Debounce flags for one monitoring session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailState {
    /// A pause has been reported and no resume has been seen since.
    pub paused_sent: bool,
    /// A completion has been reported in this session.
    pub complete_sent: bool,
}

/// Why the monitoring loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A print-complete line was seen.
    Completed { line: String },
    /// An error line was seen; `lines` holds it first, then any related
    /// shutdown lines collected afterwards.
    Failed { lines: Vec<String> },
}

/// One monitoring session over a log source.
///
/// Each new line is classified and the matching category's notification and
/// event record are produced. The session ends on the first completion or
/// error and cannot be resumed.
pub struct Monitor<'a, S, N: ?Sized, C> {
    source: S,
    classifier: Classifier,
    categories: CategoriesConfig,
    notifier: &'a N,
    event_log: &'a EventLog,
    device: DeviceInfo,
    clock: C,
    state: TailState,
}

impl<'a, S, N, C> Monitor<'a, S, N, C>
where
    S: LineSource,
    N: Notifier + ?Sized,
    C: Clock,
{
    pub fn new(
        source: S,
        categories: &CategoriesConfig,
        notifier: &'a N,
        event_log: &'a EventLog,
        device: DeviceInfo,
        clock: C,
    ) -> Self {
        Self {
            source,
            classifier: Classifier::new(categories),
            categories: categories.clone(),
            notifier,
            event_log,
            device,
            clock,
            state: TailState::default(),
        }
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    /// Process lines until a completion or error ends the session.
    ///
    /// # Errors
    ///
    /// Returns the first failure from reading the log, sending email or
    /// writing the event log. Nothing is retried.
    pub fn run(&mut self) -> Result<Outcome> {
        info!("Printer monitor watching for new log lines");
        loop {
            if let Some(outcome) = self.step()? {
                return Ok(outcome);
            }
        }
    }

    /// Handle at most one new line, or sleep one poll interval if none is ready.
    pub fn step(&mut self) -> Result<Option<Outcome>> {
        match self.source.next_line()? {
            Some(line) => self.handle_line(&line),
            None => {
                self.clock.sleep(constants::POLL_INTERVAL);
                Ok(None)
            }
        }
    }

    fn handle_line(&mut self, raw: &str) -> Result<Option<Outcome>> {
        let Some(category) = self.classifier.classify(raw) else {
            return Ok(None);
        };
        let line = raw.trim();
        debug!("Line matched {}: {}", category, line);

        match category {
            Category::Complete => {
                if self.state.complete_sent {
                    return Ok(None);
                }
                if self.categories.complete.notify {
                    self.notifier
                        .send_alert(&Alert::print_complete(&self.device, line))?;
                }
                self.record(Category::Complete, line)?;
                self.state.paused_sent = false;
                self.state.complete_sent = true;
                info!("Print complete: {}", line);
                Ok(Some(Outcome::Completed {
                    line: line.to_string(),
                }))
            }
            Category::Pause => {
                if self.state.paused_sent {
                    debug!("Pause already reported, ignoring: {}", line);
                    return Ok(None);
                }
                let reason = PauseReason::from_line(line);
                if self.categories.pause.notify {
                    self.notifier
                        .send_alert(&Alert::print_paused(&self.device, reason, line))?;
                }
                self.record(Category::Pause, line)?;
                self.state.paused_sent = true;
                self.state.complete_sent = false;
                info!("Print paused ({}): {}", reason, line);
                Ok(None)
            }
            Category::Resume => {
                self.record(Category::Resume, line)?;
                self.state.paused_sent = false;
                info!("Print resumed: {}", line);
                Ok(None)
            }
            Category::Error => {
                let rule = &self.categories.error;
                if !rule.notify && !rule.log {
                    warn!("Shutdown detected with error reporting disabled: {}", line);
                    return Ok(Some(Outcome::Failed {
                        lines: vec![line.to_string()],
                    }));
                }

                let lines = self.collect_shutdown_lines(line)?;
                if self.categories.error.notify {
                    self.notifier
                        .send_alert(&Alert::print_failed(&self.device, &lines))?;
                }
                for collected in &lines {
                    self.record(Category::Error, collected)?;
                }
                Ok(Some(Outcome::Failed { lines }))
            }
            Category::Custom => {
                if self.categories.custom.notify {
                    self.notifier
                        .send_alert(&Alert::custom_match(&self.device, line))?;
                }
                self.record(Category::Custom, line)?;
                Ok(None)
            }
        }
    }

    /// Gather shutdown lines that follow an error line for a fixed window.
    fn collect_shutdown_lines(&mut self, trigger: &str) -> Result<Vec<String>> {
        warn!(
            "Shutdown detected, collecting related log lines for {} seconds",
            constants::SHUTDOWN_COLLECT_WINDOW.as_secs()
        );

        let mut lines = vec![trigger.to_string()];
        let deadline = self.clock.now() + constants::SHUTDOWN_COLLECT_WINDOW;

        while self.clock.now() < deadline {
            match self.source.next_line()? {
                Some(next) => {
                    if next.to_lowercase().contains(constants::SHUTDOWN_MARKER) {
                        lines.push(next.trim().to_string());
                    }
                }
                None => self.clock.sleep(constants::COLLECT_POLL_INTERVAL),
            }
        }

        info!("Collected {} shutdown line(s)", lines.len());
        Ok(lines)
    }

    fn record(&self, category: Category, message: &str) -> Result<()> {
        if self.categories.rule(category).log {
            self.event_log.record(EventTag::from(category), message)?;
        }
        Ok(())
    }
}

/// Report an error that escaped the monitoring loop.
///
/// The error is logged, written to the event log as `SCRIPT_ERROR`, and sent
/// through the notifier. Failures while reporting are logged and dropped.
pub fn report_fatal<N: Notifier + ?Sized>(
    err: &anyhow::Error,
    event_log: &EventLog,
    notifier: &N,
    device: &DeviceInfo,
) {
    let message = format!("Exception occurred: {}: {}", error_kind(err), err);
    error!("{}", message);

    if let Err(e) = event_log.record(EventTag::ScriptError, &message) {
        error!("Failed to record script error: {:#}", e);
    }
    if let Err(e) = notifier.send_exception(device, err) {
        error!("Failed to send script error email: {:#}", e);
    }
}
