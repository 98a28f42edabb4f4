//! Interactive emergency flow
//!
//! Reads one line at a time and turns it into a controller call. The shell
//! never changes steps itself; it only renders the view the controller
//! returns. In tracking the ETA ticks on a timer while input stays open.

use anyhow::Result;
use healers_common::dispatch::{
    DispatchController, DispatchError, SessionView, Step, Trigger, Variant,
};
use healers_common::error::HealersError;
use healers_common::sms::{NotificationClient, SmsTransport};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::commands::situation_too_short;
use crate::output;
use crate::spinner::Spinner;

/// One simulated minute
pub const ETA_TICK: Duration = Duration::from_secs(60);

/// A line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Continue,
    Skip,
    Text(String),
}

impl Action {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "quit" | "q" | "close" | "exit" => Action::Quit,
            "" | "continue" | "c" => Action::Continue,
            "skip" | "s" => Action::Skip,
            _ => Action::Text(trimmed.to_string()),
        }
    }
}

/// Line reader that tolerates bytes which are not UTF-8
///
/// Partial reads stay buffered, so `next_line` can sit in a `select!` arm.
struct InputLines<R> {
    input: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> InputLines<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.input.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(&['\n', '\r'][..])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// How an emergency flow ended
#[derive(Debug, Clone, PartialEq)]
pub enum SosOutcome {
    /// Tracking reached and every ETA ran down
    HelpArrived(SessionView),
    /// User closed the flow (or input ended) before help arrived
    Closed { at: Option<Step> },
}

pub struct SosShell<T: SmsTransport> {
    controller: DispatchController,
    notifier: Option<NotificationClient<T>>,
    eta_tick: Duration,
    min_situation_chars: usize,
}

impl<T: SmsTransport> SosShell<T> {
    pub fn new(controller: DispatchController, notifier: Option<NotificationClient<T>>) -> Self {
        Self {
            controller,
            notifier,
            eta_tick: ETA_TICK,
            min_situation_chars: 10,
        }
    }

    pub fn with_min_situation_chars(mut self, min: usize) -> Self {
        self.min_situation_chars = min;
        self
    }

    pub fn with_eta_tick(mut self, tick: Duration) -> Self {
        self.eta_tick = tick;
        self
    }

    pub fn notifier(&self) -> Option<&NotificationClient<T>> {
        self.notifier.as_ref()
    }

    pub fn controller(&self) -> &DispatchController {
        &self.controller
    }

    /// Drive one emergency flow to its end. The session is closed on every
    /// exit, including errors.
    pub async fn run<R, W>(&self, variant: Variant, input: R, out: &mut W) -> Result<SosOutcome>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let result = self.drive(variant, InputLines::new(input), out).await;
        if let Err(e) = &result {
            warn!("Emergency flow aborted: {:#}", e);
            self.controller.close();
        }
        result
    }

    async fn drive<R, W>(
        &self,
        variant: Variant,
        mut lines: InputLines<R>,
        out: &mut W,
    ) -> Result<SosOutcome>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let opened = self
            .controller
            .open(variant)
            .await
            .map_err(HealersError::from)?;
        let mut view = self.enter(opened, out).await?;

        loop {
            if view.step == Step::Tracking {
                return self.track(view, &mut lines, out).await;
            }

            let Some(line) = lines.next_line().await? else {
                return Ok(self.close(out)?);
            };

            let action = Action::parse(&line);
            if action == Action::Quit {
                return Ok(self.close(out)?);
            }

            match self.handle(&view, action, out).await {
                Ok(Some(next)) => {
                    view = if next.step != view.step {
                        self.enter(next, out).await?
                    } else {
                        next
                    };
                }
                Ok(None) => {}
                Err(e) => match e.downcast_ref::<DispatchError>() {
                    Some(DispatchError::Closed) => return Ok(SosOutcome::Closed { at: None }),
                    Some(dispatch) => output::failure(out, &dispatch.to_string())?,
                    None => return Err(e),
                },
            }
        }
    }

    /// Apply one action to the current step. `None` means nothing changed.
    /// Rejected actions come back as a `DispatchError` inside the error.
    async fn handle<W: Write>(
        &self,
        view: &SessionView,
        action: Action,
        out: &mut W,
    ) -> Result<Option<SessionView>> {
        match (view.step, action) {
            (Step::Contact, Action::Text(number)) => {
                self.controller.set_contact(&number)?;
                output::success(out, &format!("Emergency contact saved: {}", number.trim()))?;
                Ok(Some(self.controller.advance(Trigger::Continue).await?))
            }
            (Step::Guidance, Action::Text(situation))
                if situation.chars().count() < self.min_situation_chars =>
            {
                output::failure(out, &situation_too_short(self.min_situation_chars))?;
                Ok(None)
            }
            (Step::Guidance, Action::Text(situation)) => {
                let spinner = Spinner::new("Generating instructions...");
                let result = self.controller.submit_situation(&situation).await;
                spinner.stop();
                let view = result?;
                output::instructions(out, &view)?;
                Ok(Some(view))
            }
            (Step::Location, _) => {
                output::hint(out, "Location is required to dispatch help. Type 'quit' to close.")?;
                Ok(None)
            }
            (_, Action::Text(_)) => {
                output::hint(out, "Type 'continue', 'skip' or 'quit'.")?;
                Ok(None)
            }
            (_, Action::Continue) => Ok(Some(self.controller.advance(Trigger::Continue).await?)),
            (_, Action::Skip) => Ok(Some(self.controller.advance(Trigger::Skip).await?)),
            (_, Action::Quit) => Ok(None),
        }
    }

    fn show<W: Write>(&self, out: &mut W, view: &SessionView) -> std::io::Result<()> {
        output::step_header(out, view)?;
        output::step_body(out, view)
    }

    /// Render a newly entered step. A location fix is followed by the
    /// auto-advance, so wait for it and return the view it leads to.
    async fn enter<W: Write>(&self, view: SessionView, out: &mut W) -> Result<SessionView> {
        self.show(out, &view)?;
        if view.step != Step::Location || view.location.is_none() {
            return Ok(view);
        }

        self.controller.settle().await;
        match self.controller.view() {
            Some(next) if next.step != view.step => {
                self.show(out, &next)?;
                Ok(next)
            }
            Some(next) => Ok(next),
            None => Ok(view),
        }
    }

    async fn track<R, W>(
        &self,
        mut view: SessionView,
        lines: &mut InputLines<R>,
        out: &mut W,
    ) -> Result<SosOutcome>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        self.notify_contact(&view, out).await?;

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.eta_tick,
            self.eta_tick,
        );
        let mut input_open = true;

        while !view.eta.arrived() {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.controller.tick_eta() {
                        Ok(eta) => {
                            view.eta = eta;
                            output::eta(out, eta)?;
                        }
                        Err(_) => return Ok(SosOutcome::Closed { at: None }),
                    }
                }
                line = lines.next_line(), if input_open => {
                    match line? {
                        Some(line) if Action::parse(&line) == Action::Quit => {
                            return Ok(self.close(out)?);
                        }
                        Some(_) => output::hint(out, "Help is on the way. Type 'quit' to close.")?,
                        // Stdin closed; keep counting down
                        None => input_open = false,
                    }
                }
            }
        }

        output::success(out, "Help has arrived.")?;
        info!("Emergency flow complete");
        let view = self.controller.view().unwrap_or(view);
        self.controller.close();
        Ok(SosOutcome::HelpArrived(view))
    }

    /// Text the emergency contact once help is dispatched (roadside only)
    async fn notify_contact<W: Write>(&self, view: &SessionView, out: &mut W) -> Result<()> {
        if view.variant != Variant::Roadside {
            return Ok(());
        }
        let Some(contact) = &view.contact else {
            return Ok(());
        };
        let Some(notifier) = &self.notifier else {
            warn!("SMS is not configured; emergency contact not notified");
            output::hint(out, "SMS is not configured, your contact was not notified.")?;
            return Ok(());
        };

        let location = view
            .location
            .map(|c| c.to_string())
            .unwrap_or_else(|| "an unknown location".to_string());
        let message = contact_message(&location);

        match notifier.send_sms(contact, &message).await {
            Ok(receipt) => output::success(
                out,
                &format!("Emergency contact notified (SID {})", receipt.message_id),
            )?,
            Err(e) => output::failure(out, &format!("Could not notify {}: {}", contact, e))?,
        }
        Ok(())
    }

    fn close<W: Write>(&self, out: &mut W) -> std::io::Result<SosOutcome> {
        let at = self.controller.view().map(|v| v.step);
        self.controller.close();
        output::hint(out, "Emergency flow closed.")?;
        Ok(SosOutcome::Closed { at })
    }
}

pub fn contact_message(location: &str) -> String {
    format!(
        "Highway Healers: an emergency was reported at {}. Help has been dispatched.",
        location
    )
}
