//! Dispatch controller - runs entry actions and owns the session lifetime
//!
//! The session lives behind a mutex that is never held across an await.
//! Every open bumps an epoch; an async result is applied only if the epoch
//! it started under is still current, so results that arrive after a close
//! (or a re-open) are dropped. A camera stream dropped that way is released
//! with it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::{DispatchSession, Eta, GuidanceStatus, InstructionSource, SessionView};
use super::step::{CapabilityKind, Step, Trigger, Variant};
use super::DispatchError;
use crate::capability::CapabilityAcquirer;
use crate::config::DispatchConfig;
use crate::flow_client::AiFlowClient;
use crate::flows::FIRST_AID_FALLBACK;
use crate::sms::is_e164;

#[derive(Default)]
struct Inner {
    epoch: u64,
    session: Option<DispatchSession>,
    pending_advance: Option<JoinHandle<()>>,
}

/// Drives one emergency flow at a time
#[derive(Clone)]
pub struct DispatchController {
    capabilities: Arc<dyn CapabilityAcquirer>,
    flows: AiFlowClient,
    auto_advance: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl DispatchController {
    pub fn new(
        capabilities: Arc<dyn CapabilityAcquirer>,
        flows: AiFlowClient,
        auto_advance: Duration,
    ) -> Self {
        Self {
            capabilities,
            flows,
            auto_advance,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn from_config(
        config: &DispatchConfig,
        capabilities: Arc<dyn CapabilityAcquirer>,
        flows: AiFlowClient,
    ) -> Self {
        Self::new(
            capabilities,
            flows,
            Duration::from_millis(config.auto_advance_ms),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the session if it is still the one opened under `epoch`
    fn with_current<R>(&self, epoch: u64, f: impl FnOnce(&mut DispatchSession) -> R) -> Option<R> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return None;
        }
        inner.session.as_mut().map(f)
    }

    /// Run `f` on the open session, returning the epoch it belongs to
    fn with_open<R>(
        &self,
        f: impl FnOnce(&mut DispatchSession) -> Result<R, DispatchError>,
    ) -> Result<(u64, R), DispatchError> {
        let mut inner = self.lock();
        let epoch = inner.epoch;
        let session = inner.session.as_mut().ok_or(DispatchError::NotOpen)?;
        f(session).map(|r| (epoch, r))
    }

    pub fn is_open(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn view(&self) -> Option<SessionView> {
        self.lock().session.as_ref().map(DispatchSession::view)
    }

    /// Start a fresh session, discarding any previous one, and run the
    /// entry action of the first step
    pub async fn open(&self, variant: Variant) -> Result<SessionView, DispatchError> {
        let (epoch, previous) = {
            let mut inner = self.lock();
            inner.epoch += 1;
            if let Some(handle) = inner.pending_advance.take() {
                handle.abort();
            }
            let previous = inner.session.replace(DispatchSession::new(variant));
            (inner.epoch, previous)
        };
        if previous.is_some() {
            debug!("Discarded previous session on re-open");
        }
        drop(previous);

        info!("Emergency flow opened ({} variant)", variant);
        self.enter_step(epoch).await;
        self.view().ok_or(DispatchError::Closed)
    }

    /// Apply a user action and run the entry action of the step it leads to
    pub async fn advance(&self, trigger: Trigger) -> Result<SessionView, DispatchError> {
        if !trigger.is_user_action() {
            return Err(DispatchError::NotUserAction(trigger));
        }

        let (epoch, step) = self.with_open(|session| session.fire(trigger))?;
        info!("Advanced to {}", step.as_str());

        self.enter_step(epoch).await;
        self.view().ok_or(DispatchError::Closed)
    }

    /// Record the emergency contact while on the contact step
    pub fn set_contact(&self, contact: &str) -> Result<(), DispatchError> {
        let contact = contact.trim();
        if !is_e164(contact) {
            return Err(DispatchError::InvalidContact(contact.to_string()));
        }

        self.with_open(|session| {
            expect_step(session, Step::Contact)?;
            session.contact = Some(contact.to_string());
            Ok(())
        })
        .map(|_| ())
    }

    /// Ask the first-aid flow once. A failed call stores the fallback text and
    /// still ends in `Success`; the view marks it as a fallback.
    pub async fn submit_situation(&self, text: &str) -> Result<SessionView, DispatchError> {
        if text.trim().is_empty() {
            return Err(DispatchError::EmptySituation);
        }

        let (epoch, ()) = self.with_open(|session| {
            expect_step(session, Step::Guidance)?;
            if session.guidance == GuidanceStatus::Loading {
                return Err(DispatchError::GuidancePending);
            }
            session.situation_text = text.to_string();
            session.guidance = GuidanceStatus::Loading;
            Ok(())
        })?;

        let result = self.flows.get_first_aid_instructions(text).await;

        let applied = self.with_current(epoch, move |session| {
            match result {
                Ok(instructions) => {
                    session.instructions = Some(instructions);
                    session.instruction_source = Some(InstructionSource::Flow);
                }
                Err(e) => {
                    warn!("Failed to get first aid instructions: {}", e);
                    session.instructions = Some(FIRST_AID_FALLBACK.to_string());
                    session.instruction_source = Some(InstructionSource::Fallback);
                }
            }
            session.guidance = GuidanceStatus::Success;
            session.view()
        });

        if applied.is_none() {
            debug!("Flow closed while instructions were pending; result discarded");
        }
        applied.ok_or(DispatchError::Closed)
    }

    /// Wait for a scheduled auto-advance, if any, to run
    pub async fn settle(&self) {
        let pending = self.lock().pending_advance.take();
        if let Some(handle) = pending {
            // An aborted task only means the session was closed meanwhile
            let _ = handle.await;
        }
    }

    /// One simulated minute passes on the tracking screen
    pub fn tick_eta(&self) -> Result<Eta, DispatchError> {
        self.with_open(|session| {
            expect_step(session, Step::Tracking)?;
            session.eta.tick();
            Ok(session.eta)
        })
        .map(|(_, eta)| eta)
    }

    /// End the session. Pending results are discarded and the camera, if
    /// held, is released. Returns whether a session was open.
    pub fn close(&self) -> bool {
        let (session, pending) = {
            let mut inner = self.lock();
            inner.epoch += 1;
            (inner.session.take(), inner.pending_advance.take())
        };

        if let Some(handle) = pending {
            handle.abort();
        }

        match session {
            Some(session) => {
                info!(
                    "Emergency flow closed at {}",
                    session.step().as_str()
                );
                drop(session);
                true
            }
            None => false,
        }
    }

    async fn enter_step(&self, epoch: u64) {
        let Some(step) = self.with_current(epoch, |s| s.step()) else {
            return;
        };

        match step.capability() {
            Some(CapabilityKind::Location) => self.acquire_location(epoch).await,
            Some(CapabilityKind::Camera) => self.acquire_camera(epoch).await,
            None => {}
        }
    }

    async fn acquire_location(&self, epoch: u64) {
        let result = self.capabilities.acquire_location().await;

        let acquired = self.with_current(epoch, move |session| match result {
            Ok(coords) => {
                session.location = Some(coords);
                session.location_error = None;
                Ok(())
            }
            Err(e) => {
                session.location_error = Some(e.message().to_string());
                Err(e)
            }
        });

        match acquired {
            Some(Ok(())) => self.schedule_auto_advance(epoch),
            Some(Err(e)) => warn!("Location unavailable: {}", e),
            None => debug!("Flow closed while location was pending; result discarded"),
        }
    }

    async fn acquire_camera(&self, epoch: u64) {
        let result = self.capabilities.acquire_camera().await;

        // If the session is gone the closure never runs and the stream it
        // owns is dropped, which stops its tracks.
        let acquired = self.with_current(epoch, move |session| match result {
            Ok(stream) => {
                session.camera = Some(stream);
                session.camera_error = None;
                Ok(())
            }
            Err(e) => {
                session.camera_error = Some(e.message().to_string());
                Err(e)
            }
        });

        match acquired {
            Some(Ok(())) => info!("Camera bound to vitals view"),
            Some(Err(e)) => warn!("Camera unavailable: {}", e),
            None => debug!("Flow closed while camera was pending; stream released"),
        }
    }

    fn schedule_auto_advance(&self, epoch: u64) {
        let this = self.clone();
        let delay = self.auto_advance;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match this.with_current(epoch, |s| s.fire(Trigger::LocationAcquired)) {
                Some(Ok(step)) => info!("Help dispatched, now at {}", step.as_str()),
                Some(Err(e)) => warn!("Auto-advance rejected: {}", e),
                None => debug!("Flow closed before auto-advance"),
            }
        });

        let mut inner = self.lock();
        if inner.epoch == epoch {
            inner.pending_advance = Some(handle);
        } else {
            handle.abort();
        }
    }
}

fn expect_step(session: &DispatchSession, expected: Step) -> Result<(), DispatchError> {
    if session.step() == expected {
        Ok(())
    } else {
        Err(DispatchError::WrongStep {
            expected,
            actual: session.step(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Coordinates, FakeCapabilities};
    use crate::flow_client::FakeFlowRunner;

    fn controller(caps: FakeCapabilities, runner: FakeFlowRunner) -> DispatchController {
        DispatchController::new(
            Arc::new(caps),
            AiFlowClient::new(Arc::new(runner)),
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn test_actions_require_open_flow() {
        let c = controller(
            FakeCapabilities::denied(),
            FakeFlowRunner::always_valid(serde_json::json!({})),
        );
        assert!(!c.is_open());
        assert_eq!(c.advance(Trigger::Skip).await, Err(DispatchError::NotOpen));
        assert_eq!(c.tick_eta(), Err(DispatchError::NotOpen));
        assert!(!c.close());
    }

    #[tokio::test]
    async fn test_internal_trigger_rejected() {
        let c = controller(
            FakeCapabilities::granted(Coordinates::new(0.0, 0.0)),
            FakeFlowRunner::always_valid(serde_json::json!({})),
        );
        c.open(Variant::Roadside).await.unwrap();
        assert_eq!(
            c.advance(Trigger::LocationAcquired).await,
            Err(DispatchError::NotUserAction(Trigger::LocationAcquired))
        );
    }

    #[tokio::test]
    async fn test_contact_validated_and_step_bound() {
        let c = controller(
            FakeCapabilities::granted(Coordinates::new(0.0, 0.0)),
            FakeFlowRunner::always_valid(serde_json::json!({})),
        );
        c.open(Variant::Roadside).await.unwrap();

        assert_eq!(
            c.set_contact("98765"),
            Err(DispatchError::InvalidContact("98765".to_string()))
        );
        c.set_contact(" +919876543210 ").unwrap();
        assert_eq!(c.view().unwrap().contact.as_deref(), Some("+919876543210"));

        c.advance(Trigger::Continue).await.unwrap();
        assert_eq!(
            c.set_contact("+919876543210"),
            Err(DispatchError::WrongStep {
                expected: Step::Contact,
                actual: Step::Location
            })
        );
    }

    #[tokio::test]
    async fn test_situation_only_in_guidance() {
        let c = controller(
            FakeCapabilities::granted(Coordinates::new(0.0, 0.0)),
            FakeFlowRunner::always_valid(serde_json::json!({})),
        );
        c.open(Variant::Vitals).await.unwrap();
        assert!(matches!(
            c.submit_situation("Person fell off a bike").await,
            Err(DispatchError::WrongStep { .. })
        ));
        c.advance(Trigger::Continue).await.unwrap();
        assert_eq!(
            c.submit_situation("  ").await,
            Err(DispatchError::EmptySituation)
        );
    }
}
