//! Session lifecycle manager.
//!
//! Adopts sessions offered by an [`Activity`], joins them, and moves
//! envelopes between the session's messenger and the observer channel.
//!
//! Each adopted session owns a listener set: a state listener from adoption,
//! plus participant and inbound-message listeners once joined. Every listener
//! carries the epoch it was spawned in and publishes only while holding the
//! shared lock with that epoch still current. Teardown bumps the epoch under
//! the same lock before cancelling, so no listener can publish for a session
//! once its teardown has started.

use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use exerciser_protocol::{
    Envelope, HighWaterMark, ProtocolError, decode_message, encode_message,
};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::events::{EventSink, SessionEvent, SessionMessage};
use crate::transport::{
    Activity, BoxStream, GroupSession, InboundMessage, Messenger, SessionState,
};

/// Resources owned by one manager. Mutated only under the lock.
struct Shared {
    session: Option<Arc<dyn GroupSession>>,
    messenger: Option<Arc<dyn Messenger>>,
    high_water: HighWaterMark,
    listeners: JoinSet<()>,
    epoch: u64,
    offer_listener: Option<JoinHandle<()>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            session: None,
            messenger: None,
            high_water: HighWaterMark::new(),
            listeners: JoinSet::new(),
            epoch: 0,
            offer_listener: None,
        }
    }

    /// Silences the current listener set and hands it back for cancellation.
    ///
    /// The caller must cancel the returned set after releasing the lock.
    fn retire(&mut self) -> JoinSet<()> {
        self.epoch += 1;
        self.messenger = None;
        self.high_water.reset();
        std::mem::take(&mut self.listeners)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.offer_listener.take() {
            handle.abort();
        }
    }
}

struct Inner<M> {
    activity: Arc<dyn Activity>,
    config: SessionConfig,
    events: EventSink<M>,
    shared: Mutex<Shared>,
}

impl<M: SessionMessage> Inner<M> {
    /// Publishes an error to the observer and returns it.
    fn report(&self, error: SessionError) -> SessionError {
        self.events.emit(SessionEvent::Error(error.clone()));
        error
    }
}

/// Drives one activity's sessions on behalf of an observer.
///
/// Events are published on the receiver returned by [`new`](Self::new).
/// Dropping the manager cancels every listener it owns.
pub struct LifecycleManager<M> {
    inner: Arc<Inner<M>>,
}

impl<M: SessionMessage> LifecycleManager<M> {
    /// Creates a manager for `activity` and the observer channel it publishes to.
    pub fn new(
        activity: Arc<dyn Activity>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent<M>>) {
        let (events, rx) = EventSink::channel();
        let inner = Arc::new(Inner {
            activity,
            config,
            events,
            shared: Mutex::new(Shared::new()),
        });
        (Self { inner }, rx)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Asks the activity to start.
    ///
    /// Any resulting session is delivered through the offer listener started
    /// by [`begin_waiting_for_sessions`](Self::begin_waiting_for_sessions).
    pub async fn activate(&self) -> SessionResult<()> {
        let metadata = self.inner.activity.metadata();
        info!(activity = %metadata.identifier, "activating group activity");

        self.inner.activity.activate().await.map_err(|e| {
            warn!(error = %e, "activation failed");
            self.inner.report(SessionError::ActivationFailed(e))
        })
    }

    /// Starts the long-lived listener that adopts each offered session.
    ///
    /// Offers made after this call returns are never missed. Calling it again
    /// replaces the previous listener.
    pub async fn begin_waiting_for_sessions(&self) {
        let offers = self.inner.activity.sessions();
        let task = tokio::spawn(offer_listener(Arc::downgrade(&self.inner), offers));

        let previous = self.inner.shared.lock().await.offer_listener.replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!("waiting for group sessions");
    }

    /// Joins the adopted session and starts receiving messages.
    ///
    /// Joining an already joined session is a no-op.
    pub async fn join_session(&self) -> SessionResult<()> {
        let mut shared = self.inner.shared.lock().await;

        let Some(session) = shared.session.clone() else {
            warn!("attempted to join without a group session");
            return Err(self.inner.report(SessionError::NoSession));
        };
        if shared.messenger.is_some() {
            debug!(session_id = %session.id(), "already joined");
            return Ok(());
        }

        // Subscribe first so nothing sent in reaction to the join is missed.
        let messenger = session.messenger();
        let messages = messenger.messages();
        let counts = session.participant_counts();

        info!(session_id = %session.id(), "joining group session");
        session.join();

        let epoch = shared.epoch;
        let weak = Arc::downgrade(&self.inner);
        shared
            .listeners
            .spawn(participant_listener(weak.clone(), epoch, counts));
        shared
            .listeners
            .spawn(message_listener(weak, epoch, messages));
        shared.messenger = Some(messenger);

        Ok(())
    }

    /// Stamps `payload` with an envelope and sends it to the other participants.
    ///
    /// Returns the envelope identifier once the frame is handed to the
    /// messenger. A missing messenger or an unencodable payload is returned
    /// as an error. A transmission failure is only published to the observer.
    pub async fn send(&self, payload: M) -> SessionResult<Uuid> {
        let messenger = self.inner.shared.lock().await.messenger.clone();
        let Some(messenger) = messenger else {
            warn!("attempted to send without a messenger");
            return Err(self.inner.report(SessionError::NoMessenger));
        };

        let envelope = Envelope::new(payload);
        let frame = encode_message(&envelope)
            .map_err(|e| self.inner.report(SessionError::EncodingFailed(e.to_string())))?;

        if self.inner.config.trace_messages {
            debug!(message = %envelope, "sending");
        }

        if let Err(e) = messenger.send(frame).await {
            warn!(id = %envelope.id, error = %e, "send failed");
            self.inner.report(SessionError::SendFailed(e));
        }

        Ok(envelope.id)
    }

    /// Leaves the current session and tears down everything the manager owns.
    ///
    /// Stops the offer listener too. Idempotent. When this returns, no
    /// listener of the torn-down session is running.
    pub async fn reset(&self) {
        let mut listeners = {
            let mut shared = self.inner.shared.lock().await;
            // Aborted under the lock so a pending offer cannot be adopted.
            if let Some(handle) = shared.offer_listener.take() {
                handle.abort();
            }
            if let Some(session) = shared.session.take() {
                info!(session_id = %session.id(), "leaving group session");
                session.leave();
            }
            shared.retire()
        };

        listeners.shutdown().await;
        debug!("session manager reset");
    }

    /// True while the adopted session reports [`SessionState::Joined`].
    pub async fn is_connected(&self) -> bool {
        let shared = self.inner.shared.lock().await;
        shared
            .session
            .as_ref()
            .is_some_and(|session| session.state().is_joined())
    }

    pub async fn participant_count(&self) -> usize {
        let shared = self.inner.shared.lock().await;
        shared
            .session
            .as_ref()
            .map_or(0, |session| session.participant_count())
    }

    /// Description of the adopted session's state, if any.
    pub async fn session_status(&self) -> Option<String> {
        let shared = self.inner.shared.lock().await;
        shared
            .session
            .as_ref()
            .map(|session| session.state().to_string())
    }
}

async fn offer_listener<M: SessionMessage>(
    inner: Weak<Inner<M>>,
    mut offers: BoxStream<'static, Arc<dyn GroupSession>>,
) {
    while let Some(session) = offers.next().await {
        let Some(inner) = inner.upgrade() else { break };
        adopt(&inner, session).await;
    }
    debug!("session offer stream ended");
}

/// Replaces the current session with `session`.
async fn adopt<M: SessionMessage>(inner: &Arc<Inner<M>>, session: Arc<dyn GroupSession>) {
    let mut retired = {
        let mut shared = inner.shared.lock().await;
        let retired = shared.retire();

        info!(session_id = %session.id(), "adopting group session");
        let states = session.state_changes();
        shared.session = Some(session);

        let epoch = shared.epoch;
        shared
            .listeners
            .spawn(state_listener(Arc::downgrade(inner), epoch, states));
        retired
    };
    retired.abort_all();
}

async fn state_listener<M: SessionMessage>(
    inner: Weak<Inner<M>>,
    epoch: u64,
    mut states: BoxStream<'static, SessionState>,
) {
    while let Some(state) = states.next().await {
        let Some(inner) = inner.upgrade() else { break };
        let mut shared = inner.shared.lock().await;
        if shared.epoch != epoch {
            break;
        }

        debug!(state = %state, "session state changed");
        let retired = match &state {
            SessionState::Waiting => None,
            SessionState::Joined => {
                inner.events.emit(SessionEvent::Connected);
                None
            }
            SessionState::Invalidated { reason } => {
                info!(reason = %reason, "group session invalidated");
                let retired = shared.retire();
                shared.session = None;
                inner.events.emit(SessionEvent::Disconnected {
                    reason: reason.clone(),
                });
                Some(retired)
            }
        };
        inner.events.emit(SessionEvent::StatusChanged {
            status: state.to_string(),
        });

        if let Some(mut retired) = retired {
            drop(shared);
            // Includes this task; it exits before its next suspension.
            retired.abort_all();
            break;
        }
    }
}

async fn participant_listener<M: SessionMessage>(
    inner: Weak<Inner<M>>,
    epoch: u64,
    mut counts: BoxStream<'static, usize>,
) {
    while let Some(count) = counts.next().await {
        let Some(inner) = inner.upgrade() else { break };
        let shared = inner.shared.lock().await;
        if shared.epoch != epoch {
            break;
        }
        debug!(count, "participants changed");
        inner
            .events
            .emit(SessionEvent::ParticipantsChanged { count });
    }
}

async fn message_listener<M: SessionMessage>(
    inner: Weak<Inner<M>>,
    epoch: u64,
    mut messages: BoxStream<'static, InboundMessage>,
) {
    while let Some(message) = messages.next().await {
        let Some(inner) = inner.upgrade() else { break };
        let mut shared = inner.shared.lock().await;
        if shared.epoch != epoch {
            break;
        }
        let event = handle_inbound(&inner, &mut shared, message);
        inner.events.emit(event);
    }
}

/// Decodes one frame and runs it through the ordering filter.
///
/// A malformed frame produces an error event and leaves the listener running.
fn handle_inbound<M: SessionMessage>(
    inner: &Inner<M>,
    shared: &mut Shared,
    message: InboundMessage,
) -> SessionEvent<M> {
    let InboundMessage { data, sender } = message;

    let envelope: Envelope<M> = match decode_message(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(sender = %sender, error = %e, "failed to decode inbound message");
            return SessionEvent::Error(SessionError::DecodingFailed(e.to_string()));
        }
    };

    if inner.config.enforce_protocol_version && !envelope.is_compatible() {
        warn!(
            id = %envelope.id,
            version = %envelope.version(),
            "rejecting message from another protocol version"
        );
        let error = ProtocolError::UnsupportedVersion(envelope.protocol_version.clone());
        return SessionEvent::Error(SessionError::DecodingFailed(error.to_string()));
    }

    if inner.config.trace_messages {
        debug!(message = %envelope, sender = %sender.name, "received");
    }

    match shared.high_water.admit(&envelope) {
        Ok(()) => SessionEvent::MessageReceived { envelope, sender },
        Err(stale) => {
            debug!(error = %stale, "dropping stale message");
            SessionEvent::Error(SessionError::StaleMessage {
                id: envelope.id,
                description: envelope.to_string(),
            })
        }
    }
}
