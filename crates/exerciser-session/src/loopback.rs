//! In-process transport.
//!
//! A [`LoopbackHub`] stands in for one shared call. Each device on the hub
//! gets a [`LoopbackActivity`]; activating any of them offers a fresh
//! [`LoopbackSession`] to every device. Frames sent by one joined member are
//! delivered to every other joined member.
//!
//! ```rust
//! use std::sync::Arc;
//! use exerciser_session::{LifecycleManager, LoopbackHub, SessionConfig};
//! use exerciser_protocol::Service;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = LoopbackHub::new();
//! let robot = Arc::new(hub.device("robot"));
//! let (manager, _events) = LifecycleManager::<Service>::new(robot, SessionConfig::default());
//! manager.begin_waiting_for_sessions().await;
//! manager.activate().await.unwrap();
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{StreamExt, future, stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::transport::{
    Activity, ActivityMetadata, BoxFuture, BoxStream, GroupSession, InboundMessage, Messenger,
    Participant, SessionState,
};

const CHANNEL_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn broadcast_stream<T: Clone + Send + 'static>(
    rx: broadcast::Receiver<T>,
) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => return Some((item, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "loopback subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

/// A value whose subscribers see the current value first, then every change.
struct Published<T> {
    inner: Mutex<PublishedInner<T>>,
}

struct PublishedInner<T> {
    current: T,
    tx: broadcast::Sender<T>,
}

impl<T: Clone + PartialEq + Send + 'static> Published<T> {
    fn new(value: T) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(PublishedInner { current: value, tx }),
        }
    }

    fn get(&self) -> T {
        lock(&self.inner).current.clone()
    }

    /// Publishes `value` unless it equals the current one.
    fn set(&self, value: T) -> bool {
        self.update(|_| Some(value))
    }

    /// Publishes the value returned by `f`, if any and if it differs.
    fn update(&self, f: impl FnOnce(&T) -> Option<T>) -> bool {
        let mut inner = lock(&self.inner);
        match f(&inner.current) {
            Some(next) if next != inner.current => {
                inner.current = next.clone();
                let _ = inner.tx.send(next);
                true
            }
            _ => false,
        }
    }

    fn subscribe(&self) -> BoxStream<'static, T> {
        let (current, rx) = {
            let inner = lock(&self.inner);
            (inner.current.clone(), inner.tx.subscribe())
        };
        stream::once(future::ready(current))
            .chain(broadcast_stream(rx))
            .boxed()
    }
}

/// One shared call that devices can form sessions in.
#[derive(Clone)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    eligible: Published<bool>,
    devices: Mutex<Vec<Arc<Device>>>,
}

struct Device {
    participant: Participant,
    offers: broadcast::Sender<Arc<LoopbackSession>>,
    current: Mutex<Option<Arc<LoopbackSession>>>,
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHub {
    /// Creates an eligible hub with no devices.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                eligible: Published::new(true),
                devices: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Adds a device and returns its activity.
    pub fn device(&self, name: impl Into<String>) -> LoopbackActivity {
        let (offers, _) = broadcast::channel(CHANNEL_CAPACITY);
        let device = Arc::new(Device {
            participant: Participant::new(name),
            offers,
            current: Mutex::new(None),
        });
        lock(&self.inner.devices).push(Arc::clone(&device));

        LoopbackActivity {
            hub: self.clone(),
            device,
            metadata: ActivityMetadata::default(),
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.inner.eligible.get()
    }

    /// Changes whether sessions can be formed.
    pub fn set_eligible(&self, eligible: bool) {
        if self.inner.eligible.set(eligible) {
            debug!(eligible, "loopback eligibility changed");
        }
    }

    /// Current eligibility, then every change.
    pub fn eligibility(&self) -> BoxStream<'static, bool> {
        self.inner.eligible.subscribe()
    }

    fn start_session(&self, metadata: &ActivityMetadata) -> Result<(), TransportError> {
        if !self.is_eligible() {
            return Err(TransportError::NotEligible);
        }

        let devices = lock(&self.inner.devices).clone();
        let members = devices
            .iter()
            .map(|device| {
                Arc::new(Member {
                    participant: device.participant.clone(),
                    state: Published::new(SessionState::Waiting),
                    inbox: broadcast::channel(CHANNEL_CAPACITY).0,
                })
            })
            .collect::<Vec<_>>();

        let core = Arc::new(SessionCore {
            id: Uuid::new_v4(),
            metadata: metadata.clone(),
            members: members.clone(),
            count: Published::new(0),
        });
        debug!(session_id = %core.id, members = members.len(), "loopback session formed");

        for (device, member) in devices.iter().zip(members) {
            let session = Arc::new(LoopbackSession {
                core: Arc::clone(&core),
                member,
            });
            *lock(&device.current) = Some(Arc::clone(&session));
            let _ = device.offers.send(session);
        }
        Ok(())
    }
}

/// One device's view of the hub.
pub struct LoopbackActivity {
    hub: LoopbackHub,
    device: Arc<Device>,
    metadata: ActivityMetadata,
}

impl LoopbackActivity {
    /// Builder: describe the activity differently.
    pub fn with_metadata(mut self, metadata: ActivityMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn participant(&self) -> &Participant {
        &self.device.participant
    }

    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }

    /// The most recent session offered to this device.
    pub fn current_session(&self) -> Option<Arc<LoopbackSession>> {
        lock(&self.device.current).clone()
    }
}

impl Activity for LoopbackActivity {
    fn metadata(&self) -> &ActivityMetadata {
        &self.metadata
    }

    fn activate(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move { self.hub.start_session(&self.metadata) })
    }

    fn sessions(&self) -> BoxStream<'static, Arc<dyn GroupSession>> {
        broadcast_stream(self.device.offers.subscribe())
            .map(|session| -> Arc<dyn GroupSession> { session })
            .boxed()
    }
}

struct SessionCore {
    id: Uuid,
    metadata: ActivityMetadata,
    members: Vec<Arc<Member>>,
    count: Published<usize>,
}

impl SessionCore {
    fn recount(&self) {
        let joined = self
            .members
            .iter()
            .filter(|member| member.state.get().is_joined())
            .count();
        self.count.set(joined);
    }
}

struct Member {
    participant: Participant,
    state: Published<SessionState>,
    inbox: broadcast::Sender<InboundMessage>,
}

/// One device's handle on a loopback session.
pub struct LoopbackSession {
    core: Arc<SessionCore>,
    member: Arc<Member>,
}

impl LoopbackSession {
    pub fn metadata(&self) -> &ActivityMetadata {
        &self.core.metadata
    }

    pub fn participant(&self) -> &Participant {
        &self.member.participant
    }

    /// Ends the session for every member, as a network loss would.
    pub fn invalidate(&self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(session_id = %self.core.id, reason = %reason, "invalidating loopback session");
        for member in &self.core.members {
            member.state.update(|state| {
                (!state.is_invalidated()).then(|| SessionState::Invalidated {
                    reason: reason.clone(),
                })
            });
        }
        self.core.recount();
    }

    /// Delivers a raw frame to this member as if `sender` had sent it.
    pub fn inject(&self, data: Vec<u8>, sender: Participant) {
        let _ = self.member.inbox.send(InboundMessage { data, sender });
    }
}

impl GroupSession for LoopbackSession {
    fn id(&self) -> Uuid {
        self.core.id
    }

    fn state(&self) -> SessionState {
        self.member.state.get()
    }

    fn state_changes(&self) -> BoxStream<'static, SessionState> {
        self.member.state.subscribe()
    }

    fn participant_count(&self) -> usize {
        self.core.count.get()
    }

    fn participant_counts(&self) -> BoxStream<'static, usize> {
        self.core.count.subscribe()
    }

    fn join(&self) {
        let joined = self
            .member
            .state
            .update(|state| (*state == SessionState::Waiting).then_some(SessionState::Joined));
        if joined {
            self.core.recount();
        }
    }

    fn leave(&self) {
        let left = self.member.state.update(|state| {
            (!state.is_invalidated()).then(|| SessionState::Invalidated {
                reason: "left the session".to_string(),
            })
        });
        if left {
            self.core.recount();
        }
    }

    fn messenger(&self) -> Arc<dyn Messenger> {
        Arc::new(LoopbackMessenger {
            core: Arc::clone(&self.core),
            member: Arc::clone(&self.member),
        })
    }
}

/// Fans frames out to the other joined members of a loopback session.
pub struct LoopbackMessenger {
    core: Arc<SessionCore>,
    member: Arc<Member>,
}

impl LoopbackMessenger {
    fn deliver(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        match self.member.state.get() {
            SessionState::Joined => {}
            SessionState::Waiting => return Err(TransportError::NotJoined),
            SessionState::Invalidated { .. } => return Err(TransportError::Closed),
        }

        for member in &self.core.members {
            if Arc::ptr_eq(member, &self.member) || !member.state.get().is_joined() {
                continue;
            }
            let _ = member.inbox.send(InboundMessage {
                data: frame.clone(),
                sender: self.member.participant.clone(),
            });
        }
        Ok(())
    }
}

impl Messenger for LoopbackMessenger {
    fn send(&self, frame: Vec<u8>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move { self.deliver(frame) })
    }

    fn messages(&self) -> BoxStream<'static, InboundMessage> {
        broadcast_stream(self.member.inbox.subscribe())
    }
}
