use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::{StreamExt, stream};
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};
use uuid::Uuid;

use exerciser_protocol::{Command, Envelope, Service, encode_message};
use exerciser_session::{
    Activity, ActivityMetadata, BoxFuture, BoxStream, GroupSession, InboundMessage,
    LifecycleManager, LoopbackActivity, LoopbackHub, Messenger, Participant, SessionConfig,
    SessionError, SessionEvent, SessionState, TransportError,
};

type Events = UnboundedReceiver<SessionEvent<Service>>;

struct Peer {
    activity: Arc<LoopbackActivity>,
    manager: LifecycleManager<Service>,
    events: Events,
}

async fn peer(hub: &LoopbackHub, name: &str, config: SessionConfig) -> Peer {
    let activity = Arc::new(hub.device(name));
    let (manager, events) = LifecycleManager::new(activity.clone(), config);
    manager.begin_waiting_for_sessions().await;
    Peer {
        activity,
        manager,
        events,
    }
}

async fn wait_for(
    events: &mut Events,
    what: &str,
    matches: impl Fn(&SessionEvent<Service>) -> bool,
) -> SessionEvent<Service> {
    let found = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = events.recv().await {
            if matches(&event) {
                return Some(event);
            }
        }
        None
    })
    .await;

    match found {
        Ok(Some(event)) => event,
        Ok(None) => panic!("event channel closed while waiting for {}", what),
        Err(_) => panic!("timed out waiting for {}", what),
    }
}

async fn wait_for_status(events: &mut Events, status: &str) {
    wait_for(events, status, |event| {
        matches!(event, SessionEvent::StatusChanged { status: s } if s == status)
    })
    .await;
}

/// Waits for the next delivered message or filter rejection.
async fn next_delivery(events: &mut Events) -> SessionEvent<Service> {
    wait_for(events, "delivery", |event| {
        matches!(
            event,
            SessionEvent::MessageReceived { .. }
                | SessionEvent::Error(SessionError::StaleMessage { .. })
                | SessionEvent::Error(SessionError::DecodingFailed(_))
        )
    })
    .await
}

async fn join(peer: &mut Peer) {
    wait_for_status(&mut peer.events, "waiting").await;
    peer.manager.join_session().await.unwrap();
    wait_for(&mut peer.events, "connected", |event| {
        matches!(event, SessionEvent::Connected)
    })
    .await;
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_626_500_000 + seconds, 0).unwrap()
}

fn frame(timestamp: DateTime<Utc>, command: Command) -> (Uuid, Vec<u8>) {
    let envelope = Envelope::with_parts(Uuid::new_v4(), timestamp, Service::Command(command));
    (envelope.id, encode_message(&envelope).unwrap())
}

fn stranger() -> Participant {
    Participant::new("stranger")
}

fn drain(events: &mut Events) {
    while events.try_recv().is_ok() {}
}

#[tokio::test]
async fn send_without_messenger_reports_no_messenger() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;

    let result = robot.manager.send(Service::RequestServices).await;
    assert_eq!(result, Err(SessionError::NoMessenger));

    let event = robot.events.recv().await.unwrap();
    assert_eq!(event, SessionEvent::Error(SessionError::NoMessenger));
}

#[tokio::test]
async fn join_without_session_reports_no_session() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;

    assert_eq!(robot.manager.join_session().await, Err(SessionError::NoSession));
    assert_eq!(
        robot.events.recv().await.unwrap(),
        SessionEvent::Error(SessionError::NoSession)
    );
    assert!(!robot.manager.is_connected().await);
    assert_eq!(robot.manager.session_status().await, None);
}

#[tokio::test]
async fn activation_failure_is_reported() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    hub.set_eligible(false);

    let expected = SessionError::ActivationFailed(TransportError::NotEligible);
    assert_eq!(robot.manager.activate().await, Err(expected.clone()));
    assert_eq!(robot.events.recv().await.unwrap(), SessionEvent::Error(expected));
}

#[tokio::test]
async fn joined_peers_exchange_commands() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    let mut controller = peer(&hub, "controller", SessionConfig::default()).await;

    controller.manager.activate().await.unwrap();
    join(&mut robot).await;
    join(&mut controller).await;

    wait_for(&mut robot.events, "two participants", |event| {
        matches!(event, SessionEvent::ParticipantsChanged { count: 2 })
    })
    .await;
    assert!(robot.manager.is_connected().await);
    assert_eq!(robot.manager.participant_count().await, 2);
    assert_eq!(robot.manager.session_status().await.as_deref(), Some("joined"));

    let id = controller
        .manager
        .send(Service::Command(Command::DriveForward(0.7)))
        .await
        .unwrap();

    match next_delivery(&mut robot.events).await {
        SessionEvent::MessageReceived { envelope, sender } => {
            assert_eq!(envelope.id, id);
            assert_eq!(envelope.payload, Service::Command(Command::DriveForward(0.7)));
            assert_eq!(sender.name, "controller");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    robot
        .manager
        .send(Service::Command(Command::acknowledge(Command::DriveForward(0.7))))
        .await
        .unwrap();

    match next_delivery(&mut controller.events).await {
        SessionEvent::MessageReceived { envelope, .. } => assert_eq!(
            envelope.payload,
            Service::Command(Command::acknowledge(Command::DriveForward(0.5)))
        ),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn stale_envelopes_are_rejected() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    let (first, t1) = frame(at(1), Command::TurnLeft45);
    let (third, t3) = frame(at(3), Command::TurnRight45);
    let (second, t2) = frame(at(2), Command::StopDriving);
    session.inject(t1, stranger());
    session.inject(t3, stranger());
    session.inject(t2, stranger());

    let delivered = |event: SessionEvent<Service>| match event {
        SessionEvent::MessageReceived { envelope, .. } => envelope.id,
        other => panic!("expected delivery, got {:?}", other),
    };
    assert_eq!(delivered(next_delivery(&mut robot.events).await), first);
    assert_eq!(delivered(next_delivery(&mut robot.events).await), third);

    match next_delivery(&mut robot.events).await {
        SessionEvent::Error(SessionError::StaleMessage { id, description }) => {
            assert_eq!(id, second);
            assert!(description.contains("Stop Driving"));
        }
        other => panic!("expected stale rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn equal_timestamps_are_stale() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    session.inject(frame(at(5), Command::StopTilting).1, stranger());
    session.inject(frame(at(5), Command::StopTilting).1, stranger());

    assert!(matches!(
        next_delivery(&mut robot.events).await,
        SessionEvent::MessageReceived { .. }
    ));
    assert!(matches!(
        next_delivery(&mut robot.events).await,
        SessionEvent::Error(SessionError::StaleMessage { .. })
    ));
}

#[tokio::test]
async fn reset_restores_accept_all() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    session.inject(frame(at(10), Command::RequestStatus).1, stranger());
    assert!(matches!(
        next_delivery(&mut robot.events).await,
        SessionEvent::MessageReceived { .. }
    ));

    robot.manager.reset().await;
    assert!(!robot.manager.is_connected().await);

    robot.manager.begin_waiting_for_sessions().await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    let (earlier, bytes) = frame(at(1), Command::RequestStatus);
    session.inject(bytes, stranger());

    match next_delivery(&mut robot.events).await {
        SessionEvent::MessageReceived { envelope, .. } => assert_eq!(envelope.id, earlier),
        other => panic!("expected delivery after reset, got {:?}", other),
    }
}

#[tokio::test]
async fn no_notifications_after_reset() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;
    let session = robot.activity.current_session().unwrap();

    robot.manager.reset().await;
    drain(&mut robot.events);

    session.inject(frame(at(1), Command::StopDriving).1, stranger());
    session.invalidate("late teardown");
    robot.activity.activate().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(robot.events.try_recv(), Err(TryRecvError::Empty));

    // Idempotent.
    robot.manager.reset().await;
    assert_eq!(robot.events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn offer_pending_at_reset_is_not_adopted() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;

    robot.activity.activate().await.unwrap();
    robot.manager.reset().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(robot.events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(robot.manager.session_status().await, None);
}

#[tokio::test]
async fn invalidation_tears_down_the_session() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    session.invalidate("network lost");

    let event = wait_for(&mut robot.events, "disconnected", |event| {
        matches!(event, SessionEvent::Disconnected { .. })
    })
    .await;
    assert_eq!(
        event,
        SessionEvent::Disconnected {
            reason: "network lost".to_string()
        }
    );
    wait_for_status(&mut robot.events, "invalidated: network lost").await;

    assert!(!robot.manager.is_connected().await);
    assert_eq!(robot.manager.session_status().await, None);
    assert_eq!(
        robot.manager.send(Service::RequestServices).await,
        Err(SessionError::NoMessenger)
    );
}

#[tokio::test]
async fn offer_listener_survives_invalidation() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    robot
        .activity
        .current_session()
        .unwrap()
        .invalidate("remote left");
    wait_for_status(&mut robot.events, "invalidated: remote left").await;

    robot.manager.activate().await.unwrap();
    join(&mut robot).await;
    assert!(robot.manager.is_connected().await);
}

#[tokio::test]
async fn new_offer_replaces_previous_session() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;
    let first = robot.activity.current_session().unwrap();

    robot.manager.activate().await.unwrap();
    wait_for_status(&mut robot.events, "waiting").await;
    assert!(!robot.manager.is_connected().await);

    first.inject(frame(at(1), Command::StopDriving).1, stranger());
    first.invalidate("superseded");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(robot.events.try_recv(), Err(TryRecvError::Empty));

    assert_eq!(robot.manager.session_status().await.as_deref(), Some("waiting"));
}

#[tokio::test]
async fn malformed_frames_do_not_stop_the_listener() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    session.inject(b"\x00\x00\x00\x02{}".to_vec(), stranger());
    session.inject(vec![1, 2], stranger());
    session.inject(frame(at(1), Command::TurnLeft90).1, stranger());

    for _ in 0..2 {
        match next_delivery(&mut robot.events).await {
            SessionEvent::Error(SessionError::DecodingFailed(diagnostic)) => {
                assert!(!diagnostic.is_empty())
            }
            other => panic!("expected decoding failure, got {:?}", other),
        }
    }
    assert!(matches!(
        next_delivery(&mut robot.events).await,
        SessionEvent::MessageReceived { .. }
    ));
}

fn foreign_version_frame() -> Vec<u8> {
    let mut envelope = Envelope::new(Service::RequestServices);
    envelope.protocol_version = "2".to_string();
    encode_message(&envelope).unwrap()
}

#[tokio::test]
async fn foreign_protocol_versions_are_rejected_by_default() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    session.inject(foreign_version_frame(), stranger());

    match next_delivery(&mut robot.events).await {
        SessionEvent::Error(SessionError::DecodingFailed(diagnostic)) => {
            assert!(diagnostic.contains("version"))
        }
        other => panic!("expected version rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn foreign_protocol_versions_pass_when_not_enforced() {
    let hub = LoopbackHub::new();
    let config = SessionConfig::default()
        .with_enforce_protocol_version(false)
        .with_trace_messages(true);
    let mut robot = peer(&hub, "robot", config).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let session = robot.activity.current_session().unwrap();
    session.inject(foreign_version_frame(), stranger());

    assert!(matches!(
        next_delivery(&mut robot.events).await,
        SessionEvent::MessageReceived { .. }
    ));
}

#[tokio::test]
async fn nested_acknowledgment_fails_to_send() {
    let hub = LoopbackHub::new();
    let mut robot = peer(&hub, "robot", SessionConfig::default()).await;
    robot.manager.activate().await.unwrap();
    join(&mut robot).await;

    let nested = Command::acknowledge(Command::acknowledge(Command::Connected));
    let result = robot.manager.send(Service::Command(nested)).await;
    assert!(matches!(result, Err(SessionError::EncodingFailed(_))));
}

/// A transport whose single session is joined immediately and whose
/// messenger refuses every frame.
struct Refusing;

impl Activity for Refusing {
    fn metadata(&self) -> &ActivityMetadata {
        static METADATA: std::sync::OnceLock<ActivityMetadata> = std::sync::OnceLock::new();
        METADATA.get_or_init(ActivityMetadata::default)
    }

    fn activate(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }

    fn sessions(&self) -> BoxStream<'static, Arc<dyn GroupSession>> {
        let session: Arc<dyn GroupSession> = Arc::new(Refusing);
        stream::once(async move { session })
            .chain(stream::pending())
            .boxed()
    }
}

impl GroupSession for Refusing {
    fn id(&self) -> Uuid {
        Uuid::nil()
    }

    fn state(&self) -> SessionState {
        SessionState::Joined
    }

    fn state_changes(&self) -> BoxStream<'static, SessionState> {
        stream::once(async { SessionState::Joined })
            .chain(stream::pending())
            .boxed()
    }

    fn participant_count(&self) -> usize {
        1
    }

    fn participant_counts(&self) -> BoxStream<'static, usize> {
        stream::pending().boxed()
    }

    fn join(&self) {}

    fn leave(&self) {}

    fn messenger(&self) -> Arc<dyn Messenger> {
        Arc::new(Refusing)
    }
}

impl Messenger for Refusing {
    fn send(&self, _frame: Vec<u8>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async { Err(TransportError::Rejected("quota exceeded".to_string())) })
    }

    fn messages(&self) -> BoxStream<'static, InboundMessage> {
        stream::pending().boxed()
    }
}

#[tokio::test]
async fn send_failures_are_reported() {
    let (manager, mut events) =
        LifecycleManager::<Service>::new(Arc::new(Refusing), SessionConfig::default());
    manager.begin_waiting_for_sessions().await;
    wait_for(&mut events, "connected", |event| {
        matches!(event, SessionEvent::Connected)
    })
    .await;

    manager.join_session().await.unwrap();
    let expected =
        SessionError::SendFailed(TransportError::Rejected("quota exceeded".to_string()));
    let sent = manager.send(Service::RequestServices).await;
    assert!(sent.is_ok(), "transmission failure leaked to caller: {:?}", sent);
    wait_for(&mut events, "send failure", |event| {
        *event == SessionEvent::Error(expected.clone())
    })
    .await;
}
