//! Loopback demo: a controller drives a simulated robot.
//!
//! Both participants run a [`LifecycleManager`] on one [`LoopbackHub`]. The
//! robot joins as soon as a session is offered and answers every command:
//! `requestStatus` with a status snapshot, everything else with an
//! acknowledgment. The controller sends its script one command at a time and
//! waits for each answer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use exerciser_core::StatusSnapshot;
use exerciser_protocol::{Command, Service};
use exerciser_session::{
    AvailabilityMonitor, LifecycleManager, LoopbackHub, SessionConfig, SessionEvent,
};

use crate::config::{ClientConfig, DemoSettings, parse_script};
use crate::error::{ClientError, ClientResult};

type Manager = LifecycleManager<Service>;
type Events = UnboundedReceiver<SessionEvent<Service>>;

/// One scripted command and the robot's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub sent: Command,
    pub reply: Command,
}

/// Run the demo with `keys`, or the configured script when empty.
pub async fn run(config: &ClientConfig, keys: &[String], trace_messages: bool) -> ClientResult<()> {
    let script = if keys.is_empty() {
        config.demo.script_commands()
    } else {
        parse_script(keys)
    }
    .map_err(ClientError::Config)?;

    let mut session = config.session.to_session_config();
    if trace_messages {
        session = session.with_trace_messages(true);
    }

    let exchanges = run_script(&config.demo, session, script).await?;
    println!();
    println!("{} command(s) answered", exchanges.len());
    Ok(())
}

/// Drives `script` from the controller and collects the robot's answers.
pub async fn run_script(
    settings: &DemoSettings,
    session: SessionConfig,
    script: Vec<Command>,
) -> ClientResult<Vec<Exchange>> {
    let timeout = settings.reply_timeout();
    let hub = LoopbackHub::new();

    let availability = AvailabilityMonitor::spawn(hub.eligibility());
    if !availability.wait_until(true).await {
        return Err(ClientError::Config(
            "group sessions are not available".to_string(),
        ));
    }

    let (robot, robot_events) =
        Manager::new(Arc::new(hub.device(&settings.robot_name)), session.clone());
    let (phone, mut phone_events) =
        Manager::new(Arc::new(hub.device(&settings.phone_name)), session);
    let robot = Arc::new(robot);

    robot.begin_waiting_for_sessions().await;
    phone.begin_waiting_for_sessions().await;
    let robot_task = tokio::spawn(serve_robot(
        Arc::clone(&robot),
        robot_events,
        robot_status(settings),
    ));

    let result = drive(&phone, &mut phone_events, script, timeout).await;

    phone.reset().await;
    robot.reset().await;
    robot_task.abort();
    result
}

/// The controller's side: join, handshake, then send each command and await
/// its answer.
async fn drive(
    phone: &Manager,
    events: &mut Events,
    script: Vec<Command>,
    timeout: Duration,
) -> ClientResult<Vec<Exchange>> {
    phone.activate().await?;
    expect(events, timeout, "a session offer", |event| {
        matches!(event, SessionEvent::StatusChanged { .. })
    })
    .await?;

    phone.join_session().await?;
    expect(events, timeout, "the robot to join", |event| {
        matches!(event, SessionEvent::ParticipantsChanged { count } if *count >= 2)
    })
    .await?;

    phone.send(Service::RequestServices).await?;
    expect(events, timeout, "the robot's services", |event| {
        received(event) == Some(&Command::Connected)
    })
    .await?;

    let mut exchanges = Vec::with_capacity(script.len());
    for command in script {
        phone.send(Service::Command(command.clone())).await?;
        let event = expect(
            events,
            timeout,
            &format!("an answer to `{}`", command.key()),
            |event| received(event).is_some_and(|reply| answers(&command, reply)),
        )
        .await?;

        if let Some(reply) = received(&event) {
            exchanges.push(Exchange {
                sent: command,
                reply: reply.clone(),
            });
        }
    }
    Ok(exchanges)
}

fn robot_status(settings: &DemoSettings) -> StatusSnapshot {
    StatusSnapshot {
        robot_is_connected: true,
        robot_drivable: true,
        robot_head_tiltable: true,
        robot_model_number: "loopback".to_string(),
        ..StatusSnapshot::none()
            .with_robot_name(settings.robot_name.as_str())
            .with_phone_name(settings.phone_name.as_str())
            .with_battery(0.8, false)
            .with_phone_battery(0.6, true)
    }
}

/// The command carried by a delivered message.
fn received(event: &SessionEvent<Service>) -> Option<&Command> {
    match event {
        SessionEvent::MessageReceived { envelope, .. } => envelope.payload.command(),
        _ => None,
    }
}

fn answers(sent: &Command, reply: &Command) -> bool {
    match (sent, reply) {
        (Command::RequestStatus, Command::Status(_)) => true,
        (sent, reply) => reply.acknowledged().map(Command::key) == Some(sent.key()),
    }
}

/// Prints controller events until one matches.
async fn expect(
    events: &mut Events,
    timeout: Duration,
    what: &str,
    matches: impl Fn(&SessionEvent<Service>) -> bool,
) -> ClientResult<SessionEvent<Service>> {
    let deadline = Instant::now() + timeout;
    loop {
        let event = match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                return Err(ClientError::Timeout(format!(
                    "controller stopped while waiting for {}",
                    what
                )));
            }
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "no {} within {:?}",
                    what, timeout
                )));
            }
        };

        println!("[controller] {}", event);
        if matches(&event) {
            return Ok(event);
        }
    }
}

/// Joins every offered session and answers each command.
async fn serve_robot(robot: Arc<Manager>, mut events: Events, snapshot: StatusSnapshot) {
    while let Some(event) = events.recv().await {
        println!("[robot]      {}", event);

        let reply = match event {
            SessionEvent::StatusChanged { status } if status == "waiting" => {
                if let Err(e) = robot.join_session().await {
                    warn!(error = %e, "robot failed to join");
                }
                continue;
            }
            SessionEvent::MessageReceived { envelope, .. } => match envelope.payload {
                Service::RequestServices => Command::Connected,
                Service::Command(Command::RequestStatus) => Command::Status(snapshot.clone()),
                Service::Command(command) if command.is_acknowledgment() => continue,
                Service::Command(command) => Command::acknowledge(command),
            },
            _ => continue,
        };

        debug!(reply = %reply, "robot answering");
        if let Err(e) = robot.send(Service::Command(reply)).await {
            warn!(error = %e, "robot failed to answer");
        }
    }
    info!("robot stopped");
}
