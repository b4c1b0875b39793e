//! Television controller
//!
//! Drives the request/ack exchange with the set, tracks power and volume,
//! and publishes change events.
//!
//! One IO task owns the [`Link`]. Commands reach it through a bounded queue
//! and are handled strictly one at a time: write the frame, wait for the
//! ack, apply it, then wait out a short gap before the next write. Callers
//! that issue commands back to back are therefore serialised rather than
//! interleaved on the wire.
//!
//! When an ack reports the set switching from off to on, the IO task arms a
//! single deadline after which it queries the volume; the set cannot answer
//! volume queries while it is still booting. Closing the controller stops
//! the IO task and with it any pending deadline.

use crate::communication::link::Link;
use crate::communication::LineConfig;
use crate::protocol::codec::{self, parse_power_payload, parse_volume_payload};
use crate::protocol::{AckStatus, Command, DeviceCode};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Duration, Instant};
use tvctl_core::{
    ConnectionError, ConnectionState, ControllerError, DeviceState, EventFilter, EventSink,
    ProtocolError, Result, SubscriptionId, TvEvent,
};

/// Default serial device
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Controller timing and transport settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Device path used by [`TvController::connect`]
    pub port: String,
    /// Serial line attributes applied on open
    pub line: LineConfig,
    /// Wait after power-on before querying the volume
    pub power_on_query_delay: Duration,
    /// Minimum gap between the end of one exchange and the next write
    pub command_gap: Duration,
    /// How long to wait for an ack before giving up on it
    pub ack_timeout: Duration,
    /// Capacity of the command queue feeding the IO task
    pub queue_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            line: LineConfig::default(),
            power_on_query_delay: Duration::from_secs(5),
            command_gap: Duration::from_millis(100),
            ack_timeout: Duration::from_secs(2),
            queue_capacity: 16,
        }
    }
}

/// State shared between the controller handle and its IO task
struct Shared {
    device: RwLock<DeviceState>,
    connection: RwLock<ConnectionState>,
    events: EventSink,
}

impl Shared {
    fn set_connection(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.connection.write(), state);
        if previous != state {
            tracing::debug!("Connection state {} -> {}", previous, state);
        }
    }
}

/// What an accepted ack did to device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckOutcome {
    Power { turned_on: bool },
    Volume,
}

/// Controller for one television on one serial line
pub struct TvController {
    config: ControllerConfig,
    shared: Arc<Shared>,
    command_tx: Option<mpsc::Sender<Command>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    io_task: Option<JoinHandle<()>>,
}

impl TvController {
    /// Create a disconnected controller
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                device: RwLock::new(DeviceState::new()),
                connection: RwLock::new(ConnectionState::Disconnected),
                events: EventSink::new(),
            }),
            command_tx: None,
            shutdown_tx: None,
            io_task: None,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Open the configured port
    pub async fn connect(&mut self) -> Result<()> {
        let port = self.config.port.clone();
        self.open(&port).await
    }

    /// Configure and open the serial device at `port`, then query power
    ///
    /// On failure the controller stays disconnected and every command is a
    /// no-op until a later `open` succeeds.
    pub async fn open(&mut self, port: &str) -> Result<()> {
        self.ensure_not_ready()?;
        self.shared.set_connection(ConnectionState::Connecting);

        match Link::open(port, &self.config.line).await {
            Ok(link) => {
                self.start(link);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to open serial port {}: {}", port, e);
                self.shared.set_connection(ConnectionState::Disconnected);
                Err(e.into())
            }
        }
    }

    /// Attach an already open byte stream instead of a serial device
    pub async fn open_stream<S>(&mut self, port: &str, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.ensure_not_ready()?;
        self.shared.set_connection(ConnectionState::Connecting);
        self.start(Link::from_stream(port, stream));
        Ok(())
    }

    /// Stop the IO task and release the link
    ///
    /// A pending power-on volume query is discarded. Later commands are
    /// no-ops.
    pub async fn close(&mut self) {
        self.command_tx = None;

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut handle) = self.io_task.take() {
            if timeout(Duration::from_secs(1), &mut handle).await.is_err() {
                tracing::warn!("IO task did not stop in time, aborting");
                handle.abort();
            }
        }

        self.shared.set_connection(ConnectionState::Disconnected);
    }

    /// Switch the set on or off
    pub fn set_power(&self, on: bool) {
        self.enqueue(Command::power(on));
    }

    /// Set the volume; ignored while the set is off
    ///
    /// `level` is rounded to the nearest integer and clamped to `0..=64`.
    pub fn set_volume(&self, level: f64) {
        if !self.current_power() {
            tracing::debug!("Ignoring volume {} while powered off", level);
            return;
        }
        self.enqueue(Command::volume(level));
    }

    /// Ask the set for its power state
    pub fn query_power(&self) {
        self.enqueue(Command::query(DeviceCode::Power));
    }

    /// Ask the set for its volume
    pub fn query_volume(&self) {
        self.enqueue(Command::query(DeviceCode::Volume));
    }

    /// Last known power state
    pub fn current_power(&self) -> bool {
        self.shared.device.read().power
    }

    /// Last known volume
    pub fn current_volume(&self) -> u8 {
        self.shared.device.read().volume
    }

    /// Snapshot of the last known device state
    pub fn device_state(&self) -> DeviceState {
        *self.shared.device.read()
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.connection.read()
    }

    /// Register a handler for change events
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(TvEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(filter, handler)
    }

    /// Remove a handler registered with [`subscribe`](Self::subscribe)
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Receive change events asynchronously
    pub fn events(&self) -> broadcast::Receiver<TvEvent> {
        self.shared.events.receiver()
    }

    fn ensure_not_ready(&self) -> Result<()> {
        if self.connection_state() != ConnectionState::Disconnected {
            return Err(ControllerError::AlreadyConnected.into());
        }
        Ok(())
    }

    fn start<S>(&mut self, link: Link<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        // Clear out a task that ended on its own after a link error.
        if let Some(handle) = self.io_task.take() {
            handle.abort();
        }

        *self.shared.device.write() = DeviceState::new();

        let (command_tx, command_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let io_loop = IoLoop {
            link,
            shared: self.shared.clone(),
            power_on_query_delay: self.config.power_on_query_delay,
            command_gap: self.config.command_gap,
            ack_timeout: self.config.ack_timeout,
            volume_query_at: None,
        };

        self.io_task = Some(tokio::spawn(io_loop.run(command_rx, shutdown_rx)));
        self.command_tx = Some(command_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.shared.set_connection(ConnectionState::Ready);

        // Synchronise with whatever state the set is in.
        self.enqueue(Command::query(DeviceCode::Power));
    }

    fn enqueue(&self, command: Command) {
        if !self.connection_state().is_ready() {
            tracing::debug!("Not connected, dropping {}", command);
            return;
        }

        let Some(tx) = &self.command_tx else {
            return;
        };

        match tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                tracing::warn!(
                    "{}",
                    ControllerError::QueueFull {
                        command: command.to_string()
                    }
                );
            }
            Err(mpsc::error::TrySendError::Closed(command)) => {
                tracing::debug!("IO task stopped, dropping {}", command);
            }
        }
    }
}

impl Drop for TvController {
    fn drop(&mut self) {
        if let Some(handle) = self.io_task.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for TvController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TvController")
            .field("port", &self.config.port)
            .field("connection", &self.connection_state())
            .field("device", &self.device_state())
            .finish()
    }
}

/// The single logical thread of control that owns the link
struct IoLoop<S> {
    link: Link<S>,
    shared: Arc<Shared>,
    power_on_query_delay: Duration,
    command_gap: Duration,
    ack_timeout: Duration,
    /// Deadline of the pending post-power-on volume query
    volume_query_at: Option<Instant>,
}

impl<S> IoLoop<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            let command = tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = wait_until(self.volume_query_at) => {
                    self.volume_query_at = None;
                    Command::query(DeviceCode::Volume)
                }
                command = command_rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            let exchanged = tokio::select! {
                _ = &mut shutdown_rx => break,
                result = self.exchange(&command) => result,
            };

            if let Err(e) = exchanged {
                tracing::error!("Serial link {} failed: {}", self.link.port(), e);
                break;
            }

            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = sleep(self.command_gap) => {}
            }
        }

        self.link.close().await;
        self.shared.set_connection(ConnectionState::Disconnected);
    }

    /// One request/ack cycle
    async fn exchange(&mut self, command: &Command) -> std::result::Result<(), ConnectionError> {
        tracing::debug!("-> {}", command);
        self.link.write_frame(&codec::encode(command)).await?;

        let raw = match timeout(self.ack_timeout, self.link.read_frame()).await {
            Ok(raw) => raw?,
            Err(_) => {
                tracing::warn!("No ack for {} within {:?}", command, self.ack_timeout);
                return Ok(());
            }
        };

        tracing::debug!("<- {}", String::from_utf8_lossy(&raw));
        self.on_frame_received(&raw);
        Ok(())
    }

    fn on_frame_received(&mut self, raw: &[u8]) {
        match apply_frame(&self.shared, raw) {
            Ok(AckOutcome::Power { turned_on: true }) => {
                tracing::info!(
                    "Set powered on, querying volume in {:?}",
                    self.power_on_query_delay
                );
                self.volume_query_at = Some(Instant::now() + self.power_on_query_delay);
            }
            Ok(_) => {}
            Err(e @ ProtocolError::UnknownCommandCode { .. }) => tracing::warn!("{}", e),
            Err(e) => tracing::error!("{}", e),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Decode a frame and fold it into device state, publishing any change
///
/// State is only touched for OK acks with a recognised code.
fn apply_frame(shared: &Shared, raw: &[u8]) -> std::result::Result<AckOutcome, ProtocolError> {
    let ack = codec::decode(raw)?;

    if let AckStatus::Failed(status) = &ack.status {
        return Err(ProtocolError::BadAck {
            code: ack.code.clone(),
            status: status.clone(),
        });
    }

    match ack.device_code() {
        Some(DeviceCode::Power) => {
            let power = parse_power_payload(&ack.payload);
            let was_on = {
                let mut device = shared.device.write();
                std::mem::replace(&mut device.power, power)
            };
            shared.events.publish(TvEvent::PowerChanged(power));
            Ok(AckOutcome::Power {
                turned_on: !was_on && power,
            })
        }
        Some(DeviceCode::Volume) => {
            let volume = parse_volume_payload(&ack.payload)?;
            shared.device.write().volume = volume;
            shared.events.publish(TvEvent::VolumeChanged(volume));
            Ok(AckOutcome::Volume)
        }
        None => Err(ProtocolError::UnknownCommandCode { code: ack.code }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn shared() -> Shared {
        Shared {
            device: RwLock::new(DeviceState::new()),
            connection: RwLock::new(ConnectionState::Ready),
            events: EventSink::new(),
        }
    }

    fn recorded(shared: &Shared) -> Arc<Mutex<Vec<TvEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        shared
            .events
            .subscribe(EventFilter::All, move |event| sink.lock().push(event));
        events
    }

    #[test]
    fn test_power_on_ack() {
        let shared = shared();
        let events = recorded(&shared);

        let outcome = apply_frame(&shared, b"ka 00 OK01").unwrap();
        assert_eq!(outcome, AckOutcome::Power { turned_on: true });
        assert!(shared.device.read().power);
        assert_eq!(*events.lock(), vec![TvEvent::PowerChanged(true)]);

        // Already on: no transition.
        let outcome = apply_frame(&shared, b"a 00 OK01").unwrap();
        assert_eq!(outcome, AckOutcome::Power { turned_on: false });
    }

    #[test]
    fn test_trailing_field_after_payload_is_ignored() {
        let shared = shared();

        let outcome = apply_frame(&shared, b"ka 00 OK01 x").unwrap();
        assert_eq!(outcome, AckOutcome::Power { turned_on: true });
        assert!(shared.device.read().power);
    }

    #[test]
    fn test_power_payload_other_than_one_is_off() {
        let shared = shared();
        shared.device.write().power = true;
        let events = recorded(&shared);

        apply_frame(&shared, b"ka 00 OK02").unwrap();
        assert!(!shared.device.read().power);
        assert_eq!(*events.lock(), vec![TvEvent::PowerChanged(false)]);
    }

    #[test]
    fn test_volume_ack() {
        let shared = shared();
        let events = recorded(&shared);

        assert_eq!(apply_frame(&shared, b"kf 00 OK40"), Ok(AckOutcome::Volume));
        assert_eq!(shared.device.read().volume, 64);
        apply_frame(&shared, b"kf 00 OK00").unwrap();
        assert_eq!(shared.device.read().volume, 0);

        assert_eq!(
            *events.lock(),
            vec![TvEvent::VolumeChanged(64), TvEvent::VolumeChanged(0)]
        );
    }

    #[test]
    fn test_rejected_frames_leave_state_alone() {
        let shared = shared();
        shared.device.write().volume = 12;
        let events = recorded(&shared);

        assert!(matches!(
            apply_frame(&shared, b"ka 00 NG01"),
            Err(ProtocolError::BadAck { .. })
        ));
        assert!(matches!(
            apply_frame(&shared, b"kf 00 NG20"),
            Err(ProtocolError::BadAck { .. })
        ));
        assert!(matches!(
            apply_frame(&shared, b"kb 00 OK01"),
            Err(ProtocolError::UnknownCommandCode { .. })
        ));
        assert!(matches!(
            apply_frame(&shared, b"garbage"),
            Err(ProtocolError::MalformedFrame { .. })
        ));
        assert!(matches!(
            apply_frame(&shared, b"kf 00 OKzz"),
            Err(ProtocolError::InvalidPayload { .. })
        ));

        assert_eq!(*shared.device.read(), DeviceState { power: false, volume: 12 });
        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_commands_are_noops_while_disconnected() {
        let controller = TvController::new(ControllerConfig::default());
        controller.set_power(true);
        controller.set_volume(10.0);
        controller.query_power();

        assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
        assert!(!controller.current_power());
        assert_eq!(controller.current_volume(), 0);
    }

    #[tokio::test]
    async fn test_failed_open_stays_disconnected() {
        let mut controller = TvController::new(ControllerConfig::default());
        let result = controller.open("/dev/tvctl-does-not-exist").await;

        assert!(result.unwrap_err().is_connection_error());
        assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
    }
}
