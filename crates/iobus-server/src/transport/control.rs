//! TCP control plane.
//!
//! [`ControlConnection`] is a pure state machine: bytes in, frames out.
//! It owns no socket, which is what makes the session logic testable
//! without networking.  [`run_control_server`] is the thin tokio shell
//! around it: one accept loop, one task per connection, each task
//! multiplexing socket reads, its keepalive timer and shutdown with
//! `select!`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use iobus_core::protocol::codec::encode_message;
use iobus_core::protocol::framing::FrameBuffer;
use iobus_core::protocol::messages::{
    HandshakeAck, HandshakeReject, HandshakeReq, LaunchApp, Message, RejectReason,
    SystemStateResponse, PROTOCOL_VERSION,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::input::{SystemControl, SystemQuery};
use crate::session::{AdmitError, SessionRegistry};

/// Control-plane knobs, lifted out of [`ServerConfig`] so connections do
/// not carry the whole config around.
#[derive(Debug, Clone, Copy)]
pub struct ControlSettings {
    /// Advertised in the handshake ack so clients know where to send data.
    pub udp_port: u16,
    /// Ping period in seconds, also advertised in the ack.
    pub keepalive_interval: u16,
    /// Silence threshold after which the client is evicted.
    pub keepalive_timeout: Duration,
}

impl From<&ServerConfig> for ControlSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            udp_port: config.udp_port,
            keepalive_interval: config.keepalive_interval,
            keepalive_timeout: config.keepalive_timeout(),
        }
    }
}

/// What a connection wants done after handling an event: frames to write,
/// and whether to close the socket afterwards.
#[derive(Debug, Default)]
pub struct Output {
    pub frames: Vec<Vec<u8>>,
    pub close: bool,
}

impl Output {
    fn reply(&mut self, message: &Message) {
        self.frames.push(encode_message(message));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    AwaitingHandshake,
    Active { session_id: Uuid },
    Closed,
}

/// Per-connection control-plane state machine.
pub struct ControlConnection {
    peer: std::net::SocketAddr,
    state: ConnState,
    frames: FrameBuffer,
    registry: SessionRegistry,
    settings: ControlSettings,
    control: Arc<dyn SystemControl>,
    query: Arc<dyn SystemQuery>,
}

impl ControlConnection {
    pub fn new(
        peer: std::net::SocketAddr,
        registry: SessionRegistry,
        settings: ControlSettings,
        control: Arc<dyn SystemControl>,
        query: Arc<dyn SystemQuery>,
    ) -> Self {
        Self {
            peer,
            state: ConnState::AwaitingHandshake,
            frames: FrameBuffer::new(),
            registry,
            settings,
            control,
            query,
        }
    }

    /// Feeds received bytes through the frame buffer and handles every
    /// complete message found.  A malformed header is fatal: the session
    /// (if any) is torn down and the caller must close the socket.
    pub fn on_bytes(&mut self, chunk: &[u8]) -> Output {
        self.frames.extend(chunk);
        let mut out = Output::default();
        loop {
            if out.close {
                break;
            }
            match self.frames.next_message() {
                Ok(Some(message)) => self.handle_message(message, &mut out),
                Ok(None) => break,
                Err(error) => {
                    warn!(peer = %self.peer, %error, "unrecoverable stream error, dropping connection");
                    self.teardown();
                    out.close = true;
                    break;
                }
            }
        }
        out
    }

    /// Driven by the connection task's keepalive timer.  Sends a ping, or
    /// evicts the client when it has been silent past the timeout.
    pub fn on_keepalive_tick(&mut self, now: Instant) -> Output {
        let ConnState::Active { session_id } = self.state else {
            return Output::default();
        };
        let mut out = Output::default();
        match self.registry.last_pong(session_id) {
            Some(last_pong) if now.duration_since(last_pong) > self.settings.keepalive_timeout => {
                warn!(
                    peer = %self.peer,
                    timeout_secs = self.settings.keepalive_timeout.as_secs(),
                    "keepalive timeout, evicting client"
                );
                self.teardown();
                out.close = true;
            }
            Some(_) => out.reply(&Message::Ping),
            None => {
                // Session already gone; nothing left to keep alive.
                self.state = ConnState::Closed;
                out.close = true;
            }
        }
        out
    }

    /// Called when the peer disconnects without a Disconnect message
    /// (EOF, reset, server shutdown).
    pub fn on_connection_lost(&mut self) {
        if let ConnState::Active { .. } = self.state {
            info!(peer = %self.peer, "connection lost, evicting client");
        }
        self.teardown();
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ConnState::Active { .. })
    }

    fn teardown(&mut self) {
        if let ConnState::Active { session_id } = self.state {
            self.registry.evict(session_id);
        }
        self.state = ConnState::Closed;
    }

    fn handle_message(&mut self, message: Message, out: &mut Output) {
        match self.state {
            ConnState::AwaitingHandshake => match message {
                Message::HandshakeReq(req) => self.handle_handshake(req, out),
                other => {
                    warn!(
                        peer = %self.peer,
                        msg_type = ?other.message_type(),
                        "message before handshake"
                    );
                    out.reply(&Message::Error("handshake required".to_string()));
                }
            },
            ConnState::Active { session_id } => self.handle_active(session_id, message, out),
            ConnState::Closed => {}
        }
    }

    fn handle_handshake(&mut self, req: HandshakeReq, out: &mut Output) {
        info!(
            peer = %self.peer,
            client = %req.client_name,
            version = req.client_version,
            "handshake request"
        );
        if req.client_version != u16::from(PROTOCOL_VERSION) {
            warn!(
                peer = %self.peer,
                client_version = req.client_version,
                server_version = PROTOCOL_VERSION,
                "protocol version mismatch"
            );
            out.reply(&Message::HandshakeReject(HandshakeReject {
                server_version: u16::from(PROTOCOL_VERSION),
                reason: RejectReason::VersionMismatch,
            }));
            return;
        }
        match self
            .registry
            .admit(req.client_name.clone(), self.peer, req.client_version)
        {
            Ok(session_id) => {
                info!(peer = %self.peer, client = %req.client_name, %session_id, "client admitted");
                self.state = ConnState::Active { session_id };
                out.reply(&Message::HandshakeAck(HandshakeAck {
                    server_version: u16::from(PROTOCOL_VERSION),
                    flags: 0,
                    udp_port: self.settings.udp_port,
                    keepalive_interval: self.settings.keepalive_interval,
                }));
            }
            Err(AdmitError::Busy) => {
                warn!(peer = %self.peer, client = %req.client_name, "rejecting client, server busy");
                out.reply(&Message::HandshakeReject(HandshakeReject {
                    server_version: u16::from(PROTOCOL_VERSION),
                    reason: RejectReason::Busy,
                }));
            }
        }
    }

    fn handle_active(&mut self, session_id: Uuid, message: Message, out: &mut Output) {
        match message {
            Message::Ping => out.reply(&Message::Pong),
            Message::Pong => self.registry.touch_pong(session_id, Instant::now()),
            Message::Disconnect => {
                info!(peer = %self.peer, "client disconnecting");
                self.teardown();
                out.close = true;
            }
            Message::GetSystemState => {
                let response = SystemStateResponse {
                    brightness: self.query.brightness(),
                    volume: self.query.volume(),
                    is_muted: false,
                    is_locked: false,
                };
                debug!(
                    peer = %self.peer,
                    brightness = response.brightness,
                    volume = response.volume,
                    "system state queried"
                );
                out.reply(&Message::SystemStateResponse(response));
            }
            Message::LaunchApp(launch) => self.handle_launch(&launch, out),
            other => {
                warn!(
                    peer = %self.peer,
                    msg_type = ?other.message_type(),
                    "unexpected message on control channel"
                );
                out.reply(&Message::Error(format!(
                    "unexpected message type {:?}",
                    other.message_type()
                )));
            }
        }
    }

    fn handle_launch(&mut self, launch: &LaunchApp, out: &mut Output) {
        if launch.app_name.is_empty() {
            warn!(peer = %self.peer, "launch request with empty app name");
            out.reply(&Message::CommandError(0));
            return;
        }
        match self.control.launch_app(&launch.app_name) {
            Ok(()) => {
                info!(peer = %self.peer, app = %launch.app_name, "app launched");
                out.reply(&Message::Ack(0));
            }
            Err(error) => {
                warn!(peer = %self.peer, app = %launch.app_name, %error, "app launch failed");
                out.reply(&Message::CommandError(0));
            }
        }
    }
}

/// Accepts control connections until shutdown is signalled.
pub async fn run_control_server(
    listener: TcpListener,
    registry: SessionRegistry,
    settings: ControlSettings,
    control: Arc<dyn SystemControl>,
    query: Arc<dyn SystemQuery>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(address = %listener.local_addr()?, "control server listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "control connection accepted");
                    let connection = ControlConnection::new(
                        peer,
                        registry.clone(),
                        settings,
                        Arc::clone(&control),
                        Arc::clone(&query),
                    );
                    tokio::spawn(drive_connection(stream, connection, settings, shutdown.clone()));
                }
                Err(error) => {
                    warn!(%error, "accept failed");
                }
            },
            _ = shutdown.changed() => {
                info!("control server stopping");
                break;
            }
        }
    }
    Ok(())
}

/// Pumps one connection: socket reads and keepalive ticks go into the
/// state machine, its output frames go back out on the socket.
async fn drive_connection(
    stream: TcpStream,
    mut connection: ControlConnection,
    settings: ControlSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let (mut reader, mut writer) = stream.into_split();
    // An interval of zero would spin; clamp to one second.
    let period = Duration::from_secs(u64::from(settings.keepalive_interval).max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = vec![0u8; 4096];
    loop {
        let out = tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    connection.on_connection_lost();
                    break;
                }
                Ok(n) => connection.on_bytes(&buf[..n]),
                Err(error) => {
                    debug!(%error, "control read failed");
                    connection.on_connection_lost();
                    break;
                }
            },
            _ = ticker.tick() => connection.on_keepalive_tick(Instant::now()),
            _ = shutdown.changed() => {
                connection.on_connection_lost();
                break;
            }
        };
        for frame in &out.frames {
            if let Err(error) = writer.write_all(frame).await {
                debug!(%error, "control write failed");
                connection.on_connection_lost();
                return;
            }
        }
        if out.close {
            let _ = writer.shutdown().await;
            break;
        }
    }
}
