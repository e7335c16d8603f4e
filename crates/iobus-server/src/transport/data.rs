//! UDP data plane.
//!
//! Stateless: every datagram stands alone.  The only admission check is
//! that the source IP matches the active control-plane session, and any
//! bad datagram or collaborator failure is contained to that one event so
//! a ~60 Hz input stream is never interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use iobus_core::protocol::codec::decode_message;
use iobus_core::protocol::messages::{Message, SystemActionId, HEADER_SIZE};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::input::{KeyboardInput, PointerInput, SystemControl};
use crate::session::SessionRegistry;

/// Routes validated datagrams to the input collaborators.
pub struct DataDispatcher {
    registry: SessionRegistry,
    pointer: Arc<dyn PointerInput>,
    keyboard: Arc<dyn KeyboardInput>,
    system: Arc<dyn SystemControl>,
}

impl DataDispatcher {
    pub fn new(
        registry: SessionRegistry,
        pointer: Arc<dyn PointerInput>,
        keyboard: Arc<dyn KeyboardInput>,
        system: Arc<dyn SystemControl>,
    ) -> Self {
        Self {
            registry,
            pointer,
            keyboard,
            system,
        }
    }

    /// Handles one datagram.  Never fails; invalid or unauthorized
    /// datagrams are dropped with at most a debug log.
    pub fn handle_datagram(&self, data: &[u8], src: SocketAddr) {
        if data.len() < HEADER_SIZE {
            debug!(%src, len = data.len(), "runt datagram dropped");
            return;
        }
        let Some(active_ip) = self.registry.active_peer_ip() else {
            debug!(%src, "datagram with no active session dropped");
            return;
        };
        if src.ip() != active_ip {
            debug!(%src, %active_ip, "datagram from unauthorized source dropped");
            return;
        }
        let message = match decode_message(data) {
            Ok((message, _)) => message,
            Err(error) => {
                debug!(%src, %error, "undecodable datagram dropped");
                return;
            }
        };
        self.dispatch(message);
    }

    fn dispatch(&self, message: Message) {
        let result = match message {
            Message::MouseMove(m) => self.pointer.pointer_move(m.dx, m.dy),
            Message::MouseClick(m) => self.pointer.click(m.button, m.action),
            Message::MouseScroll(m) => self.pointer.scroll(m.dx, m.dy),
            Message::MouseDrag(m) => self.pointer.drag(m.button, m.dx, m.dy),
            Message::KeyEvent(k) => self.keyboard.key_event(k.action, k.keycode, k.modifiers),
            Message::SystemAction(a) => self.system_action(a.action_id),
            other => {
                debug!(msg_type = ?other.message_type(), "unroutable message on data plane");
                return;
            }
        };
        if let Err(error) = result {
            warn!(%error, "input injection failed");
        }
    }

    fn system_action(&self, action_id: SystemActionId) -> Result<(), crate::input::InputError> {
        match action_id {
            SystemActionId::LockScreen => self.system.lock_screen(),
            SystemActionId::PowerDialog => self.system.show_power_dialog(),
            SystemActionId::Sleep => self.system.sleep(),
            SystemActionId::Shutdown => self.system.shutdown(),
            SystemActionId::Restart => self.system.restart(),
        }
    }
}

/// Receives datagrams until shutdown is signalled.
pub async fn run_data_server(
    socket: UdpSocket,
    dispatcher: DataDispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(address = %socket.local_addr()?, "data server listening");
    let mut buf = vec![0u8; 2048];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, src)) => dispatcher.handle_datagram(&buf[..len], src),
                Err(error) => {
                    warn!(%error, "udp receive failed");
                }
            },
            _ = shutdown.changed() => {
                info!("data server stopping");
                break;
            }
        }
    }
    Ok(())
}
