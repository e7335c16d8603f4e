//! Tracing-backed collaborator stand-in.
//!
//! [`TraceInput`] logs every event instead of injecting it, so the server
//! runs end-to-end on any machine without a platform injector.  The binary
//! wires this in by default; deployments swap in a real adapter.

use iobus_core::protocol::messages::{ClickAction, KeyAction, ModifierFlags, MouseButton};
use tracing::{debug, info};

use super::{InputError, KeyboardInput, PointerInput, SystemControl, SystemQuery};

/// Logs events at `debug` (high-frequency pointer/key traffic) and `info`
/// (discrete system actions); always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceInput;

impl TraceInput {
    pub fn new() -> Self {
        Self
    }
}

impl PointerInput for TraceInput {
    fn pointer_move(&self, dx: i16, dy: i16) -> Result<(), InputError> {
        debug!(dx, dy, "pointer move");
        Ok(())
    }

    fn click(&self, button: MouseButton, action: ClickAction) -> Result<(), InputError> {
        debug!(?button, ?action, "pointer click");
        Ok(())
    }

    fn scroll(&self, dx: i16, dy: i16) -> Result<(), InputError> {
        debug!(dx, dy, "pointer scroll");
        Ok(())
    }

    fn drag(&self, button: MouseButton, dx: i16, dy: i16) -> Result<(), InputError> {
        debug!(?button, dx, dy, "pointer drag");
        Ok(())
    }
}

impl KeyboardInput for TraceInput {
    fn key_event(
        &self,
        action: KeyAction,
        keycode: u16,
        modifiers: ModifierFlags,
    ) -> Result<(), InputError> {
        debug!(?action, keycode = format_args!("0x{keycode:04X}"), mods = modifiers.0, "key event");
        Ok(())
    }
}

impl SystemControl for TraceInput {
    fn lock_screen(&self) -> Result<(), InputError> {
        info!("action: lock screen");
        Ok(())
    }

    fn show_power_dialog(&self) -> Result<(), InputError> {
        info!("action: show power dialog");
        Ok(())
    }

    fn sleep(&self) -> Result<(), InputError> {
        info!("action: sleep");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), InputError> {
        info!("action: shutdown");
        Ok(())
    }

    fn restart(&self) -> Result<(), InputError> {
        info!("action: restart");
        Ok(())
    }

    fn launch_app(&self, app_name: &str) -> Result<(), InputError> {
        info!(app_name, "action: launch app");
        Ok(())
    }
}

impl SystemQuery for TraceInput {
    // Safe fallbacks; a platform adapter would query the OS here.
    fn brightness(&self) -> f32 {
        0.5
    }

    fn volume(&self) -> f32 {
        0.5
    }
}
