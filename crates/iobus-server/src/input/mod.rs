//! Input collaborator interfaces.
//!
//! The server core never touches OS injection APIs directly.  Decoded
//! events are forwarded through these traits; platform adapters (CGEvent,
//! SendInput, XTest, ...) implement them out of tree.  Injected at
//! construction time, which keeps the dispatchers fully unit-testable.

use iobus_core::protocol::messages::{ClickAction, KeyAction, ModifierFlags, MouseButton};
use thiserror::Error;

pub mod mock;
pub mod trace;

/// Error type for collaborator failures.
///
/// Failures are always contained at the call site: on the data plane they
/// are logged and the receive loop continues; on the control plane they are
/// converted to a `CommandError` reply.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input injection failed: {0}")]
    Injection(String),

    #[error("failed to launch app '{app}': {reason}")]
    Launch { app: String, reason: String },
}

/// Pointer injection.
#[cfg_attr(test, mockall::automock)]
pub trait PointerInput: Send + Sync {
    /// Moves the cursor by a relative delta.
    fn pointer_move(&self, dx: i16, dy: i16) -> Result<(), InputError>;

    /// Presses or releases a button at the current position.
    fn click(&self, button: MouseButton, action: ClickAction) -> Result<(), InputError>;

    /// Injects a scroll wheel event.
    fn scroll(&self, dx: i16, dy: i16) -> Result<(), InputError>;

    /// Moves the cursor while a button is held.
    fn drag(&self, button: MouseButton, dx: i16, dy: i16) -> Result<(), InputError>;
}

/// Keyboard injection.
#[cfg_attr(test, mockall::automock)]
pub trait KeyboardInput: Send + Sync {
    /// Injects one key-down or key-up event.
    fn key_event(
        &self,
        action: KeyAction,
        keycode: u16,
        modifiers: ModifierFlags,
    ) -> Result<(), InputError>;
}

/// System/power actions and application launching.
#[cfg_attr(test, mockall::automock)]
pub trait SystemControl: Send + Sync {
    fn lock_screen(&self) -> Result<(), InputError>;
    fn show_power_dialog(&self) -> Result<(), InputError>;
    fn sleep(&self) -> Result<(), InputError>;
    fn shutdown(&self) -> Result<(), InputError>;
    fn restart(&self) -> Result<(), InputError>;

    /// Launches an application by name.
    fn launch_app(&self, app_name: &str) -> Result<(), InputError>;
}

/// Read-only system state queries.
///
/// Implementations must return a safe fallback (e.g. 0.5) rather than fail
/// when the underlying query errors out.
#[cfg_attr(test, mockall::automock)]
pub trait SystemQuery: Send + Sync {
    /// Current display brightness in 0.0–1.0.
    fn brightness(&self) -> f32;

    /// Current output volume in 0.0–1.0.
    fn volume(&self) -> f32;
}
