//! Recording input collaborators for testing.
//!
//! [`RecordingInput`] implements every collaborator trait and records each
//! call in order, letting unit and integration tests assert exactly which
//! events reached the "OS" without any platform APIs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use iobus_core::protocol::messages::{ClickAction, KeyAction, ModifierFlags, MouseButton};

use super::{InputError, KeyboardInput, PointerInput, SystemControl, SystemQuery};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    Move { dx: i16, dy: i16 },
    Click { button: MouseButton, action: ClickAction },
    Scroll { dx: i16, dy: i16 },
    Drag { button: MouseButton, dx: i16, dy: i16 },
    Key { action: KeyAction, keycode: u16, modifiers: ModifierFlags },
    LockScreen,
    PowerDialog,
    Sleep,
    Shutdown,
    Restart,
    Launch(String),
}

/// Collaborator stand-in that records every call.
pub struct RecordingInput {
    events: Mutex<Vec<RecordedEvent>>,
    fail_launch: AtomicBool,
    brightness: f32,
    volume: f32,
}

impl RecordingInput {
    pub fn new() -> Self {
        Self::with_levels(0.5, 0.5)
    }

    /// Creates a recorder whose [`SystemQuery`] reports the given levels.
    pub fn with_levels(brightness: f32, volume: f32) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_launch: AtomicBool::new(false),
            brightness,
            volume,
        }
    }

    /// Makes subsequent [`SystemControl::launch_app`] calls fail.
    pub fn fail_launches(&self) {
        self.fail_launch.store(true, Ordering::Relaxed);
    }

    /// Drains and returns all recorded events in call order.
    pub fn take(&self) -> Vec<RecordedEvent> {
        std::mem::take(&mut *self.events.lock().expect("lock poisoned"))
    }

    /// Number of recorded events without draining.
    pub fn len(&self) -> usize {
        self.events.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, event: RecordedEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}

impl Default for RecordingInput {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerInput for RecordingInput {
    fn pointer_move(&self, dx: i16, dy: i16) -> Result<(), InputError> {
        self.record(RecordedEvent::Move { dx, dy });
        Ok(())
    }

    fn click(&self, button: MouseButton, action: ClickAction) -> Result<(), InputError> {
        self.record(RecordedEvent::Click { button, action });
        Ok(())
    }

    fn scroll(&self, dx: i16, dy: i16) -> Result<(), InputError> {
        self.record(RecordedEvent::Scroll { dx, dy });
        Ok(())
    }

    fn drag(&self, button: MouseButton, dx: i16, dy: i16) -> Result<(), InputError> {
        self.record(RecordedEvent::Drag { button, dx, dy });
        Ok(())
    }
}

impl KeyboardInput for RecordingInput {
    fn key_event(
        &self,
        action: KeyAction,
        keycode: u16,
        modifiers: ModifierFlags,
    ) -> Result<(), InputError> {
        self.record(RecordedEvent::Key {
            action,
            keycode,
            modifiers,
        });
        Ok(())
    }
}

impl SystemControl for RecordingInput {
    fn lock_screen(&self) -> Result<(), InputError> {
        self.record(RecordedEvent::LockScreen);
        Ok(())
    }

    fn show_power_dialog(&self) -> Result<(), InputError> {
        self.record(RecordedEvent::PowerDialog);
        Ok(())
    }

    fn sleep(&self) -> Result<(), InputError> {
        self.record(RecordedEvent::Sleep);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), InputError> {
        self.record(RecordedEvent::Shutdown);
        Ok(())
    }

    fn restart(&self) -> Result<(), InputError> {
        self.record(RecordedEvent::Restart);
        Ok(())
    }

    fn launch_app(&self, app_name: &str) -> Result<(), InputError> {
        if self.fail_launch.load(Ordering::Relaxed) {
            return Err(InputError::Launch {
                app: app_name.to_string(),
                reason: "launch disabled by test".to_string(),
            });
        }
        self.record(RecordedEvent::Launch(app_name.to_string()));
        Ok(())
    }
}

impl SystemQuery for RecordingInput {
    fn brightness(&self) -> f32 {
        self.brightness
    }

    fn volume(&self) -> f32 {
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_input_preserves_call_order() {
        let input = RecordingInput::new();
        input.pointer_move(1, 2).unwrap();
        input
            .key_event(KeyAction::Down, 0x04, ModifierFlags::default())
            .unwrap();
        input.lock_screen().unwrap();

        assert_eq!(
            input.take(),
            vec![
                RecordedEvent::Move { dx: 1, dy: 2 },
                RecordedEvent::Key {
                    action: KeyAction::Down,
                    keycode: 0x04,
                    modifiers: ModifierFlags::default(),
                },
                RecordedEvent::LockScreen,
            ]
        );
        assert!(input.is_empty(), "take() drains the recording");
    }

    #[test]
    fn test_fail_launches_returns_error_and_records_nothing() {
        let input = RecordingInput::new();
        input.fail_launches();
        assert!(input.launch_app("Safari").is_err());
        assert!(input.is_empty());
    }
}
