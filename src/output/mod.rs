//! Side-effect sinks the control loop drives: the OS pointer and the OS
//! mixer. Every call is best-effort; callers log failures and move on.

mod input;
mod volume;

pub use input::EnigoInput;
pub use volume::SystemVolume;

use anyhow::Result;

use crate::types::MouseButton;

pub trait InputSink {
    fn move_cursor_to(&mut self, x: f32, y: f32) -> Result<()>;
    fn click(&mut self, button: MouseButton) -> Result<()>;
    /// Positive amounts scroll up.
    fn scroll(&mut self, amount: i32) -> Result<()>;
}

pub trait VolumeControl {
    fn volume_percent(&mut self) -> Result<u8>;
    fn set_volume_percent(&mut self, percent: u8) -> Result<()>;
}
