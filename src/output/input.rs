use anyhow::{Context, Result};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Mouse};

use super::InputSink;
use crate::{error::ControlError, types::MouseButton};

const FALLBACK_SCREEN: (u32, u32) = (1920, 1080);

pub struct EnigoInput {
    enigo: Enigo,
}

impl EnigoInput {
    pub fn new() -> Result<Self, ControlError> {
        let enigo = Enigo::new(&enigo::Settings::default())
            .map_err(|err| ControlError::InputUnavailable(err.to_string()))?;
        Ok(Self { enigo })
    }

    pub fn screen_size(&self) -> (u32, u32) {
        match self.enigo.main_display() {
            Ok((w, h)) if w > 0 && h > 0 => (w as u32, h as u32),
            Ok((w, h)) => {
                log::warn!(
                    "main display reported {w}x{h}, using {}x{}",
                    FALLBACK_SCREEN.0,
                    FALLBACK_SCREEN.1
                );
                FALLBACK_SCREEN
            }
            Err(err) => {
                log::warn!(
                    "failed to query main display ({err}), using {}x{}",
                    FALLBACK_SCREEN.0,
                    FALLBACK_SCREEN.1
                );
                FALLBACK_SCREEN
            }
        }
    }
}

impl InputSink for EnigoInput {
    fn move_cursor_to(&mut self, x: f32, y: f32) -> Result<()> {
        self.enigo
            .move_mouse(x.round() as i32, y.round() as i32, Coordinate::Abs)
            .context("cursor move rejected")
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        let button = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
        };
        self.enigo
            .button(button, Direction::Click)
            .with_context(|| format!("{button:?} click rejected"))
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        // enigo scrolls down for positive lengths.
        self.enigo
            .scroll(-amount, Axis::Vertical)
            .context("scroll rejected")
    }
}
