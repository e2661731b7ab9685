use std::time::Instant;

use super::ema;
use crate::{config::PointerSettings, gesture::PinchSignals, types::MouseButton};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerState {
    pub smoothed_x: f32,
    pub smoothed_y: f32,
    pub last_left_click: Option<Instant>,
    pub last_right_click: Option<Instant>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointerUpdate {
    /// Absolute screen position to move the cursor to.
    pub cursor: (f32, f32),
    pub clicks: Vec<MouseButton>,
}

#[derive(Debug)]
pub struct PointerController {
    settings: PointerSettings,
    screen: (f32, f32),
    state: PointerState,
}

impl PointerController {
    pub fn new(settings: PointerSettings, screen_width: u32, screen_height: u32) -> Self {
        Self {
            settings,
            screen: (screen_width as f32, screen_height as f32),
            state: PointerState::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &PointerState {
        &self.state
    }

    /// Map a fingertip position in frame pixels onto the screen. The frame
    /// margin is cut off, so reaching it already puts the cursor on the edge.
    pub fn map_to_screen(&self, tip: (f32, f32), frame_width: u32, frame_height: u32) -> (f32, f32) {
        let margin = self.settings.frame_margin;
        (
            interp_clamped(tip.0, margin, frame_width as f32 - margin, self.screen.0),
            interp_clamped(tip.1, margin, frame_height as f32 - margin, self.screen.1),
        )
    }

    pub fn update(
        &mut self,
        tip: (f32, f32),
        pinch: PinchSignals,
        frame_size: (u32, u32),
        now: Instant,
    ) -> PointerUpdate {
        let (target_x, target_y) = self.map_to_screen(tip, frame_size.0, frame_size.1);
        let alpha = self.settings.smoothing;
        self.state.smoothed_x = ema(target_x, self.state.smoothed_x, alpha);
        self.state.smoothed_y = ema(target_y, self.state.smoothed_y, alpha);

        let cooldown = self.settings.click_cooldown;
        let ready = |last: Option<Instant>| {
            last.is_none_or(|t| now.saturating_duration_since(t) >= cooldown)
        };

        let mut clicks = Vec::new();
        if pinch.left && ready(self.state.last_left_click) {
            self.state.last_left_click = Some(now);
            clicks.push(MouseButton::Left);
        }
        if pinch.right && ready(self.state.last_right_click) {
            self.state.last_right_click = Some(now);
            clicks.push(MouseButton::Right);
        }

        PointerUpdate {
            cursor: (self.state.smoothed_x, self.state.smoothed_y),
            clicks,
        }
    }
}

fn interp_clamped(value: f32, lo: f32, hi: f32, out_max: f32) -> f32 {
    let span = (hi - lo).max(1.0);
    ((value - lo) / span).clamp(0.0, 1.0) * out_max
}
