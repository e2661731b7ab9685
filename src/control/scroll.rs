use std::time::Instant;

use crate::{config::ScrollSettings, types::Handedness};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub active: bool,
    pub hold_start: Option<Instant>,
    pub last_fire: Option<Instant>,
    /// Set only while `active`; cleared when the gesture is released.
    pub fired_initial_pulse: bool,
}

/// Thumbs-up scrolling for one hand side.
///
/// A fresh thumbs-up fires one large pulse. Holding it past the hold
/// threshold fires smaller pulses, never closer together than the cooldown.
#[derive(Debug)]
pub struct ScrollController {
    side: Handedness,
    direction: i32,
    settings: ScrollSettings,
    state: ScrollState,
}

impl ScrollController {
    pub fn new(side: Handedness, settings: ScrollSettings) -> Self {
        // Left hand scrolls down, right hand scrolls up.
        let direction = match side {
            Handedness::Left => -1,
            Handedness::Right => 1,
        };
        Self {
            side,
            direction,
            settings,
            state: ScrollState::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    /// Feed this side's thumbs-up signal; returns a signed scroll amount
    /// (positive = up) when a pulse fires.
    pub fn update(&mut self, thumbs_up: bool, now: Instant) -> Option<i32> {
        if !thumbs_up {
            if self.state.active {
                self.state.active = false;
                self.state.hold_start = None;
                self.state.fired_initial_pulse = false;
            }
            return None;
        }

        if !self.state.active {
            self.state.active = true;
            self.state.hold_start = Some(now);
            if !self.state.fired_initial_pulse && self.cooldown_elapsed(now) {
                self.state.fired_initial_pulse = true;
                return Some(self.fire(self.settings.initial_amount, now));
            }
            return None;
        }

        let held_long_enough = self
            .state
            .hold_start
            .is_some_and(|start| now.saturating_duration_since(start) >= self.settings.hold_threshold);
        if held_long_enough && self.cooldown_elapsed(now) {
            return Some(self.fire(self.settings.sustained_amount, now));
        }
        None
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.state
            .last_fire
            .is_none_or(|last| now.saturating_duration_since(last) >= self.settings.cooldown)
    }

    fn fire(&mut self, amount: i32, now: Instant) -> i32 {
        self.state.last_fire = Some(now);
        let signed = amount * self.direction;
        log::debug!("{} hand scroll pulse {signed}", self.side.label());
        signed
    }
}
