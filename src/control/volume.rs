use super::ema;
use crate::{config::VolumeSettings, output::VolumeControl};

#[derive(Clone, Debug, PartialEq)]
pub struct VolumeState {
    pub active: bool,
    pub smoothed_distance: f32,
    /// Last level known to be applied by the OS.
    pub current_percent: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VolumeStep {
    /// Volume mode is off this frame.
    Inactive,
    /// Volume mode just started; the baseline was seeded.
    Seeded,
    /// Active, but the change stayed inside the dead-band or the set failed.
    Holding,
    Adjusted(u8),
}

impl VolumeStep {
    pub fn is_active(&self) -> bool {
        !matches!(self, VolumeStep::Inactive)
    }
}

/// Two-hand volume control: spreading the wrists apart raises the volume,
/// bringing them together lowers it.
#[derive(Debug)]
pub struct VolumeController {
    settings: VolumeSettings,
    state: VolumeState,
}

impl VolumeController {
    /// A backend that cannot report the volume at startup leaves volume mode
    /// off, so two-hand frames keep driving the pointer.
    pub fn new<V: VolumeControl + ?Sized>(mut settings: VolumeSettings, volume: &mut V) -> Self {
        let current_percent = if settings.enabled {
            match volume.volume_percent() {
                Ok(percent) => percent.min(100),
                Err(err) => {
                    log::warn!("could not read system volume, volume control disabled: {err:#}");
                    settings.enabled = false;
                    settings.fallback_percent
                }
            }
        } else {
            settings.fallback_percent
        };

        Self {
            settings,
            state: VolumeState {
                active: false,
                smoothed_distance: 0.0,
                current_percent,
            },
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &VolumeState {
        &self.state
    }

    /// `spread` is the wrist distance when both hands are visible.
    pub fn update<V: VolumeControl + ?Sized>(
        &mut self,
        spread: Option<f32>,
        volume: &mut V,
    ) -> VolumeStep {
        let Some(distance) = spread.filter(|_| self.settings.enabled) else {
            if self.state.active {
                log::info!("volume mode off");
                self.state.active = false;
            }
            return VolumeStep::Inactive;
        };

        if !self.state.active {
            log::info!("volume mode on at {}%", self.state.current_percent);
            self.state.active = true;
            self.state.smoothed_distance = distance;
            return VolumeStep::Seeded;
        }

        self.state.smoothed_distance = ema(
            distance,
            self.state.smoothed_distance,
            self.settings.smoothing,
        );
        let deviation = distance - self.state.smoothed_distance;
        if deviation.abs() <= self.settings.dead_band {
            return VolumeStep::Holding;
        }

        // Round to the nearest percent rather than truncating toward zero, so
        // raising and lowering step alike. An unchanged target sends nothing.
        let target = (self.state.current_percent as f32 + deviation * self.settings.sensitivity)
            .round()
            .clamp(0.0, 100.0) as u8;
        if target == self.state.current_percent {
            return VolumeStep::Holding;
        }

        match volume.set_volume_percent(target) {
            Ok(()) => {
                log::debug!("volume {}% -> {target}%", self.state.current_percent);
                self.state.current_percent = target;
                VolumeStep::Adjusted(target)
            }
            Err(err) => {
                log::warn!("failed to set volume to {target}%: {err:#}");
                VolumeStep::Holding
            }
        }
    }
}
