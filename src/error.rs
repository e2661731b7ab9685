use thiserror::Error;

/// Failures that leave the module that produced them.
///
/// Only `DeviceUnavailable` and `ModelUnavailable` stop the program, and only
/// at startup. The rest are logged by the control loop and then dropped.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("camera unavailable: {0:#}")]
    DeviceUnavailable(anyhow::Error),

    #[error("hand landmark models unavailable: {0:#}")]
    ModelUnavailable(anyhow::Error),

    #[error("input automation unavailable: {0}")]
    InputUnavailable(String),

    #[error("volume command `{command}` failed: {reason}")]
    VolumeCommand { command: String, reason: String },
}
