pub mod pointer;
pub mod scroll;
pub mod volume;

pub use pointer::{PointerController, PointerUpdate};
pub use scroll::ScrollController;
pub use volume::{VolumeController, VolumeStep};

/// Exponential moving average; `alpha` is the weight of `current`.
pub fn ema(current: f32, previous: f32, alpha: f32) -> f32 {
    alpha * current + (1.0 - alpha) * previous
}
