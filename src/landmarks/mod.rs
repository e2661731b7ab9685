//! Hand landmark detection. The control pipeline only sees the
//! [`LandmarkAdapter`] trait; [`OrtLandmarker`] is the ONNX implementation.

pub mod model_download;
mod ort;
mod palm;
mod preprocess;

pub use self::ort::OrtLandmarker;

use crate::types::{Frame, Handedness};

pub const NUM_LANDMARKS: usize = 21;
/// Hands returned per frame, strongest detections first.
pub const MAX_HANDS: usize = 2;

/// Landmark indices in the 21-point hand topology.
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_TIP: usize = 20;
}

/// One detected hand: 21 `[x, y, z]` points with x and y normalized to the
/// frame (`0.0..=1.0`) and z a relative depth.
#[derive(Clone, Debug, PartialEq)]
pub struct RawHand {
    pub handedness: Handedness,
    pub landmarks: [[f32; 3]; NUM_LANDMARKS],
}

pub trait LandmarkAdapter {
    /// Detect up to [`MAX_HANDS`] hands. An empty list is a normal result.
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<RawHand>>;
}
