//! Per-frame hand snapshots built from raw detector output.

use crate::{
    landmarks::{RawHand, index},
    types::Handedness,
};

/// A landmark in frame pixels, plus its normalized height (`0.0` = top of
/// the frame) kept for scale-free vertical comparisons.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub level: f32,
}

/// Fingertip and knuckle of one digit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Digit {
    pub tip: Keypoint,
    pub knuckle: Keypoint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandModel {
    pub handedness: Handedness,
    pub wrist: Keypoint,
    pub thumb: Digit,
    pub index: Digit,
    pub middle: Digit,
    pub ring: Digit,
    pub pinky: Digit,
}

impl HandModel {
    pub fn from_raw(raw: &RawHand, frame_width: u32, frame_height: u32) -> Self {
        let (w, h) = (frame_width as f32, frame_height as f32);
        let point = |i: usize| {
            let [x, y, _z] = raw.landmarks[i];
            Keypoint {
                x: x * w,
                y: y * h,
                level: y,
            }
        };
        let digit = |tip: usize, knuckle: usize| Digit {
            tip: point(tip),
            knuckle: point(knuckle),
        };

        Self {
            handedness: raw.handedness,
            wrist: point(index::WRIST),
            thumb: digit(index::THUMB_TIP, index::THUMB_MCP),
            index: digit(index::INDEX_TIP, index::INDEX_MCP),
            middle: digit(index::MIDDLE_TIP, index::MIDDLE_MCP),
            ring: digit(index::RING_TIP, index::RING_MCP),
            pinky: digit(index::PINKY_TIP, index::PINKY_MCP),
        }
    }

    /// The four non-thumb digits, index first.
    pub fn fingers(&self) -> [&Digit; 4] {
        [&self.index, &self.middle, &self.ring, &self.pinky]
    }
}

/// Build hand models for at most two detections, in detector order.
pub fn build_hands(raw: &[RawHand], frame_width: u32, frame_height: u32) -> Vec<HandModel> {
    raw.iter()
        .take(2)
        .map(|hand| HandModel::from_raw(hand, frame_width, frame_height))
        .collect()
}
