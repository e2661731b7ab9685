use std::time::Instant;

use anyhow::{Result, anyhow};
use image::{RgbaImage, imageops};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    /// Capture counter assigned by the frame source, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Flip the frame left-to-right so the preview behaves like a mirror.
    pub fn mirrored(self) -> Result<Frame> {
        let Frame {
            rgba,
            width,
            height,
            timestamp,
            sequence,
        } = self;
        let mut img = RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| anyhow!("frame buffer does not match {width}x{height} RGBA"))?;
        imageops::flip_horizontal_in_place(&mut img);
        Ok(Frame {
            rgba: img.into_raw(),
            width,
            height,
            timestamp,
            sequence,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}
