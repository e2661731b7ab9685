use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

use super::{
    LandmarkAdapter, MAX_HANDS, NUM_LANDMARKS, RawHand,
    model_download::{ModelKind, ensure_model_ready},
    palm::{PalmDetector, PalmDetectorConfig},
    preprocess::{CropTransform, rotated_crop},
};
use crate::types::{Frame, Handedness};

pub const HANDPOSE_INPUT_SIZE: u32 = 224;
const MIN_HAND_CONFIDENCE: f32 = 0.5;

/// Two-stage detector: palm detection on the whole frame, then a hand pose
/// estimate on a rotated crop around each of the strongest palms.
pub struct OrtLandmarker {
    palm_detector: PalmDetector,
    handpose: Session,
}

impl OrtLandmarker {
    /// Load both models from `model_dir`, downloading any that are missing.
    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let palm_path = ensure_model_ready(ModelKind::PalmDetector, model_dir)?;
        let handpose_path = ensure_model_ready(ModelKind::HandposeEstimator, model_dir)?;

        let palm_detector = PalmDetector::new(&palm_path, PalmDetectorConfig::default())?;
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&handpose_path)
            .with_context(|| {
                format!("failed to load handpose model from {}", handpose_path.display())
            })?;

        log::info!(
            "hand landmark models ready: {} and {}",
            palm_path.display(),
            handpose_path.display()
        );
        Ok(Self {
            palm_detector,
            handpose,
        })
    }

    fn estimate(&mut self, frame: &Frame, crop: ((f32, f32), f32, f32)) -> Result<Option<RawHand>> {
        let (center, side, angle) = crop;
        let (input, transform) = rotated_crop(frame, center, side, angle, HANDPOSE_INPUT_SIZE)?;
        let outputs = self
            .handpose
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run handpose session")?;
        if outputs.len() < 3 {
            return Err(anyhow!(
                "handpose model returned {} outputs, expected 3",
                outputs.len()
            ));
        }

        let first_scalar = |i: usize| -> Result<f32> {
            outputs[i]
                .try_extract_array::<f32>()?
                .iter()
                .next()
                .copied()
                .ok_or_else(|| anyhow!("handpose output {i} is empty"))
        };
        let confidence = first_scalar(1)?;
        if confidence < MIN_HAND_CONFIDENCE {
            return Ok(None);
        }
        let handedness = if first_scalar(2)? >= 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        };

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let landmarks = to_normalized(&coords, &transform)?;
        Ok(Some(RawHand {
            handedness,
            landmarks,
        }))
    }
}

impl LandmarkAdapter for OrtLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawHand>> {
        let palms = self.palm_detector.detect(frame)?;

        let mut hands = Vec::with_capacity(MAX_HANDS);
        for palm in palms.iter().take(MAX_HANDS) {
            match self.estimate(frame, palm.hand_crop()) {
                Ok(Some(hand)) => hands.push(hand),
                Ok(None) => {}
                Err(err) => log::warn!("handpose estimate failed: {err:#}"),
            }
        }
        Ok(hands)
    }
}

/// Crop-space `[x, y, z]` triples to frame-normalized landmarks.
fn to_normalized(coords: &[f32], transform: &CropTransform) -> Result<[[f32; 3]; NUM_LANDMARKS]> {
    if coords.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            coords.len(),
            NUM_LANDMARKS * 3
        ));
    }

    let (w, h) = (transform.orig_w.max(1) as f32, transform.orig_h.max(1) as f32);
    let mut out = [[0.0; 3]; NUM_LANDMARKS];
    for (slot, p) in out.iter_mut().zip(coords.chunks_exact(3)) {
        let (x, y) = transform.project(p[0], p[1]);
        *slot = [x / w, y / h, transform.normalize_depth(p[2])];
    }
    Ok(out)
}
