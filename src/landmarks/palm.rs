use std::{cmp::Ordering, path::Path, sync::LazyLock};

use anyhow::{Context, Result, anyhow};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

use super::preprocess::{Letterbox, letterbox};
use crate::types::Frame;

pub const PALM_INPUT_SIZE: u32 = 192;
const PALM_KEYPOINTS: usize = 7;
const FEATURES_PER_ANCHOR: usize = 4 + PALM_KEYPOINTS * 2;
// Keypoints used to orient the hand crop.
const KP_WRIST: usize = 0;
const KP_MIDDLE_MCP: usize = 2;
const CROP_EXPANSION: f32 = 2.4;
const MIN_CROP_SIDE: f32 = 80.0;

/// SSD anchors of the 192x192 palm model: one stride-8 layer with two
/// anchors per cell, then three stride-16 layers folded together (six per cell).
static ANCHORS: LazyLock<Vec<[f32; 2]>> = LazyLock::new(|| {
    let mut anchors = Vec::with_capacity(2016);
    for (stride, per_cell) in [(8u32, 2usize), (16, 6)] {
        let grid = PALM_INPUT_SIZE / stride;
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }
    anchors
});

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 8,
        }
    }
}

/// A palm found by the detector, in frame pixels.
#[derive(Clone, Debug)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

impl PalmRegion {
    /// Square crop (center, side, angle) that holds the whole hand with the
    /// fingers pointing up.
    pub fn hand_crop(&self) -> ((f32, f32), f32, f32) {
        let [x1, y1, x2, y2] = self.bbox;
        let center = if self.keypoints.is_empty() {
            ((x1 + x2) * 0.5, (y1 + y2) * 0.5)
        } else {
            let n = self.keypoints.len() as f32;
            let (sx, sy) = self
                .keypoints
                .iter()
                .fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
            (sx / n, sy / n)
        };

        let side = (x2 - x1).abs().max((y2 - y1).abs()).max(MIN_CROP_SIDE) * CROP_EXPANSION;
        (center, side, self.orientation())
    }

    // Rotation that maps the crop's "up" onto the wrist -> middle knuckle axis.
    fn orientation(&self) -> f32 {
        match (
            self.keypoints.get(KP_WRIST),
            self.keypoints.get(KP_MIDDLE_MCP),
        ) {
            (Some(wrist), Some(mcp)) => {
                let (vx, vy) = (mcp.0 - wrist.0, mcp.1 - wrist.1);
                if vx.abs() < 1e-6 && vy.abs() < 1e-6 {
                    0.0
                } else {
                    vx.atan2(-vy)
                }
            }
            _ => 0.0,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self { session, cfg })
    }

    /// Palms sorted by descending score.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, lb) = letterbox(frame, PALM_INPUT_SIZE)?;
        let outputs = self
            .session
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        decode(&boxes, &scores, &lb, &self.cfg)
    }
}

fn decode(
    boxes: &[f32],
    scores: &[f32],
    lb: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    let count = scores.len().min(ANCHORS.len());
    if boxes.len() < count * FEATURES_PER_ANCHOR {
        return Err(anyhow!(
            "palm boxes too short: {} values for {count} anchors",
            boxes.len()
        ));
    }

    let input = PALM_INPUT_SIZE as f32;
    // Canvas-normalized -> frame pixels.
    let to_frame = |nx: f32, ny: f32| {
        (
            (nx * input - lb.pad_x) / lb.scale,
            (ny * input - lb.pad_y) / lb.scale,
        )
    };
    let max_x = lb.orig_w.saturating_sub(1) as f32;
    let max_y = lb.orig_h.saturating_sub(1) as f32;

    let mut candidates = Vec::new();
    for (i, anchor) in ANCHORS.iter().take(count).enumerate() {
        let score = sigmoid(scores[i]);
        if score < cfg.score_threshold {
            continue;
        }

        let f = &boxes[i * FEATURES_PER_ANCHOR..(i + 1) * FEATURES_PER_ANCHOR];
        let cx = f[0] / input + anchor[0];
        let cy = f[1] / input + anchor[1];
        let (hw, hh) = (f[2] / input / 2.0, f[3] / input / 2.0);

        let (x1, y1) = to_frame(cx - hw, cy - hh);
        let (x2, y2) = to_frame(cx + hw, cy + hh);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let keypoints = f[4..]
            .chunks_exact(2)
            .map(|kp| to_frame(kp[0] / input + anchor[0], kp[1] / input + anchor[1]))
            .collect();

        candidates.push(PalmRegion {
            bbox: [
                x1.clamp(0.0, max_x),
                y1.clamp(0.0, max_y),
                x2.clamp(0.0, max_x),
                y2.clamp(0.0, max_y),
            ],
            keypoints,
            score,
        });
    }

    Ok(nms(candidates, cfg.nms_threshold, cfg.top_k))
}

fn nms(mut candidates: Vec<PalmRegion>, threshold: f32, top_k: usize) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if keep.len() >= top_k {
            break;
        }
        if keep.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            keypoints: Vec::new(),
            score,
        }
    }

    #[test]
    fn anchor_table_matches_model_layout() {
        assert_eq!(ANCHORS.len(), 2016);
        assert_eq!(ANCHORS[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(ANCHORS[1], ANCHORS[0]);
        assert_eq!(ANCHORS[1152], [0.5 / 12.0, 0.5 / 12.0]);
    }

    #[test]
    fn nms_drops_overlapping_weaker_boxes() {
        let kept = nms(
            vec![
                region([0.0, 0.0, 10.0, 10.0], 0.6),
                region([1.0, 1.0, 11.0, 11.0], 0.9),
                region([50.0, 50.0, 60.0, 60.0], 0.7),
            ],
            0.3,
            8,
        );
        let scores: Vec<f32> = kept.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn decode_places_box_around_anchor() {
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        };
        let mut boxes = vec![0.0; ANCHORS.len() * FEATURES_PER_ANCHOR];
        let mut scores = vec![-10.0; ANCHORS.len()];
        // Anchor 0 sits at (4, 4) px; give it a 20x20 box.
        boxes[2] = 20.0;
        boxes[3] = 20.0;
        scores[0] = 10.0;

        let regions = decode(&boxes, &scores, &lb, &PalmDetectorConfig::default()).unwrap();
        assert_eq!(regions.len(), 1);
        let [x1, y1, x2, y2] = regions[0].bbox;
        assert!((x1 - 0.0).abs() < 1e-3 && (y1 - 0.0).abs() < 1e-3);
        assert!((x2 - 14.0).abs() < 1e-3 && (y2 - 14.0).abs() < 1e-3);
        assert_eq!(regions[0].keypoints.len(), PALM_KEYPOINTS);
    }

    #[test]
    fn upright_hand_needs_no_rotation() {
        let mut palm = region([0.0, 0.0, 100.0, 100.0], 0.9);
        palm.keypoints = vec![(50.0, 90.0), (40.0, 40.0), (50.0, 30.0)];
        let (_, side, angle) = palm.hand_crop();
        assert!(angle.abs() < 1e-6);
        assert!((side - 240.0).abs() < 1e-3);

        // Fingers pointing right: rotate a quarter turn.
        palm.keypoints = vec![(10.0, 50.0), (60.0, 40.0), (70.0, 50.0)];
        let (_, _, angle) = palm.hand_crop();
        assert!((angle - FRAC_PI_2).abs() < 1e-5);
    }
}
