use std::{path::PathBuf, time::Duration};

// Process every Nth captured frame.
pub const DEFAULT_FRAME_SKIP: u64 = 3;
const CAMERA_WARMUP: Duration = Duration::from_millis(1_000);

#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PointerSettings {
    /// EMA weight of the newest target; higher reacts faster.
    pub smoothing: f32,
    /// Inset (pixels) on every side of the frame that maps to the screen edge.
    pub frame_margin: f32,
    pub left_click_dist_sq: f32,
    pub right_click_dist_sq: f32,
    pub click_cooldown: Duration,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            smoothing: 0.65,
            frame_margin: 50.0,
            left_click_dist_sq: 40.0 * 40.0,
            right_click_dist_sq: 40.0 * 40.0,
            click_cooldown: Duration::from_millis(300),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ThumbsUpSettings {
    /// How far (normalized height) the thumb tip may sit below the index knuckle.
    pub thumb_above_index: f32,
    pub thumb_straight: f32,
    pub finger_bent: f32,
}

impl Default for ThumbsUpSettings {
    fn default() -> Self {
        Self {
            thumb_above_index: 0.08,
            thumb_straight: 0.1,
            finger_bent: 0.05,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScrollSettings {
    pub initial_amount: i32,
    pub sustained_amount: i32,
    pub hold_threshold: Duration,
    pub cooldown: Duration,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            initial_amount: 15,
            sustained_amount: 8,
            hold_threshold: Duration::from_millis(1_500),
            cooldown: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VolumeSettings {
    pub enabled: bool,
    /// Minimum raw-vs-smoothed wrist distance change (pixels) that moves the volume.
    pub dead_band: f32,
    /// Volume percent per pixel of deviation.
    pub sensitivity: f32,
    pub smoothing: f32,
    /// Assumed level when the OS cannot report one.
    pub fallback_percent: u8,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dead_band: 5.0,
            sensitivity: 0.5,
            smoothing: 0.6,
            fallback_percent: 50,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub camera: CameraSettings,
    pub frame_skip: u64,
    pub mirror: bool,
    pub warmup: Duration,
    pub model_dir: PathBuf,
    pub pointer: PointerSettings,
    pub thumbs_up: ThumbsUpSettings,
    pub scroll: ScrollSettings,
    pub volume: VolumeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            frame_skip: DEFAULT_FRAME_SKIP,
            mirror: true,
            warmup: CAMERA_WARMUP,
            model_dir: PathBuf::from("models"),
            pointer: PointerSettings::default(),
            thumbs_up: ThumbsUpSettings::default(),
            scroll: ScrollSettings::default(),
            volume: VolumeSettings::default(),
        }
    }
}
