use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_FRAME_SKIP, Settings};

/// Drive the mouse pointer, clicks, scrolling and volume with your hands.
#[derive(Parser, Debug)]
#[command(name = "hand-pointer", version)]
pub struct Cli {
    /// Camera index as reported by the OS.
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// Requested capture resolution, e.g. "640x480".
    #[arg(long, default_value = "640x480", value_parser = parse_resolution)]
    pub resolution: (u32, u32),

    /// Requested capture frame rate.
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Run gesture processing on every Nth frame only.
    #[arg(long, default_value_t = DEFAULT_FRAME_SKIP, value_parser = clap::value_parser!(u64).range(1..))]
    pub frame_skip: u64,

    /// Pointer smoothing factor in (0, 1]; 1 disables smoothing.
    #[arg(long)]
    pub smoothing: Option<f32>,

    /// Directory holding (or receiving) the hand landmark models.
    #[arg(long, default_value = "models")]
    pub model_dir: PathBuf,

    /// Never enter two-hand volume mode.
    #[arg(long)]
    pub no_volume: bool,

    /// Feed the camera image to the detector without mirroring it.
    #[arg(long)]
    pub no_mirror: bool,

    /// Print the cameras the OS reports and exit.
    #[arg(long)]
    pub list_cameras: bool,
}

impl Cli {
    pub fn into_settings(self) -> Settings {
        let mut settings = Settings::default();
        settings.camera.index = self.camera;
        (settings.camera.width, settings.camera.height) = self.resolution;
        settings.camera.fps = self.fps;
        settings.frame_skip = self.frame_skip;
        if let Some(alpha) = self.smoothing {
            settings.pointer.smoothing = alpha.clamp(f32::EPSILON, 1.0);
        }
        settings.model_dir = self.model_dir;
        settings.volume.enabled = !self.no_volume;
        settings.mirror = !self.no_mirror;
        settings
    }
}

fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    if w == 0 || h == 0 {
        return Err("resolution must be non-zero".to_string());
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolution_accepts_width_by_height() {
        assert_eq!(parse_resolution("1280x720"), Ok((1280, 720)));
        assert!(parse_resolution("1280").is_err());
        assert!(parse_resolution("0x720").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "hand-pointer",
            "--camera",
            "2",
            "--resolution",
            "320x240",
            "--frame-skip",
            "1",
            "--smoothing",
            "0.3",
            "--no-volume",
        ]);
        let settings = cli.into_settings();
        assert_eq!(settings.camera.index, 2);
        assert_eq!((settings.camera.width, settings.camera.height), (320, 240));
        assert_eq!(settings.frame_skip, 1);
        assert!((settings.pointer.smoothing - 0.3).abs() < f32::EPSILON);
        assert!(!settings.volume.enabled);
        assert!(settings.mirror);
    }

    #[test]
    fn defaults_match_settings() {
        let cli = Cli::parse_from(["hand-pointer", "--no-mirror"]);
        assert!(!cli.list_cameras);
        let settings = cli.into_settings();
        assert_eq!(settings.frame_skip, DEFAULT_FRAME_SKIP);
        assert_eq!((settings.camera.width, settings.camera.height), (640, 480));
        assert!(settings.volume.enabled);
        assert!(!settings.mirror);
    }

    #[test]
    fn frame_skip_zero_is_rejected() {
        assert!(Cli::try_parse_from(["hand-pointer", "--frame-skip", "0"]).is_err());
    }
}
