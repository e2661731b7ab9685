use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    PalmDetector,
    HandposeEstimator,
}

impl ModelKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ModelKind::PalmDetector => "palm_detection_mediapipe_2023feb.onnx",
            ModelKind::HandposeEstimator => "handpose_estimation_mediapipe_2023feb.onnx",
        }
    }

    fn url(&self) -> String {
        format!(
            "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/{}",
            self.file_name()
        )
    }

    fn label(&self) -> &'static str {
        match self {
            ModelKind::PalmDetector => "palm detector",
            ModelKind::HandposeEstimator => "handpose estimator",
        }
    }
}

/// Return the path of `kind` inside `dir`, downloading it first if needed.
pub fn ensure_model_ready(kind: ModelKind, dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join(kind.file_name());
    if path.exists() {
        return Ok(path);
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create model directory {}", dir.display()))?;
    download_to_path(kind, &kind.url(), &path)
        .with_context(|| format!("failed to download {} model", kind.label()))?;
    Ok(path)
}

fn download_to_path(kind: ModelKind, url: &str, dest: &Path) -> anyhow::Result<()> {
    log::info!(
        "downloading {} model from {url} to {}",
        kind.label(),
        dest.display()
    );

    let mut response = Client::new()
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let progress = progress_bar(response.content_length());
    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut buffer = [0u8; 16 * 1024];
    loop {
        let n = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .context("failed while writing model to disk")?;
        progress.inc(n as u64);
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    progress.finish_with_message(format!("{} model ready", kind.label()));
    Ok(())
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.green} downloading model {bytes}")
            {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_model_is_not_downloaded() {
        let dir = std::env::temp_dir().join(format!("hand-pointer-models-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(ModelKind::PalmDetector.file_name());
        fs::write(&path, b"onnx").unwrap();

        assert_eq!(ensure_model_ready(ModelKind::PalmDetector, &dir).unwrap(), path);
        fs::remove_dir_all(&dir).unwrap();
    }
}
