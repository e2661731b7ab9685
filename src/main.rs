mod cli;
mod config;
mod control;
mod error;
mod gesture;
mod hand;
mod landmarks;
mod output;
mod pipeline;
mod shutdown;
mod types;

use anyhow::Result;
use clap::Parser;

use crate::{
    cli::Cli,
    error::ControlError,
    landmarks::OrtLandmarker,
    output::{EnigoInput, SystemVolume},
    pipeline::{FrameSource, Orchestrator},
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.list_cameras {
        return list_cameras();
    }
    let settings = cli.into_settings();

    shutdown::install_signal_handlers();

    let landmarker = OrtLandmarker::from_dir(&settings.model_dir).map_err(|err| {
        let err = ControlError::ModelUnavailable(err);
        log::error!("{err}");
        err
    })?;
    let input = EnigoInput::new()?;
    let screen = input.screen_size();
    log::info!("screen {}x{}", screen.0, screen.1);

    let mut source = FrameSource::start(&settings.camera).map_err(|err| {
        log::error!("{err}");
        err
    })?;
    log::info!("running, press Ctrl+C or type `q` and Enter to quit");
    shutdown::watch_stdin();

    let mut orchestrator = Orchestrator::new(settings, landmarker, input, SystemVolume, screen);
    orchestrator.run(&source, shutdown::requested);

    source.stop();
    log::info!("stopped");
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = pipeline::available_cameras()?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for (index, name) in cameras {
        println!("{index}\t{name}");
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("built without a camera backend")
}
