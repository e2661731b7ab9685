use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::bounded;

use crate::{error::ControlError, types::Frame};

/// A device that blocks until its next image is available.
pub trait FrameGrabber {
    /// Returns `(rgba, width, height)`.
    fn grab(&mut self) -> Result<(Vec<u8>, u32, u32)>;
}

type LatestFrame = Arc<Mutex<Option<Frame>>>;

/// Captures continuously on its own thread and keeps only the newest frame.
///
/// Readers never wait for a capture: they copy whatever frame is current.
/// Slow readers miss frames, fast readers see the same frame again.
#[derive(Debug)]
pub struct FrameSource {
    latest: LatestFrame,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameSource {
    /// Open the camera described by `settings` and start capturing.
    #[cfg(feature = "camera-nokhwa")]
    pub fn start(settings: &crate::config::CameraSettings) -> Result<Self, ControlError> {
        let settings = settings.clone();
        Self::start_with(move || nokhwa_grabber::NokhwaGrabber::open(&settings))
    }

    #[cfg(not(feature = "camera-nokhwa"))]
    pub fn start(_settings: &crate::config::CameraSettings) -> Result<Self, ControlError> {
        Err(ControlError::DeviceUnavailable(anyhow!(
            "built without a camera backend (enable the `camera-nokhwa` feature)"
        )))
    }

    /// Start capturing from the grabber built by `open`. `open` runs on the
    /// capture thread; its failure is returned here as `DeviceUnavailable`.
    pub fn start_with<G, F>(open: F) -> Result<Self, ControlError>
    where
        G: FrameGrabber,
        F: FnOnce() -> Result<G> + Send + 'static,
    {
        let latest: LatestFrame = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let slot = latest.clone();
        let stop_flag = stop.clone();
        let handle = thread::Builder::new()
            .name("frame-capture".into())
            .spawn(move || {
                let mut grabber = match open() {
                    Ok(grabber) => {
                        let _ = ready_tx.send(Ok(()));
                        grabber
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                capture_loop(&mut grabber, &slot, &stop_flag);
                // The grabber drops here, releasing the device.
            })
            .map_err(|err| ControlError::DeviceUnavailable(err.into()))?;

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(anyhow!("capture thread exited before opening the camera")));
        if let Err(err) = opened {
            let _ = handle.join();
            return Err(ControlError::DeviceUnavailable(err));
        }

        Ok(Self {
            latest,
            stop,
            handle: Some(handle),
        })
    }

    /// A private copy of the newest frame, or `None` before the first capture.
    pub fn read(&self) -> Option<Frame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop capturing and release the device. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("frame capture thread panicked");
            }
            log::info!("camera released");
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<G: FrameGrabber>(grabber: &mut G, slot: &Mutex<Option<Frame>>, stop: &AtomicBool) {
    let mut sequence = 0u64;
    while !stop.load(Ordering::Relaxed) {
        let frame_start = Instant::now();
        let (rgba, width, height) = match grabber.grab() {
            Ok(image) => image,
            Err(err) => {
                log::warn!(
                    "camera frame read failed (after {:?}): {err:#}",
                    frame_start.elapsed()
                );
                continue;
            }
        };

        sequence += 1;
        let frame = Frame {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        };
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }
}

#[cfg(feature = "camera-nokhwa")]
pub use nokhwa_grabber::available_cameras;

#[cfg(feature = "camera-nokhwa")]
mod nokhwa_grabber {
    use anyhow::{Result, anyhow};
    use nokhwa::{
        Camera,
        pixel_format::RgbFormat,
        query,
        utils::{
            ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat,
            RequestedFormatType, Resolution,
        },
    };

    use super::FrameGrabber;
    use crate::{config::CameraSettings, pipeline::rgba_converter};

    // Formats the converter understands, cheapest to decode first.
    const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
        FrameFormat::RAWRGB,
        FrameFormat::RAWBGR,
        FrameFormat::YUYV,
        FrameFormat::NV12,
        FrameFormat::MJPEG,
        FrameFormat::GRAY,
    ];

    /// `(index, name)` of every camera the OS reports.
    pub fn available_cameras() -> Result<Vec<(String, String)>> {
        Ok(query(ApiBackend::Auto)?
            .into_iter()
            .map(|info| (info.index().to_string(), info.human_name()))
            .collect())
    }

    pub struct NokhwaGrabber {
        camera: Camera,
    }

    impl NokhwaGrabber {
        pub fn open(settings: &CameraSettings) -> Result<Self> {
            let index = CameraIndex::Index(settings.index);
            let mut last_err = None;

            for requested in requested_formats(settings) {
                match Camera::new(index.clone(), requested) {
                    Ok(mut camera) => match camera.open_stream() {
                        Ok(()) => {
                            let format = camera.camera_format();
                            log::info!(
                                "camera {} opened at {}x{} {} fps ({:?})",
                                settings.index,
                                format.width(),
                                format.height(),
                                format.frame_rate(),
                                format.format()
                            );
                            return Ok(Self { camera });
                        }
                        Err(err) => last_err = Some(err.into()),
                    },
                    Err(err) => last_err = Some(err.into()),
                }
            }

            Err(last_err.unwrap_or_else(|| anyhow!("no supported camera format")))
        }
    }

    /// Closest match to the configured mode first, then looser fallbacks.
    fn requested_formats(settings: &CameraSettings) -> Vec<RequestedFormat<'static>> {
        let mut requests: Vec<RequestedFormat<'static>> = PREFERRED_PIXEL_FORMATS
            .iter()
            .map(|&format| {
                let wanted = CameraFormat::new(
                    Resolution::new(settings.width, settings.height),
                    format,
                    settings.fps,
                );
                RequestedFormat::with_formats(
                    RequestedFormatType::Closest(wanted),
                    PREFERRED_PIXEL_FORMATS,
                )
            })
            .collect();
        requests.push(RequestedFormat::new::<RgbFormat>(
            RequestedFormatType::AbsoluteHighestFrameRate,
        ));
        requests.push(RequestedFormat::new::<RgbFormat>(RequestedFormatType::None));
        requests
    }

    impl FrameGrabber for NokhwaGrabber {
        fn grab(&mut self) -> Result<(Vec<u8>, u32, u32)> {
            let buffer = self.camera.frame()?;
            let image = rgba_converter::to_rgba(&buffer)?;
            Ok((image.rgba, image.width, image.height))
        }
    }

    impl Drop for NokhwaGrabber {
        fn drop(&mut self) {
            if let Err(err) = self.camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err}");
            }
        }
    }
}
