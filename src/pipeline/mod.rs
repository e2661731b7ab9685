pub mod camera;
pub mod orchestrator;
#[cfg(feature = "camera-nokhwa")]
pub mod rgba_converter;

pub use camera::FrameSource;
#[cfg(feature = "camera-nokhwa")]
pub use camera::available_cameras;
pub use orchestrator::Orchestrator;
