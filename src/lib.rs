//! Arm-raise repetition counting from a live camera feed.
//!
//! The pipeline reads frames from a V4L2 webcam, finds a person with an SSD-style detection
//! network, computes 33 body landmarks inside the tracked region with an ONNX pose landmark
//! model, and feeds the shoulder/elbow positions into a small two-state machine that counts one
//! repetition per raise/lower cycle. The frame, overlay, and counter are displayed in a window.
//!
//! # Environment Variables
//!
//! Some parts of the crate can be overridden by setting environment variables:
//!
//! * `ARMUP_MODEL_DIR`: Directory the ONNX model files are loaded from. Defaults to `models/`.
//! * `ARMUP_JPEG_BACKEND`: Configures the JPEG image decoder to use. Allowed values are:
//!   * `mozjpeg`: uses the [mozjpeg] library to decode JPEG images (the default).
//!   * `jpeg-decoder`: uses the [jpeg-decoder] crate.
//! * `ARMUP_WEBCAM_NAME`: Forces the device to use for [`Webcam`]s created without an explicit
//!   device name. If unset, the first device that supports a compatible image format will be
//!   used.
//!
//! [mozjpeg]: https://github.com/mozilla/mozjpeg
//! [jpeg-decoder]: https://github.com/image-rs/jpeg-decoder/
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod counter;
pub mod detection;
pub mod filter;
pub mod gui;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod pose;
pub mod slice;
pub mod termination;
pub mod timer;
pub mod video;

use termination::Termination;

/// Initializes the GUI event loop and runs `cb` on a worker thread.
///
/// The windowing platform requires the event loop to own the main thread, so this has to be
/// called from `main` before any windows can be opened. It never returns; once `cb` finishes, the
/// process exits with a status code derived from its return value.
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    gui::run(cb)
}

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library will log at *debug* level, `wgpu` at *warn* level; the
/// `RUST_LOG` environment variable overrides both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
