//! V4L2 webcam access.
//!
//! Currently, only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are
//! supported.

use std::{cmp::Reverse, env};

use crate::image::{Image, Resolution};
use crate::timer::Timer;
use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

/// Whether format negotiation should favor resolution or frame rate.
///
/// The default, [`ParamPreference::Resolution`], selects the largest resolution available at the
/// requested frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ParamPreference {
    /// Maximize resolution, sacrificing frame rate if necessary.
    #[default]
    Resolution,
    /// Maximize frame rate, sacrificing resolution if necessary.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FrameRequest {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Format negotiation options.
#[derive(Default)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FrameRequest,
}

impl WebcamOptions {
    /// Selects the webcam device to open, by name.
    ///
    /// Opening fails if no device with this name exists.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Requests an image resolution.
    ///
    /// A lower resolution may be negotiated if the camera cannot deliver this one.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Requests a frame rate.
    ///
    /// A lower rate may be negotiated if the camera cannot deliver this one.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Chooses which parameter wins when resolution and frame rate conflict.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }
}

#[derive(Clone, Copy)]
struct Candidate {
    resolution: Resolution,
    interval: Fract,
}

fn negotiate_format(device: &Device, mut request: FrameRequest) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut candidates = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    candidates.push(Candidate {
                        resolution: Resolution::new(size.width(), size.height()),
                        interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    // If nothing matches the request, progressively drop constraints (the less preferred one
    // first) until a candidate fits.
    loop {
        if let Some(best) = best_candidate(&candidates, request) {
            return Ok((
                PixFormat::new(
                    best.resolution.width(),
                    best.resolution.height(),
                    pixel_format,
                ),
                best.interval,
            ));
        }

        log::debug!("failed to negotiate format with request {:?}", request);
        let dropped = match request.pref {
            ParamPreference::Resolution => {
                request.resolution.take().is_some() || request.fps.take().is_some()
            }
            ParamPreference::Framerate => {
                request.fps.take().is_some() || request.resolution.take().is_some()
            }
        };
        if !dropped {
            break;
        }
        log::debug!("retrying with relaxed request {:?}", request);
    }

    bail!("failed to negotiate a webcam format")
}

fn best_candidate(candidates: &[Candidate], request: FrameRequest) -> Option<Candidate> {
    let mut eligible = candidates
        .iter()
        .filter(|cand| {
            request.resolution.map_or(true, |res| {
                cand.resolution.width() >= res.width() && cand.resolution.height() >= res.height()
            }) && request.fps.map_or(true, |fps| {
                (1.0 / cand.interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();
    match request.pref {
        ParamPreference::Resolution => {
            eligible.sort_by_key(|cand| (cand.resolution.num_pixels(), Reverse(cand.interval)))
        }
        ParamPreference::Framerate => {
            eligible.sort_by_key(|cand| (Reverse(cand.interval), cand.resolution.num_pixels()))
        }
    }
    eligible.last().copied()
}

/// An open camera device yielding a stream of decoded [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    width: u32,
    height: u32,
    t_dequeue: Timer,
    t_decode: Timer,
}

const ENV_VAR_WEBCAM_NAME: &str = "ARMUP_WEBCAM_NAME";

impl Webcam {
    /// Opens the first camera device that supports a usable format.
    ///
    /// Can block for a noticeable amount of time (hundreds of milliseconds) while the camera
    /// initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        if let Ok(name) = env::var(ENV_VAR_WEBCAM_NAME) {
            log::debug!(
                "webcam override: `{}` is set to '{}'",
                ENV_VAR_WEBCAM_NAME,
                name,
            );
        }
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        bail!("no supported webcam device found")
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        let cam_name_from_env = env::var(ENV_VAR_WEBCAM_NAME).ok();
        if let Some(name) = &options.name.as_deref().or(cam_name_from_env.as_deref()) {
            if caps.card() != *name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;

        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let width = format.width();
        let height = format.height();

        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            width,
            height,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream()?;

        Ok(Some(Self {
            stream,
            width,
            height,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Reads the next frame, blocking until the camera delivers one.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = match self.t_decode.time(|| Image::decode_jpeg(&buf)) {
                    Ok(image) => image,
                    Err(e) => {
                        // Even high-quality webcams produce occasional corrupted MJPG frames,
                        // presumably due to USB data corruption.
                        log::error!("webcam decode error: {}", e);

                        // Hand back a blank image instead of skipping the frame, which would
                        // cause a 2x latency spike. A blank image isn't going to result in any
                        // usable landmarks until next frame either way.
                        Image::new(self.width, self.height)
                    }
                };
                Ok(image)
            })
            .map_err(Into::into)
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}
