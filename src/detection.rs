//! Common functionality for object detection.
//!
//! The types in this module wrap a single-class detection network; the person detector seeding
//! the pose pipeline lives in [`crate::pose::detection`].

pub mod nms;
pub mod ssd;

use crate::image::{
    draw, AsImageView, AsImageViewMut, Color, ImageView, ImageViewMut, Rect, Resolution,
    RotatedRect,
};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// Wrapper around a concrete object detection network.
pub trait Network: Send + Sync + 'static {
    /// Returns the [`Cnn`] to use for detection.
    fn cnn(&self) -> &Cnn;

    /// Decodes all detections with confidence above `threshold` from the network's output.
    ///
    /// Detection and keypoint positions are produced in the coordinate system of the network's
    /// input.
    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Detections);
}

/// A collection of object detections.
#[derive(Debug, Default)]
pub struct Detections {
    vec: Vec<Detection>,
}

impl Detections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    pub fn clear(&mut self) {
        self.vec.clear();
    }

    pub fn push(&mut self, detection: Detection) {
        self.vec.push(detection);
    }

    /// Returns an iterator yielding the stored detections.
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.vec.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Detection> {
        self.vec.iter_mut()
    }
}

/// A generic object detector.
///
/// This type wraps a [`Network`] for object detection and performs the pre- and postprocessing
/// that all of these networks share: aspect-ratio aware input sampling, non-maximum suppression,
/// and mapping the resulting coordinates back into the input image.
pub struct Detector {
    network: Box<dyn Network>,
    detections: Detections,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Detections::new(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    pub fn nms_mut(&mut self) -> &mut NonMaxSuppression {
        &mut self.nms
    }

    pub fn detect<V: AsImageView>(&mut self, image: &V) -> &Detections {
        self.detect_impl(image.as_view())
    }

    fn detect_impl(&mut self, image: ImageView<'_>) -> &Detections {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();

        // If the input image's aspect ratio doesn't match the CNN's input, create an oversized
        // view that does.
        let rect = image
            .rect()
            .grow_to_fit_aspect(input_res.aspect_ratio().unwrap());
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view)).unwrap();
        log::trace!("inference result: {:?}", outputs);

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.thresh, &mut self.detections)
        });

        self.t_nms.time(|| {
            let filtered = self.nms.process(&mut self.detections.vec).collect::<Vec<_>>();
            self.detections.vec = filtered;
        });

        // Map all coordinates back into the input image.
        let scale = rect.width() / input_res.width() as f32;
        for det in self.detections.iter_mut() {
            // Scale from the network's input coordinate system to `rect`'s system, then remove
            // the offset added by the oversized rectangle (this compensates for "black bars"
            // added to adjust the aspect ratio).
            let (xc, yc) = det.rect.center();
            det.rect = Rect::from_center(xc * scale, yc * scale, det.rect.width(), det.rect.height())
                .move_by(rect.x(), rect.y());
            for kp in &mut det.keypoints {
                kp.x = kp.x * scale + rect.x();
                kp.y = kp.y * scale + rect.y();
            }
        }

        &self.detections
    }

    /// Returns profiling timers for this detector.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// A detected object: its bounding [`Rect`], a confidence value, an optional rotation, and a
/// (possibly empty) list of keypoints.
///
/// Confidence values are conventionally between 0.0 and 1.0 (run raw network outputs through
/// [`crate::num::sigmoid`] when needed). [`nms::SuppressionMode::Average`] weights by confidence,
/// so it relies on that range.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the clockwise rotation of the detected object in radians.
    ///
    /// Networks that don't estimate an angle leave this at 0.0.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Sets the clockwise rotation of the detected object in radians.
    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned rectangle enclosing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn set_bounding_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn keypoints_mut(&mut self) -> &mut Vec<Keypoint> {
        &mut self.keypoints
    }

    pub fn draw<I: AsImageViewMut>(&self, image: &mut I) {
        self.draw_impl(&mut image.as_view_mut());
    }

    fn draw_impl(&self, image: &mut ImageViewMut<'_>) {
        draw::rotated_rect(image, RotatedRect::new(self.bounding_rect(), self.angle()))
            .color(Color::from_rgb8(170, 0, 0));
        for lm in self.keypoints() {
            draw::marker(image, lm.x() as _, lm.y() as _);
        }

        let color = if self.confidence() >= 0.8 {
            Color::GREEN
        } else if self.confidence() >= 0.4 {
            Color::YELLOW
        } else {
            Color::RED
        };
        let (xc, yc) = self.bounding_rect().center();
        let y = yc + self.bounding_rect().height() * 0.5;
        draw::text(image, xc as i32, y as i32, &format!("conf={:.01}", self.confidence()))
            .align_top()
            .color(color);
    }
}

/// A 2D keypoint attached to a [`Detection`].
///
/// What a keypoint means depends on the detector and on the keypoint's index; typically they mark
/// rough object landmarks used to crop or orient the object for further processing. Detectors
/// may also output no keypoints at all.
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
