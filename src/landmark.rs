//! Landmark estimation infrastructure shared by the pose networks.

use std::iter;

use crate::image::{AsImageView, AspectRatio, ImageView, Resolution, RotatedRect};
use crate::iter::zip_exact;
use crate::{
    filter::Filter,
    nn::{Cnn, Outputs},
    timer::Timer,
};

type Position = [f32; 3];

/// A fixed-size collection of [`Landmark`]s.
#[derive(Clone)]
pub struct Landmarks {
    landmarks: Box<[Landmark]>,
}

impl Landmarks {
    /// Creates a collection of `len` landmarks, all starting at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            landmarks: vec![Landmark::default(); len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.landmarks.iter().copied()
    }

    pub fn get(&self, index: usize) -> Landmark {
        self.landmarks[index]
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        self.landmarks[index] = landmark;
    }

    /// Computes the centroid of all landmark positions.
    pub fn average_position(&self) -> Position {
        let mut center = [0.0; 3];
        for lm in self.iter() {
            for (acc, coord) in center.iter_mut().zip(lm.position()) {
                *acc += coord;
            }
        }
        center.map(|acc| acc / self.len() as f32)
    }

    /// Rewrites every landmark position with `f`, leaving visibility and presence untouched.
    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for lm in self.landmarks.iter_mut() {
            lm.position = f(lm.position);
        }
    }
}

/// A single landmark: a 3D position plus the network's visibility and presence scores.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Landmark {
    position: Position,
    visibility: f32,
    presence: f32,
}

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_visibility(self, visibility: f32) -> Self {
        Self { visibility, ..self }
    }

    #[must_use]
    pub fn with_presence(self, presence: f32) -> Self {
        Self { presence, ..self }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    #[inline]
    pub fn visibility(&self) -> f32 {
        self.visibility
    }

    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.position[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.position[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.position[2]
    }
}

/// Batch-filter applied to every landmark coordinate.
///
/// Apply this to the raw landmarks output by the neural network; that keeps the filter parameters
/// independent of the (possibly varying) input image size.
pub struct LandmarkFilter {
    filter: Box<dyn FnMut(&mut Landmarks) + Send>,
}

/// The default [`LandmarkFilter`] does not perform any filtering.
impl Default for LandmarkFilter {
    fn default() -> Self {
        Self {
            filter: Box::new(|_| ()),
        }
    }
}

impl LandmarkFilter {
    /// Creates a landmark filter that applies `filter` to each coordinate of `num_landmarks`
    /// landmarks, with independent filter state per coordinate.
    pub fn new<F: Filter<f32> + Send + 'static>(filter: F, num_landmarks: usize) -> Self
    where
        F::State: Send,
    {
        let mut states = iter::repeat_with(|| {
            [
                F::State::default(),
                F::State::default(),
                F::State::default(),
            ]
        })
        .take(num_landmarks)
        .collect::<Vec<_>>();

        Self {
            filter: Box::new(move |landmarks| {
                for (lm, state) in zip_exact(&mut *landmarks.landmarks, &mut states) {
                    for (coord, state) in zip_exact(&mut lm.position, state) {
                        *coord = filter.filter(state, *coord);
                    }
                }
            }),
        }
    }

    /// Filters a list of landmarks in-place.
    ///
    /// # Panics
    ///
    /// Panics if `landmarks` has a different number of entries than the `num_landmarks` this
    /// filter was created with.
    pub fn filter(&mut self, landmarks: &mut Landmarks) {
        (self.filter)(landmarks);
    }
}

/// Estimation results produced by [`Estimator::estimate`].
pub trait Estimate: Send + Sync + 'static {
    /// Grants mutable access to the predicted [`Landmarks`].
    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Returns the estimated clockwise object rotation in radians.
    ///
    /// When implemented, [`LandmarkTracker`] rotates the region of interest along with the
    /// tracked object. The default of [`None`] disables rotation tracking.
    fn angle_radians(&self) -> Option<f32> {
        None
    }
}

/// Trait for inference results carrying a confidence value.
///
/// [`LandmarkTracker`] uses the confidence to notice when the tracked object became obscured or
/// left the camera's field of view, and stops tracking in response.
pub trait Confidence {
    /// Confidence value indicating whether the tracked object is in view.
    ///
    /// By convention this lies between 0.0 and 1.0, with values above 0.5 meaning the object is
    /// probably still visible. Networks using a different range need an adjusted tracking loss
    /// threshold.
    fn confidence(&self) -> f32;
}

/// Wrapper around a concrete landmark estimation network.
pub trait Network: Send + Sync + 'static {
    /// The estimation result this network produces.
    type Output: Estimate;

    /// Returns the [`Cnn`] to use for landmark estimation.
    fn cnn(&self) -> &Cnn;

    /// Decodes the network outputs into `estimate`.
    ///
    /// Landmark positions are produced in the coordinate system of the network's input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output);
}

/// Neural-network based landmark estimator.
///
/// Wraps a landmark [`Network`] and performs the shared pre- and postprocessing around it:
/// aspect-ratio aware input sampling, optional smoothing, and mapping the resulting positions
/// back into the input image's coordinate system.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
    t_filter: Timer,
    filter: LandmarkFilter,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_filter: Timer::new("filter"),
            filter: LandmarkFilter::default(),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    /// Returns the expected input resolution of the internal neural network.
    ///
    /// Images of any other resolution are resampled (and letterboxed, if the aspect ratio
    /// differs) before inference.
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Returns the estimator's stage timers, for logging.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_filter].into_iter()
    }

    /// Sets the [`LandmarkFilter`] smoothing the landmark positions.
    ///
    /// The filter runs after inference, but before the landmark coordinates are mapped back into
    /// the input image. Only useful when the estimator sees consecutive frames of a video feed.
    pub fn set_filter(&mut self, filter: LandmarkFilter) {
        self.filter = filter;
    }

    /// Performs landmark estimation on `image`, returning the [`Estimate`].
    ///
    /// If the aspect ratio of `image` does not match the network's input, an enlarged
    /// [`ImageView`] with the right ratio is created first. For views into a larger image this
    /// pulls in surrounding pixels; otherwise black bars pad the input.
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> &mut E {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&mut self, image: ImageView<'_>) -> &mut E {
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

        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate));

        // Importantly, the filter uses the network's coordinates, which makes filter parameters
        // independent of the image's dimensions.
        self.t_filter
            .time(|| self.filter.filter(self.estimate.landmarks_mut()));

        // Map landmark coordinates back into the input image: scale from the network's input
        // coordinate system into `rect`'s, then remove the offset added by the oversized
        // rectangle (compensating for the "black bars" used to adjust the aspect ratio).
        let scale = rect.width() / input_res.width() as f32;
        self.estimate.landmarks_mut().map_positions(|[x, y, z]| {
            [x * scale + rect.x(), y * scale + rect.y(), z * scale]
        });

        &mut self.estimate
    }
}

/// Follows a region of interest (RoI) across frames by re-centering it on the estimated
/// landmarks.
///
/// Once seeded via [`LandmarkTracker::set_roi`], each call to [`LandmarkTracker::track`] runs the
/// estimator on the RoI and replaces it with the bounding rectangle of the resulting landmarks.
/// The estimate's [`Confidence`] decides when tracking is lost and has to be re-seeded (by an
/// object detector, typically).
pub struct LandmarkTracker<E: Estimate + Confidence> {
    aspect_ratio: AspectRatio,
    estimator: Estimator<E>,
    roi: Option<RotatedRect>,
    loss_thresh: f32,
    roi_padding: f32,
}

impl<E: Estimate + Confidence> LandmarkTracker<E> {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    pub const DEFAULT_ROI_PADDING: f32 = 0.3;

    /// Creates a tracker driving `estimator`.
    pub fn new(estimator: Estimator<E>) -> Self {
        Self {
            aspect_ratio: estimator.input_resolution().aspect_ratio().unwrap(),
            estimator,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
            roi_padding: Self::DEFAULT_ROI_PADDING,
        }
    }

    /// Returns the wrapped [`Estimator`].
    pub fn estimator(&self) -> &Estimator<E> {
        &self.estimator
    }

    /// Returns the stage timers of the wrapped [`Estimator`].
    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.estimator.timers()
    }

    /// Sets the tracking loss threshold.
    ///
    /// When the estimate's confidence falls below this value, tracking is considered lost: the
    /// RoI is cleared, [`LandmarkTracker::track`] returns [`None`], and tracking has to be
    /// re-seeded with [`LandmarkTracker::set_roi`]. Defaults to
    /// [`LandmarkTracker::DEFAULT_LOSS_THRESHOLD`].
    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_thresh = threshold;
    }

    /// Sets the relative amount of padding added to the updated RoI.
    ///
    /// The padding is relative to the landmark bounding rectangle's width and height and is
    /// added to each side. Defaults to [`LandmarkTracker::DEFAULT_ROI_PADDING`].
    ///
    /// # Panics
    ///
    /// This method panics when `padding` is negative or NaN.
    pub fn set_roi_padding(&mut self, padding: f32) {
        assert!(padding >= 0.0);
        self.roi_padding = padding;
    }

    /// Returns the region of interest that will be used for the next frame.
    ///
    /// [`None`] when tracking hasn't started or was lost.
    pub fn roi(&self) -> Option<&RotatedRect> {
        self.roi.as_ref()
    }

    /// Seeds or re-seeds the region of interest.
    ///
    /// Accepts a [`Rect`][crate::image::Rect] or a [`RotatedRect`]; no padding is applied, the
    /// rectangle is used as-is.
    pub fn set_roi(&mut self, roi: impl Into<RotatedRect>) {
        self.roi = Some(roi.into());
    }

    /// Performs landmark tracking on `full_image`.
    ///
    /// Returns [`None`] when no RoI is set (tracking never started, or was lost) and when the
    /// estimate's confidence falls below the loss threshold (which also clears the RoI). Both
    /// cases require re-seeding via [`LandmarkTracker::set_roi`].
    ///
    /// On success, the RoI moves to the padded bounding rectangle of the landmarks, and the
    /// returned [`TrackingResult`] exposes them in `full_image` coordinates.
    ///
    /// `track` always has to be called on images of the same size, otherwise the tracking window
    /// won't match between frames.
    pub fn track<V>(&mut self, full_image: &V) -> Option<TrackingResult<'_, E>>
    where
        V: AsImageView,
    {
        self.track_impl(full_image.as_view())
    }

    fn track_impl(&mut self, full_image: ImageView<'_>) -> Option<TrackingResult<'_, E>> {
        let roi = self.roi?;
        let view_rect = roi.map(|rect| rect.grow_to_fit_aspect(self.aspect_ratio));
        let view = full_image.view(view_rect);
        let estimate = self.estimator.estimate(&view);
        if estimate.confidence() < self.loss_thresh {
            log::trace!(
                "LandmarkTracker: confidence {}, loss threshold {} -> LOST",
                estimate.confidence(),
                self.loss_thresh,
            );

            self.roi = None;
            return None;
        }

        let angle = roi.rotation_radians() + estimate.angle_radians().unwrap_or(0.0);

        // Map all landmarks to the image coordinate system.
        estimate.landmarks_mut().map_positions(|[x, y, z]| {
            let [x, y] = view_rect.transform_out(x, y);
            [x, y, z]
        });

        let updated_roi = RotatedRect::bounding(
            angle,
            estimate.landmarks_mut().iter().map(|lm| [lm.x(), lm.y()]),
        )
        .unwrap();

        self.roi = Some(updated_roi.map(|rect| rect.grow_rel(self.roi_padding)));

        Some(TrackingResult {
            view_rect,
            estimate,
            updated_roi,
        })
    }
}

/// The result returned by [`LandmarkTracker::track`].
pub struct TrackingResult<'a, E: Estimate> {
    view_rect: RotatedRect,
    estimate: &'a E,
    updated_roi: RotatedRect,
}

impl<'a, E: Estimate> TrackingResult<'a, E> {
    /// Returns the rectangle of the full image that the landmarks were computed from.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }

    /// Returns the estimation result, with landmark coordinates relative to the full image
    /// passed to [`LandmarkTracker::track`].
    pub fn estimate(&self) -> &'a E {
        self.estimate
    }

    /// Returns the RoI the next call to [`LandmarkTracker::track`] will look at.
    pub fn updated_roi(&self) -> RotatedRect {
        self.updated_roi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmarks_store_attributes() {
        let mut landmarks = Landmarks::new(2);
        landmarks.set(0, Landmark::new([1.0, 2.0, 3.0]).with_presence(0.9));

        let lm = landmarks.get(0);
        assert_eq!(lm.position(), [1.0, 2.0, 3.0]);
        assert_eq!(lm.presence(), 0.9);
        assert_eq!(lm.visibility(), 0.0);

        // the untouched landmark keeps its defaults
        let other = landmarks.get(1);
        assert_eq!(other.position(), [0.0, 0.0, 0.0]);
        assert_eq!(other.presence(), 0.0);
    }

    #[test]
    fn filter_smooths_positions() {
        use crate::filter::ema::Ema;

        let mut filter = LandmarkFilter::new(Ema::new(0.5), 1);
        let mut landmarks = Landmarks::new(1);

        landmarks.set(0, Landmark::new([2.0, 2.0, 2.0]));
        filter.filter(&mut landmarks);
        assert_eq!(landmarks.get(0).position(), [2.0, 2.0, 2.0]);

        landmarks.set(0, Landmark::new([4.0, 4.0, 4.0]));
        filter.filter(&mut landmarks);
        assert_eq!(landmarks.get(0).position(), [3.0, 3.0, 3.0]);
    }
}
