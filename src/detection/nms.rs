//! Non-Maximum Suppression and Averaging.
//!
//! Typical Single-Shot MultiBox Detectors (SSDs) produce duplicate detections for individual
//! objects. Non-Maximum Suppression (NMS) is an algorithm that filters these duplicates out,
//! leaving only a single detection with high confidence for each object.
//!
//! This module implements 2 variants of NMS, selected with [`SuppressionMode`]: The classic
//! Non-Maximum Suppression algorithm that removes any overlapping detections with lower
//! confidence ([`SuppressionMode::Remove`]), and the slightly smarter Non-Maximum Averaging
//! ([`SuppressionMode::Average`]) which instead computes a weighted average of overlapping
//! detections. Since the latter reduces jitter between frames, it is used by default.

use crate::{image::Rect, iter::zip_exact, num::TotalF32};

use super::{Detection, Keypoint};

/// Non-maximum suppression state and configuration.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    cluster: Vec<Detection>,
    kept: Vec<Detection>,
    mode: SuppressionMode,
}

impl NonMaxSuppression {
    /// Default intersection-over-union threshold for considering two detections overlapping.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a suppressor using [`SuppressionMode::Average`] and the default IOU threshold.
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            cluster: Vec::new(),
            kept: Vec::new(),
            mode: SuppressionMode::Average,
        }
    }

    /// Sets the intersection-over-union threshold above which two detections count as
    /// overlapping. Defaults to [`Self::DEFAULT_IOU_THRESH`].
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    /// Sets the suppression mode.
    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Runs suppression over `detections`, draining it.
    ///
    /// The surviving detections are returned as an iterator.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.kept.clear();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| {
                        let iou = seed.bounding_rect().iou(&other.bounding_rect());
                        iou < self.iou_thresh
                    });
                    self.kept.push(seed);
                }
                SuppressionMode::Average => {
                    self.cluster.clear();
                    self.cluster.push(seed.clone());
                    detections.retain(|other| {
                        let iou = seed.bounding_rect().iou(&other.bounding_rect());
                        if iou >= self.iou_thresh {
                            self.cluster.push(other.clone());
                            false // remove from detection list
                        } else {
                            true
                        }
                    });

                    self.kept.push(weighted_average(&self.cluster));
                }
            }
        }

        self.cluster.clear();
        self.kept.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of a group of overlapping detections.
///
/// The first entry is the seed detection with the highest confidence; its confidence value is
/// carried over to the result unchanged.
fn weighted_average(group: &[Detection]) -> Detection {
    let mut acc = Detection::new(
        group[0].confidence,
        Rect::from_center(0.0, 0.0, 0.0, 0.0),
    );
    let [mut xc, mut yc, mut w, mut h, mut angle] = [0.0f32; 5];
    let mut divisor = 0.0;

    for det in group {
        if acc.keypoints().is_empty() && !det.keypoints().is_empty() {
            acc.keypoints_mut()
                .resize(det.keypoints().len(), Keypoint::new(0.0, 0.0));
        }
        assert_eq!(
            acc.keypoints().len(),
            det.keypoints().len(),
            "keypoint count must be constant"
        );

        let factor = det.confidence;
        divisor += factor;
        for (acc, kp) in zip_exact(acc.keypoints_mut().iter_mut(), det.keypoints()) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }
        let rect = det.bounding_rect();
        xc += rect.x_center() * factor;
        yc += rect.y_center() * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
        angle += det.angle * factor;
    }

    for kp in acc.keypoints_mut() {
        kp.x /= divisor;
        kp.y /= divisor;
    }
    acc.set_bounding_rect(Rect::from_center(
        xc / divisor,
        yc / divisor,
        w / divisor,
        h / divisor,
    ));
    acc.set_angle(angle / divisor);
    acc
}

/// What [`NonMaxSuppression`] does with a group of overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SuppressionMode {
    /// Keep only the highest-confidence detection of the group.
    Remove,

    /// Merge the group into its confidence-weighted average.
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let a = Detection::new(0.6, rect);
        let b = Detection::new(0.55, rect.scale(1.5));
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 0.6);
        assert_eq!(rect.x_center(), 0.0);
        assert_eq!(rect.y_center(), 0.0);
        assert_eq!(rect.width(), 1.0);
        assert_eq!(rect.height(), 1.0);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let a = Detection::new(1.0, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(1.0, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Average);
        nms.set_iou_thresh(0.0);

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let a = Detection::new(1.0, rect);
        let b = Detection::new(0.5, rect.scale(4.0));
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_eq!(rect.x_center(), -1.0);
        assert_eq!(rect.y_center(), 3.0);
        assert_eq!(rect.width(), 2.0);
        assert_eq!(rect.height(), 2.0);
    }
}
