//! Body pose landmark prediction.
//!
//! Landmark positions follow the 33-point body landmark convention (see [`LandmarkIdx`]); the
//! network additionally outputs 6 auxiliary landmarks that are only useful for region tracking.

use crate::image::{draw, AsImageViewMut, Color, ImageViewMut};
use crate::landmark::{Confidence, Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, Outputs};
use crate::num::sigmoid;
use crate::slice::SliceExt;

/// Landmark estimation result of the pose landmark network.
#[derive(Clone)]
pub struct LandmarkResult {
    pose_presence: f32,
    landmarks: Landmarks,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            pose_presence: 0.0,
            landmarks: Landmarks::new(Self::NUM_LANDMARKS),
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }
}

impl Confidence for LandmarkResult {
    #[inline]
    fn confidence(&self) -> f32 {
        self.pose_presence
    }
}

impl LandmarkResult {
    /// Total number of landmarks output by the network (body landmarks plus auxiliary ones).
    pub const NUM_LANDMARKS: usize = 33 + 6;

    /// Returns an iterator over the 33 body landmarks.
    pub fn pose_landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        (0..33).map(|i| self.landmarks.get(i))
    }

    /// Returns an iterator over the auxiliary landmarks.
    ///
    /// These don't lie on the body, but are used to compute the region of interest for the next
    /// frame.
    pub fn aux_landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        (33..33 + 6).map(|i| self.landmarks.get(i))
    }

    pub fn get(&self, i: LandmarkIdx) -> Landmark {
        self.landmarks.get(i as usize)
    }

    /// Returns the probability that a pose is in view at all.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.pose_presence
    }

    pub fn draw<I: AsImageViewMut>(&self, target: &mut I) {
        self.draw_impl(&mut target.as_view_mut());
    }

    fn draw_impl(&self, target: &mut ImageViewMut<'_>) {
        for (a, b) in COARSE_CONNECTIVITY {
            let a = self.get(*a);
            let b = self.get(*b);
            draw::line(
                target,
                a.x() as i32,
                a.y() as i32,
                b.x() as i32,
                b.y() as i32,
            );
        }

        for lm in self.pose_landmarks() {
            draw::marker(target, lm.x() as i32, lm.y() as i32).size(9);
        }
        for lm in self.aux_landmarks() {
            draw::marker(target, lm.x() as i32, lm.y() as i32).color(Color::YELLOW);
        }
    }
}

/// Names for the 33 landmark positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

const COARSE_CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (LeftShoulder, LeftHip),
        (LeftHip, LeftAnkle),
        (LeftAnkle, LeftHeel),
        (LeftAnkle, LeftFootIndex),
        (RightShoulder, RightHip),
        (RightHip, RightAnkle),
        (RightAnkle, RightHeel),
        (RightAnkle, RightFootIndex),
    ]
};

fn load_cnn(file: &str) -> anyhow::Result<Cnn> {
    Cnn::new(
        super::load_model(file)?
            .with_output_selection([0, 1])
            .load()?,
        CnnInputShape::NCHW,
        ColorMapper::linear(0.0..=1.0),
    )
}

/// The lite pose landmark model. Fast enough for real-time use on most CPUs.
pub struct LiteNetwork {
    cnn: Cnn,
}

impl LiteNetwork {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            cnn: load_cnn("pose_landmark_lite.onnx")?,
        })
    }
}

impl Network for LiteNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) {
        extract(outputs, estimate);
    }
}

/// The full pose landmark model. More accurate than [`LiteNetwork`], but noticeably slower.
pub struct FullNetwork {
    cnn: Cnn,
}

impl FullNetwork {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            cnn: load_cnn("pose_landmark_full.onnx")?,
        })
    }
}

impl Network for FullNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) {
        extract(outputs, estimate);
    }
}

// NB: there's also a "heavy" variant of the model, but at >25 MB it is not worth supporting. The
// full network already performs well.

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) {
    let screen_landmarks = &outputs[0];
    let pose_flag = &outputs[1];

    // Other outputs (segmentation, heatmap, world landmarks) are turned off during load.

    // 33 pose landmarks (`LandmarkIdx`), 6 auxiliary landmarks -> 39 total, 5 values each
    assert_eq!(screen_landmarks.shape(), &[1, 39 * 5]);
    assert_eq!(pose_flag.shape(), &[1, 1]);

    estimate.pose_presence = pose_flag.index([0, 0]).as_singular();

    for (i, &[x, y, z, visibility, presence]) in screen_landmarks
        .index([0])
        .as_slice()
        .array_chunks_exact::<5>()
        .enumerate()
    {
        estimate.landmarks.set(
            i,
            Landmark::new([x, y, z])
                .with_visibility(sigmoid(visibility))
                .with_presence(sigmoid(presence)),
        );
    }
}
