//! Human body detection.

use once_cell::sync::Lazy;

use crate::image::{Rect, Resolution};
use crate::nn::Outputs;
use crate::num::sigmoid;
use crate::{
    detection::{
        ssd::{Anchor, AnchorParams, Anchors, LayerInfo},
        Detection, Detections, Network,
    },
    nn::{Cnn, CnnInputShape, ColorMapper},
};

/// Body pose detection network.
///
/// Use with [`Detector`](crate::detection::Detector).
///
/// This network detects human bodies and computes the keypoints documented in [`Keypoint`].
pub struct PoseNetwork {
    cnn: Cnn,
}

impl PoseNetwork {
    /// Loads the person detection model.
    ///
    /// Returns an error if the model file is missing or malformed.
    pub fn load() -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            super::load_model("pose_detection.onnx")?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(-1.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for PoseNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Detections) {
        static ANCHORS: Lazy<Anchors> = Lazy::new(|| {
            Anchors::calculate(&AnchorParams {
                layers: &[
                    LayerInfo::new(2, 28, 28),
                    LayerInfo::new(2, 14, 14),
                    LayerInfo::new(6, 7, 7),
                ],
            })
        });

        extract_outputs(
            self.cnn.input_resolution(),
            &ANCHORS,
            outputs,
            threshold,
            detections,
        );
    }
}

fn extract_outputs(
    input_res: Resolution,
    anchors: &Anchors,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Detections,
) {
    let num_anchors = anchors.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];

    assert_eq!(confidences.shape(), &[1, num_anchors, 1]);
    assert_eq!(boxes.shape(), &[1, num_anchors, 12]);

    for (index, view) in confidences.index([0]).iter().enumerate() {
        let conf = sigmoid(view.as_slice()[0]);
        if conf < thresh {
            continue;
        }

        let tensor_view = boxes.index([0, index]);
        let box_params = tensor_view.as_slice();
        detections.push(extract_detection(&anchors[index], input_res, box_params, conf));
    }
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    assert_eq!(box_params.len(), 12);

    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;

    let xc = box_params[0] + anchor.x_center() * input_w;
    let yc = box_params[1] + anchor.y_center() * input_h;
    let w = box_params[2];
    let h = box_params[3];
    let kp = |x, y| {
        crate::detection::Keypoint::new(
            x + anchor.x_center() * input_w,
            y + anchor.y_center() * input_h,
        )
    };

    Detection::with_keypoints(
        confidence,
        Rect::from_center(xc, yc, w, h),
        vec![
            kp(box_params[4], box_params[5]),
            kp(box_params[6], box_params[7]),
            kp(box_params[8], box_params[9]),
            kp(box_params[10], box_params[11]),
        ],
    )
}

/// Keypoints estimated by the detection network.
///
/// The hip center keypoint is the most stable one and is used to seed the landmark tracker's
/// region of interest.
#[derive(Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Keypoint {
    Hips = 0,
}
