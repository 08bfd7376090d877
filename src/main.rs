use armup::counter::{ArmLandmarks, RepCounter};
use armup::detection::Detector;
use armup::filter::ema::Ema;
use armup::gui;
use armup::image::{draw, Color, Rect, Resolution};
use armup::landmark::{Estimator, LandmarkFilter, LandmarkTracker};
use armup::num::TotalF32;
use armup::pose::detection::{Keypoint, PoseNetwork};
use armup::pose::landmark::{LandmarkResult, LiteNetwork};
use armup::timer::FpsCounter;
use armup::video::webcam::{Webcam, WebcamOptions};

const WINDOW: &str = "arm raises";

/// Diameter of the highlight circles drawn on the four arm landmarks.
const ARM_MARKER_DIAMETER: u32 = 30;

fn main() {
    armup::init_logger!();
    armup::run(run);
}

fn run() -> anyhow::Result<()> {
    let mut webcam = Webcam::open(
        WebcamOptions::default()
            .resolution(Resolution::RES_720P)
            .fps(30),
    )?;

    let mut detector = Detector::new(PoseNetwork::load()?);
    let mut estimator = Estimator::new(LiteNetwork::load()?);
    estimator.set_filter(LandmarkFilter::new(
        Ema::new(0.7),
        LandmarkResult::NUM_LANDMARKS,
    ));
    let mut tracker = LandmarkTracker::new(estimator);
    tracker.set_roi_padding(0.15);

    let mut counter = RepCounter::new();
    let mut fps = FpsCounter::new("arm raises");
    loop {
        let mut image = match webcam.read() {
            Ok(image) => image,
            Err(e) => {
                log::error!("failed to read webcam frame: {e}");
                continue;
            }
        };

        if let Some(result) = tracker.track(&image) {
            let pose = result.estimate();
            pose.draw(&mut image);

            let arms = ArmLandmarks::from_pose(pose);
            for [x, y] in arms.points() {
                draw::circle(&mut image, x as i32, y as i32, ARM_MARKER_DIAMETER)
                    .color(Color::BLUE)
                    .stroke_width(3);
            }

            counter.update(&arms);
        } else {
            // Tracking lost, run detection.

            let detections = detector.detect(&image);
            for detection in detections.iter() {
                detection.draw(&mut image);
            }

            if let Some(detection) = detections
                .iter()
                .max_by_key(|det| TotalF32(det.confidence()))
            {
                let hips = detection.keypoints()[Keypoint::Hips as usize];
                let grow_by = 0.15;
                let body_rect =
                    Rect::bounding(detection.keypoints().iter().map(|kp| [kp.x(), kp.y()]))
                        .unwrap()
                        .grow_move_center(hips.x(), hips.y())
                        .grow_rel(grow_by);
                tracker.set_roi(body_rect);
                draw::rect(&mut image, body_rect).color(Color::BLUE);
            }
        }

        let label = format!("Counter: {}", counter.count());
        draw::text(&mut image, 20, 30, &label)
            .align_left()
            .color(Color::BLUE);

        gui::show_image(WINDOW, &image);

        fps.tick_with(
            webcam
                .timers()
                .chain(detector.timers())
                .chain(tracker.timers()),
        );
    }
}
