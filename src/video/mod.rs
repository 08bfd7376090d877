//! Video frame sources.

pub mod webcam;
