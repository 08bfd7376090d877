//! Body pose perception.
//!
//! Two networks cooperate here: [`detection`] finds a person in the full camera frame and seeds a
//! region of interest, [`landmark`] computes the 33 body landmarks inside that region. Model
//! weights are ONNX files loaded at startup from the model directory.

pub mod detection;
pub mod landmark;

use std::{env, path::PathBuf};

use anyhow::Context;

use crate::nn::{Loader, NeuralNetwork};

/// Environment variable overriding the directory ONNX models are loaded from.
///
/// Defaults to `models/` relative to the working directory.
const ENV_VAR_MODEL_DIR: &str = "ARMUP_MODEL_DIR";

fn load_model(file: &str) -> anyhow::Result<Loader<'static>> {
    let dir = env::var_os(ENV_VAR_MODEL_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("models"));
    let path = dir.join(file);
    NeuralNetwork::from_path(&path)
        .with_context(|| format!("failed to load model '{}'", path.display()))
}
