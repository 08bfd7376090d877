//! Anchor/Prior generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Note that the implementation in this module is extremely limited and is only meant to work for
//! the person detection network used here, not for general SSD networks.

use std::ops::Index;

use crate::image::Resolution;

/// An anchor of an SSD network.
pub struct Anchor {
    // values range from 0 to 1
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
pub struct LayerInfo {
    /// Number of anchors per feature map cell/pixel. Must be non-zero.
    anchors_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// `anchors_per_cell` is the number of anchor boxes associated with each cell of the
    /// `width x height` feature map.
    pub fn new(anchors_per_cell: u32, width: u32, height: u32) -> Self {
        assert_ne!(anchors_per_cell, 0);
        Self {
            anchors_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

pub struct AnchorParams<'a> {
    /// List of output layers.
    pub layers: &'a [LayerInfo],
}

pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(params: &AnchorParams<'_>) -> Self {
        let mut anchors = Vec::new();

        for layer in params.layers {
            let height = layer.resolution.height();
            let width = layer.resolution.width();

            for y in 0..height {
                for x in 0..width {
                    for _ in 0..layer.anchors_per_cell {
                        let x_center = (x as f32 + 0.5) / width as f32;
                        let y_center = (y as f32 + 0.5) / height as f32;

                        anchors.push(Anchor { x_center, y_center });
                    }
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of SSD anchors/priors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count_matches_layers() {
        let anchors = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(2, 4, 4), LayerInfo::new(6, 2, 2)],
        });
        assert_eq!(anchors.anchor_count(), 4 * 4 * 2 + 2 * 2 * 6);
    }

    #[test]
    fn anchors_are_cell_centers() {
        let anchors = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(1, 2, 2)],
        });
        assert_eq!(anchors.anchor_count(), 4);
        assert_eq!(anchors[0].x_center(), 0.25);
        assert_eq!(anchors[0].y_center(), 0.25);
        assert_eq!(anchors[3].x_center(), 0.75);
        assert_eq!(anchors[3].y_center(), 0.75);
    }
}
