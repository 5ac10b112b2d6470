// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{color_space::rgb_to_hsv, ColorSpace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// One non-empty cluster of the final partition.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct ClusterResult {
    count: usize,
    share: f64,
    centroid_space: [f64; 3],
    rgb: Rgb,
    hsv: [f64; 3],
}

impl ClusterResult {
    pub(crate) fn new(space: ColorSpace, centroid: [f64; 3], count: usize, total_samples: usize) -> Self {
        let rgb = space.to_rgb(centroid);

        Self {
            count,
            share: count as f64 / total_samples.max(1) as f64,
            centroid_space: centroid,
            rgb: Rgb::from(rgb),
            hsv: rgb_to_hsv(rgb),
        }
    }

    pub fn count(self) -> usize {
        self.count
    }

    /// Fraction of all samples assigned to this cluster.
    pub fn share(self) -> f64 {
        self.share
    }

    /// The centroid in working space coordinates.
    pub fn centroid_space(self) -> [f64; 3] {
        self.centroid_space
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        (self.rgb.r, self.rgb.g, self.rgb.b)
    }

    pub fn hsv(self) -> [f64; 3] {
        self.hsv
    }

    /// `#RRGGBB`
    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.rgb.r, self.rgb.g, self.rgb.b)
    }
}
