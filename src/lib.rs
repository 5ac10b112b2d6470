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

//! A library to extract a dominant color palette from an image.
//!
//! Pixels are sampled from a raw RGBA buffer, optionally projected into a perceptual color space
//! (HSL, YUV, CIELAB or CIELUV) and partitioned with seeded k-means. Each non-empty cluster is
//! reported with its pixel count, share of the samples and its centroid in RGB and HSV.
//!
//! ```no_run
//! use huecluster::{AnalyzeParams, ColorSpace, Engine, PixelBuffer};
//!
//! let image = huecluster::image::open("cover.jpg").unwrap().to_rgba8();
//! let params = AnalyzeParams::default().k(6).space(ColorSpace::CieLab);
//!
//! let result = Engine::new()
//!     .analyze("cover", &PixelBuffer::from_image(&image), &params)
//!     .completed()
//!     .unwrap();
//!
//! for cluster in result.clusters() {
//!     println!("{} {:.1}%", cluster.hex(), cluster.share() * 100.0);
//! }
//! ```

pub mod color_space;
mod cluster;
mod engine;
mod error;
pub mod kmeans;
mod registry;
mod request;
mod rng;
pub mod sampler;

pub const DEFAULT_K: usize = 16;
pub const DEFAULT_MAX_ITER: usize = 40;
pub const DEFAULT_TOLERANCE: f64 = 1e-3;
pub const DEFAULT_SEED: u32 = 1;
pub const DEFAULT_MAX_SAMPLES: usize = 300_000;
pub const DEFAULT_STRIDE: usize = 1;
pub const DEFAULT_MIN_LUMA: f64 = 0.0;

pub use crate::{
    cluster::{ClusterResult, Rgb},
    color_space::ColorSpace,
    engine::{Analysis, AnalysisResult, AnalyzeParams, Engine},
    error::EngineError,
    registry::{JobGuard, JobRegistry, DEFAULT_PENDING_TTL, MAX_REMEMBERED_IDS},
    request::{ComputeRequest, ComputeResponse},
    rng::Xorshift32,
    sampler::PixelBuffer,
};
pub use image;
pub use palette;
