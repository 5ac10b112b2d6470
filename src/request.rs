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

//! The request/response envelope exchanged with whatever transport dispatches compute jobs.

use crate::{
    engine::{AnalysisResult, AnalyzeParams},
    error::EngineError,
    sampler::PixelBuffer,
    ColorSpace,
};

/// A compute request as it arrives from a transport. Omitted fields take the crate defaults.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
pub struct ComputeRequest {
    pub id: String,
    /// Row-major RGBA bytes.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    #[cfg_attr(feature = "serde", serde(alias = "minLum"))]
    pub min_luma: f64,
    /// Color space tag, validated when the request is handled.
    pub space: String,
    pub k: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u32,
    pub max_samples: usize,
    pub exclude: usize,
    /// Flat `k * 3` centroid coordinates in the requested space.
    pub warm_start: Option<Vec<f64>>,
}

impl Default for ComputeRequest {
    fn default() -> Self {
        Self {
            id: String::new(),
            pixels: Vec::new(),
            width: 0,
            height: 0,
            stride: crate::DEFAULT_STRIDE,
            min_luma: crate::DEFAULT_MIN_LUMA,
            space: ColorSpace::default().to_string(),
            k: crate::DEFAULT_K,
            max_iter: crate::DEFAULT_MAX_ITER,
            tol: crate::DEFAULT_TOLERANCE,
            seed: crate::DEFAULT_SEED,
            max_samples: crate::DEFAULT_MAX_SAMPLES,
            exclude: 0,
            warm_start: None,
        }
    }
}

impl ComputeRequest {
    pub fn buffer(&self) -> PixelBuffer<'_> {
        PixelBuffer::new(self.width, self.height, &self.pixels)
    }

    /// Translate into typed parameters, failing on an unknown color space tag.
    pub fn params(&self) -> Result<AnalyzeParams, EngineError> {
        let space: ColorSpace = self.space.parse()?;

        let params = AnalyzeParams::default()
            .stride(self.stride)
            .min_luma(self.min_luma)
            .space(space)
            .k(self.k)
            .max_iter(self.max_iter)
            .tolerance(self.tol)
            .seed(self.seed)
            .max_samples(self.max_samples)
            .exclude(self.exclude);

        // a flat list that doesn't split into triples can't match any k
        Ok(match &self.warm_start {
            Some(flat) if !flat.is_empty() && flat.len() % 3 == 0 => {
                params.warm_start(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
            }
            _ => params,
        })
    }
}

/// The outcome of a compute request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", content = "payload", rename_all = "lowercase")
)]
pub enum ComputeResponse {
    Result(AnalysisResult),
    Cancelled { id: String },
    Error { id: String, message: String },
}

impl ComputeResponse {
    pub fn id(&self) -> &str {
        match self {
            ComputeResponse::Result(result) => result.id(),
            ComputeResponse::Cancelled { id } | ComputeResponse::Error { id, .. } => id,
        }
    }
}
