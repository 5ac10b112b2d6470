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

use crate::{
    cluster::ClusterResult,
    kmeans::{run_kmeans, KMeansConfig, Point},
    registry::JobRegistry,
    request::{ComputeRequest, ComputeResponse},
    sampler::{build_sample_set, PixelBuffer},
    ColorSpace,
};
use std::time::Instant;
use tracing::{debug, warn};

/// Parameters of a single analysis.
///
/// Built like the rest of the crate's builders: start from [`AnalyzeParams::default`] and chain the
/// setters you need.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeParams {
    stride: usize,
    min_luma: f64,
    space: ColorSpace,
    k: usize,
    max_iter: usize,
    tol: f64,
    seed: u32,
    max_samples: usize,
    warm_start: Option<Vec<Point>>,
    exclude: usize,
}

impl Default for AnalyzeParams {
    fn default() -> Self {
        Self {
            stride: crate::DEFAULT_STRIDE,
            min_luma: crate::DEFAULT_MIN_LUMA,
            space: ColorSpace::default(),
            k: crate::DEFAULT_K,
            max_iter: crate::DEFAULT_MAX_ITER,
            tol: crate::DEFAULT_TOLERANCE,
            seed: crate::DEFAULT_SEED,
            max_samples: crate::DEFAULT_MAX_SAMPLES,
            warm_start: None,
            exclude: 0,
        }
    }
}

impl AnalyzeParams {
    pub fn stride(self, stride: usize) -> Self {
        Self { stride, ..self }
    }

    pub fn min_luma(self, min_luma: f64) -> Self {
        Self { min_luma, ..self }
    }

    pub fn space(self, space: ColorSpace) -> Self {
        Self { space, ..self }
    }

    pub fn k(self, k: usize) -> Self {
        Self { k, ..self }
    }

    pub fn max_iter(self, max_iter: usize) -> Self {
        Self { max_iter, ..self }
    }

    pub fn tolerance(self, tol: f64) -> Self {
        Self { tol, ..self }
    }

    pub fn seed(self, seed: u32) -> Self {
        Self { seed, ..self }
    }

    pub fn max_samples(self, max_samples: usize) -> Self {
        Self { max_samples, ..self }
    }

    /// Start clustering from these centroids, typically [`AnalysisResult::centroids`] of an earlier
    /// run. Ignored unless there is one centroid per effective cluster.
    pub fn warm_start(self, centroids: Vec<Point>) -> Self {
        Self {
            warm_start: Some(centroids),
            ..self
        }
    }

    /// Opaque value echoed back in the result. The engine never reads it.
    pub fn exclude(self, exclude: usize) -> Self {
        Self { exclude, ..self }
    }

    pub fn clear_warm_start(self) -> Self {
        Self {
            warm_start: None,
            ..self
        }
    }

    pub fn color_space(&self) -> ColorSpace {
        self.space
    }
}

/// A finished analysis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct AnalysisResult {
    id: String,
    space: ColorSpace,
    total_samples: usize,
    duration_ms: f64,
    iterations: usize,
    converged: bool,
    inertia: f64,
    exclude: usize,
    clusters: Vec<ClusterResult>,
    centroids: Vec<Point>,
}

impl AnalysisResult {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Wall-clock time of the whole analysis, sampling included.
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn exclude(&self) -> usize {
        self.exclude
    }

    /// Non-empty clusters, largest first.
    pub fn clusters(&self) -> &[ClusterResult] {
        &self.clusters
    }

    /// Every final centroid in working space, empty clusters included, in clustering order.
    pub fn centroids(&self) -> &[Point] {
        &self.centroids
    }

    pub fn most_prominent_color(&self) -> Option<(u8, u8, u8)> {
        self.clusters.first().map(|cluster| cluster.rgb())
    }
}

/// How an analysis ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Completed(AnalysisResult),
    Cancelled { id: String },
}

impl Analysis {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Analysis::Cancelled { .. })
    }

    pub fn completed(self) -> Option<AnalysisResult> {
        match self {
            Analysis::Completed(result) => Some(result),
            Analysis::Cancelled { .. } => None,
        }
    }
}

/// Runs analyses and tracks them so they can be cancelled.
///
/// Each call to [`Engine::analyze`] is synchronous and independent; an `Engine` can be shared
/// between threads to cancel a job running on another one.
#[derive(Debug, Default)]
pub struct Engine {
    registry: JobRegistry,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: JobRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Request cooperative cancellation of the job `id`. Returns whether a running job was flagged;
    /// otherwise the request is remembered for a while unless a job with that id
    /// just finished.
    pub fn cancel(&self, id: &str) -> bool {
        self.registry.cancel(id)
    }

    /// Sample `buffer`, cluster the samples in the requested color space and assemble the palette.
    pub fn analyze(&self, id: &str, buffer: &PixelBuffer<'_>, params: &AnalyzeParams) -> Analysis {
        let start = Instant::now();
        let job = self.registry.register(id);

        let samples = build_sample_set(
            buffer,
            params.stride,
            params.min_luma.max(0.0),
            params.max_samples,
            params.seed,
        );
        let total_samples = samples.len();
        debug!(job = id, total_samples, space = %params.space, "built sample set");

        if samples.is_empty() {
            return Analysis::Completed(AnalysisResult {
                id: id.to_string(),
                space: params.space,
                total_samples: 0,
                duration_ms: elapsed_ms(start),
                iterations: 0,
                converged: true,
                inertia: 0.0,
                exclude: params.exclude,
                clusters: Vec::new(),
                centroids: Vec::new(),
            });
        }

        let points: Vec<Point> = samples.iter().map(|&sample| params.space.from_rgb(sample)).collect();
        let config = KMeansConfig {
            max_iter: params.max_iter.max(1),
            tol: params.tol,
            seed: params.seed,
            warm_start: params.warm_start.clone(),
        };

        let output = run_kmeans(&points, params.k, &config, || job.is_cancelled());
        debug!(
            job = id,
            iterations = output.iterations,
            converged = output.converged,
            cancelled = output.cancelled,
            "clustering finished"
        );

        if output.cancelled {
            return Analysis::Cancelled { id: id.to_string() };
        }

        let mut clusters: Vec<ClusterResult> = output
            .centroids
            .iter()
            .zip(&output.counts)
            .filter_map(|(&centroid, &count)| {
                (count > 0).then(|| ClusterResult::new(params.space, centroid, count, total_samples))
            })
            .collect();

        // stable, so equal counts keep clustering order
        clusters.sort_by(|a, b| b.count().cmp(&a.count()));

        Analysis::Completed(AnalysisResult {
            id: id.to_string(),
            space: params.space,
            total_samples,
            duration_ms: elapsed_ms(start),
            iterations: output.iterations,
            converged: output.converged,
            inertia: output.inertia,
            exclude: params.exclude,
            clusters,
            centroids: output.centroids,
        })
    }

    /// Handle a transport-level request. The color space tag is validated before any sampling.
    pub fn compute(&self, request: &ComputeRequest) -> ComputeResponse {
        let params = match request.params() {
            Ok(params) => params,
            Err(err) => {
                warn!(job = %request.id, "rejected compute request: {err}");
                return ComputeResponse::Error {
                    id: request.id.clone(),
                    message: err.to_string(),
                };
            }
        };

        match self.analyze(&request.id, &request.buffer(), &params) {
            Analysis::Completed(result) => ComputeResponse::Result(result),
            Analysis::Cancelled { id } => ComputeResponse::Cancelled { id },
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
