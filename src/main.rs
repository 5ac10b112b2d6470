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

use anyhow::{bail, Context, Result};
use clap::Parser;
use huecluster::{ComputeRequest, ComputeResponse, Engine};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Extract the dominant colors of an image and print them as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input image path
    input: PathBuf,

    /// Number of clusters
    #[arg(short, long, default_value_t = huecluster::DEFAULT_K)]
    k: usize,

    /// Working color space (RGB, HSL, YUV, CIELAB, CIELUV)
    #[arg(short, long, default_value = "CIELAB")]
    space: String,

    /// Sample every Nth pixel
    #[arg(long, default_value_t = huecluster::DEFAULT_STRIDE)]
    stride: usize,

    /// Skip pixels with a BT.709 luma below this (0-255)
    #[arg(long, default_value_t = huecluster::DEFAULT_MIN_LUMA)]
    min_luma: f64,

    /// Maximum number of samples kept, 0 for no cap
    #[arg(long, default_value_t = huecluster::DEFAULT_MAX_SAMPLES)]
    max_samples: usize,

    /// Maximum number of k-means rounds
    #[arg(long, default_value_t = huecluster::DEFAULT_MAX_ITER)]
    max_iter: usize,

    /// Convergence threshold on the largest centroid shift
    #[arg(long, default_value_t = huecluster::DEFAULT_TOLERANCE)]
    tol: f64,

    /// Seed for sampling and k-means++
    #[arg(long, default_value_t = huecluster::DEFAULT_SEED)]
    seed: u32,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let image = huecluster::image::open(&args.input)
        .with_context(|| format!("failed to decode {}", args.input.display()))?
        .to_rgba8();

    let request = ComputeRequest {
        id: args.input.display().to_string(),
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
        stride: args.stride,
        min_luma: args.min_luma,
        space: args.space,
        k: args.k,
        max_iter: args.max_iter,
        tol: args.tol,
        seed: args.seed,
        max_samples: args.max_samples,
        ..Default::default()
    };

    let response = Engine::new().compute(&request);
    if let ComputeResponse::Error { message, .. } = &response {
        bail!("{message}");
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{json}");

    Ok(())
}
