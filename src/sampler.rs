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

use crate::rng::Xorshift32;
use image::RgbaImage;
use rand::Rng;

/// An RGB triple drawn from the image.
pub type Sample = [u8; 3];

/// A borrowed, row-major RGBA view of an image.
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> PixelBuffer<'a> {
    /// Trailing bytes that don't form a full pixel are ignored, as are pixels beyond `width * height`.
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self { width, height, data }
    }

    pub fn from_image(image: &'a RgbaImage) -> Self {
        Self::new(image.width(), image.height(), image.as_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of whole pixels the sampler will walk over.
    pub fn pixel_count(&self) -> usize {
        let declared = self.width as usize * self.height as usize;
        declared.min(self.data.len() / 4)
    }

    fn pixels(&self) -> impl Iterator<Item = &'a [u8]> {
        self.data.chunks_exact(4).take(self.pixel_count())
    }
}

impl<'a> From<&'a RgbaImage> for PixelBuffer<'a> {
    fn from(image: &'a RgbaImage) -> Self {
        Self::from_image(image)
    }
}

/// ITU-R BT.709 luma of an RGB triple, in `0.0..=255.0`.
pub fn luma([r, g, b]: Sample) -> f64 {
    0.2126 * f64::from(r) + 0.7152 * f64::from(g) + 0.0722 * f64::from(b)
}

/// Draw a uniformly random subset of at most `max_samples` pixels from every `stride`th pixel of
/// the buffer, skipping pixels darker than `min_luma`.
///
/// A `stride` of 0 behaves like 1 and a `max_samples` of 0 disables the cap. The output is fully
/// determined by the arguments.
pub fn build_sample_set(
    buffer: &PixelBuffer<'_>,
    stride: usize,
    min_luma: f64,
    max_samples: usize,
    seed: u32,
) -> Vec<Sample> {
    let stride = stride.max(1);
    let max_samples = if max_samples == 0 { usize::MAX } else { max_samples };

    let estimated = (buffer.pixel_count() + stride - 1) / stride;
    let cap = estimated.min(max_samples);

    let mut rng = Xorshift32::new(seed);
    let mut reservoir = Vec::with_capacity(cap);
    let mut accepted = 0usize;

    for pixel in buffer.pixels().step_by(stride) {
        let sample = [pixel[0], pixel[1], pixel[2]];

        // dark pixels never compete for a reservoir slot
        if luma(sample) < min_luma {
            continue;
        }

        if accepted < cap {
            reservoir.push(sample);
        } else {
            let slot = rng.gen_range(0..=accepted);
            if slot < cap {
                reservoir[slot] = sample;
            }
        }

        accepted += 1;
    }

    reservoir
}
