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

//! Forward and inverse conversions between 8-bit sRGB and the working color spaces.
//!
//! Every space converts an integer RGB triple into three floating point coordinates and back.
//! The inverse direction rounds and clamps into `0..=255`, so a round trip reproduces the
//! original triple up to quantization.

use crate::error::EngineError;
use palette::{convert::FromColorUnclamped, encoding, white_point::D65, IntoColor, Srgb};
use std::{fmt, str::FromStr};

type HslColor = palette::Hsl<encoding::Srgb, f64>;
type LabColor = palette::Lab<D65, f64>;
type LuvColor = palette::Luv<D65, f64>;

/// The coordinate system in which clustering distances are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum ColorSpace {
    Rgb,
    Hsl,
    Yuv,
    #[default]
    CieLab,
    CieLuv,
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 5] = [
        ColorSpace::Rgb,
        ColorSpace::Hsl,
        ColorSpace::Yuv,
        ColorSpace::CieLab,
        ColorSpace::CieLuv,
    ];

    /// The canonical upper-case tag of this space.
    pub fn tag(self) -> &'static str {
        match self {
            ColorSpace::Rgb => "RGB",
            ColorSpace::Hsl => "HSL",
            ColorSpace::Yuv => "YUV",
            ColorSpace::CieLab => "CIELAB",
            ColorSpace::CieLuv => "CIELUV",
        }
    }

    /// Project an RGB triple into this space.
    pub fn from_rgb(self, rgb: [u8; 3]) -> [f64; 3] {
        match self {
            ColorSpace::Rgb => Identity::forward(rgb),
            ColorSpace::Hsl => Hsl::forward(rgb),
            ColorSpace::Yuv => Yuv::forward(rgb),
            ColorSpace::CieLab => CieLab::forward(rgb),
            ColorSpace::CieLuv => CieLuv::forward(rgb),
        }
    }

    /// Convert a point in this space back to an RGB triple.
    pub fn to_rgb(self, point: [f64; 3]) -> [u8; 3] {
        match self {
            ColorSpace::Rgb => Identity::inverse(point),
            ColorSpace::Hsl => Hsl::inverse(point),
            ColorSpace::Yuv => Yuv::inverse(point),
            ColorSpace::CieLab => CieLab::inverse(point),
            ColorSpace::CieLuv => CieLuv::inverse(point),
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ColorSpace {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RGB" => Ok(ColorSpace::Rgb),
            "HSL" => Ok(ColorSpace::Hsl),
            "YUV" => Ok(ColorSpace::Yuv),
            "CIELAB" | "LAB" => Ok(ColorSpace::CieLab),
            "CIELUV" | "LUV" => Ok(ColorSpace::CieLuv),
            _ => Err(EngineError::UnsupportedColorSpace(s.to_string())),
        }
    }
}

/// Project an RGB triple into the space named by `tag`.
pub fn from_rgb(tag: &str, rgb: [u8; 3]) -> Result<[f64; 3], EngineError> {
    Ok(tag.parse::<ColorSpace>()?.from_rgb(rgb))
}

/// Convert a point in the space named by `tag` back to RGB.
pub fn to_rgb(tag: &str, point: [f64; 3]) -> Result<[u8; 3], EngineError> {
    Ok(tag.parse::<ColorSpace>()?.to_rgb(point))
}

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [f64; 3] {
    let hsv: palette::Hsv<encoding::Srgb, f64> = unit_rgb(rgb).into_color();
    [hsv.hue.into_positive_degrees(), hsv.saturation, hsv.value]
}

trait Transform {
    fn forward(rgb: [u8; 3]) -> [f64; 3];
    fn inverse(point: [f64; 3]) -> [u8; 3];
}

struct Identity;
struct Hsl;
struct Yuv;
struct CieLab;
struct CieLuv;

impl Transform for Identity {
    fn forward([r, g, b]: [u8; 3]) -> [f64; 3] {
        [f64::from(r), f64::from(g), f64::from(b)]
    }

    fn inverse([r, g, b]: [f64; 3]) -> [u8; 3] {
        [quantize(r), quantize(g), quantize(b)]
    }
}

impl Transform for Hsl {
    fn forward(rgb: [u8; 3]) -> [f64; 3] {
        let hsl = HslColor::from_color_unclamped(unit_rgb(rgb));
        [hsl.hue.into_positive_degrees(), hsl.saturation, hsl.lightness]
    }

    fn inverse([h, s, l]: [f64; 3]) -> [u8; 3] {
        quantize_rgb(Srgb::from_color_unclamped(HslColor::new(h, s, l)))
    }
}

// BT.601 luma/chroma, U and V offset by 128
impl Transform for Yuv {
    fn forward([r, g, b]: [u8; 3]) -> [f64; 3] {
        let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));

        [
            0.299 * r + 0.587 * g + 0.114 * b,
            -0.168736 * r - 0.331264 * g + 0.5 * b + 128.0,
            0.5 * r - 0.418688 * g - 0.081312 * b + 128.0,
        ]
    }

    fn inverse([y, u, v]: [f64; 3]) -> [u8; 3] {
        let u = u - 128.0;
        let v = v - 128.0;

        [
            quantize(y + 1.402 * v),
            quantize(y - 0.344136 * u - 0.714136 * v),
            quantize(y + 1.772 * u),
        ]
    }
}

impl Transform for CieLab {
    fn forward(rgb: [u8; 3]) -> [f64; 3] {
        let lab = LabColor::from_color_unclamped(unit_rgb(rgb));
        [lab.l, lab.a, lab.b]
    }

    fn inverse([l, a, b]: [f64; 3]) -> [u8; 3] {
        quantize_rgb(Srgb::from_color_unclamped(LabColor::new(l, a, b)))
    }
}

impl Transform for CieLuv {
    fn forward(rgb: [u8; 3]) -> [f64; 3] {
        let luv = LuvColor::from_color_unclamped(unit_rgb(rgb));
        [luv.l, luv.u, luv.v]
    }

    fn inverse([l, u, v]: [f64; 3]) -> [u8; 3] {
        if l <= 0.0 {
            return [0, 0, 0];
        }

        quantize_rgb(Srgb::from_color_unclamped(LuvColor::new(l, u, v)))
    }
}

fn unit_rgb([r, g, b]: [u8; 3]) -> Srgb<f64> {
    Srgb::new(r, g, b).into_format()
}

fn quantize_rgb(rgb: Srgb<f64>) -> [u8; 3] {
    let (r, g, b) = rgb.into_components();
    [quantize(r * 255.0), quantize(g * 255.0), quantize(b * 255.0)]
}

fn quantize(v: f64) -> u8 {
    // NaN saturates to 0
    v.round().clamp(0.0, 255.0) as u8
}
