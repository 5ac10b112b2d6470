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

use huecluster::{
    color_space::{from_rgb, to_rgb},
    ColorSpace, EngineError,
};

fn grid() -> impl Iterator<Item = [u8; 3]> {
    let steps = (0..=255u8).step_by(15).chain(std::iter::once(254));
    steps.clone().flat_map(move |r| {
        let steps = steps.clone();
        steps.clone().flat_map(move |g| steps.clone().map(move |b| [r, g, b]))
    })
}

fn assert_round_trip(space: ColorSpace, tolerance: i16) {
    for rgb in grid() {
        let back = space.to_rgb(space.from_rgb(rgb));

        for (original, restored) in rgb.iter().zip(back) {
            let diff = (*original as i16 - restored as i16).abs();
            assert!(
                diff <= tolerance,
                "{space} round trip of {rgb:?} gave {back:?}"
            );
        }
    }
}

#[test]
fn rgb_round_trip() {
    assert_round_trip(ColorSpace::Rgb, 0);
}

#[test]
fn hsl_round_trip() {
    assert_round_trip(ColorSpace::Hsl, 1);
}

#[test]
fn yuv_round_trip() {
    assert_round_trip(ColorSpace::Yuv, 2);
}

#[test]
fn lab_round_trip() {
    assert_round_trip(ColorSpace::CieLab, 2);
}

#[test]
fn luv_round_trip() {
    assert_round_trip(ColorSpace::CieLuv, 4);
}

#[test]
fn matches_published_cie_values() {
    let cases = [
        (ColorSpace::CieLab, [255, 0, 0], [53.2408, 80.0925, 67.2032]),
        (ColorSpace::CieLab, [0, 0, 255], [32.2970, 79.1875, -107.8602]),
        (ColorSpace::CieLuv, [255, 0, 0], [53.2408, 175.0151, 37.7564]),
        (ColorSpace::CieLuv, [0, 0, 255], [32.2970, -9.4054, -130.3423]),
    ];

    for (space, rgb, expected) in cases {
        let actual = space.from_rgb(rgb);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 0.05, "{space} of {rgb:?} gave {actual:?}");
        }
    }
}

#[test]
fn luv_lightness_matches_lab() {
    // both derive L* from the same relative luminance
    for rgb in [[12, 120, 230], [90, 90, 90], [1, 2, 3]] {
        let lab = ColorSpace::CieLab.from_rgb(rgb);
        let luv = ColorSpace::CieLuv.from_rgb(rgb);
        assert!((lab[0] - luv[0]).abs() < 1e-9);
    }
}

#[test]
fn tagged_helpers() {
    assert_eq!(from_rgb("YUV", [0, 0, 0]).unwrap(), [0.0, 128.0, 128.0]);
    assert_eq!(to_rgb("rgb", [10.2, 20.5, 30.7]).unwrap(), [10, 21, 31]);
    assert_eq!(
        from_rgb("XYZ", [1, 2, 3]),
        Err(EngineError::UnsupportedColorSpace("XYZ".to_string()))
    );
}
