// Copyright (c) 2024-2025, The cfwave contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License. If
// the BSD 2 Clause License was not distributed with this source code in the
// LICENSE file, you can obtain it at
// https://opensource.org/license/bsd-2-clause

use crate::error::{CodecError, Result};

// External pixel layouts, identified by their four-character codes.
// The tag uniquely determines channel count, component depth, row pitch,
// row direction and alpha presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  // 8-bit 4:2:2, Y0 U Y1 V
  Yuy2,
  // 8-bit 4:2:2, U Y0 V Y1 ('2vuy')
  Uyvy,
  // 10-bit 4:2:2, six pixels packed into four little-endian 32-bit words
  V210,
  // 16-bit 4:2:2, Y0 U Y1 V as little-endian 16-bit words
  Yu64,
  // 8-bit 4:4:4:4, A Y U V
  R408,
  // 8-bit 4:4:4:4, U Y V A
  V408,
  // 8-bit chunky R G B, top-down rows
  Rgb24,
  // 8-bit chunky B G R, bottom-up rows (DIB layout)
  Bgr24,
  // 8-bit B G R A, bottom-up rows
  Bgra,
  // 8-bit B G R A, top-down rows ('BGRa')
  BgraTopDown,
  // 16-bit big-endian A R G B
  B64a,
  // 16-bit little-endian R G B
  Rg48,
  // 13-bit whitepoint R G B in signed 16-bit words
  Wp13,
  // 13-bit whitepoint R G B A in signed 16-bit words
  W13a,
  // 10-bit RGB in a big-endian word, R at bits 29:20
  R210,
  // 10-bit RGB in a big-endian word, R at bits 31:22 (DPX packing)
  Dpx0,
  // 10-bit RGB in a little-endian word, B at bits 29:20, alpha in the top bits
  Ar10,
  // 10-bit RGB in a little-endian word, R at bits 29:20
  Ab10,
  // 10-bit RGB in a little-endian word, B at bits 29:20
  Rg30,
  // 10-bit Bayer quads (G R B G) in 16-bit words
  Byr2,
  // 16-bit Bayer quads (G R B G)
  Byr4,
}

// How pixels are grouped for coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedFormat {
  Yuv422,
  Rgb444,
  Rgba4444,
  Yuva4444,
  Bayer,
}

// The broad color model of a pixel format, before any conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
  Rgb,
  Yuv422,
  Yuv444,
  Bayer,
}

// BT.601 vs BT.709 primaries crossed with computer-graphics (16-235) vs
// video-systems (0-255) range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
  Cg601,
  #[default]
  Cg709,
  Vs601,
  Vs709,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodedResolution {
  #[default]
  Full,
  Half,
  Quarter,
  // Deepest lowpass only, no entropy decode required
  Thumbnail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
  Low,
  Medium,
  High,
  #[default]
  FilmScan1,
  FilmScan2,
}

impl PixelFormat {
  pub fn from_fourcc(tag: &[u8; 4]) -> Result<PixelFormat> {
    let format = match tag {
      b"YUY2" => PixelFormat::Yuy2,
      b"2vuy" => PixelFormat::Uyvy,
      b"v210" => PixelFormat::V210,
      b"YU64" => PixelFormat::Yu64,
      b"r408" => PixelFormat::R408,
      b"v408" => PixelFormat::V408,
      b"RGB8" => PixelFormat::Rgb24,
      b"BGR8" => PixelFormat::Bgr24,
      b"BGRA" => PixelFormat::Bgra,
      b"BGRa" => PixelFormat::BgraTopDown,
      b"b64a" => PixelFormat::B64a,
      b"RG48" => PixelFormat::Rg48,
      b"WP13" => PixelFormat::Wp13,
      b"W13A" => PixelFormat::W13a,
      b"r210" => PixelFormat::R210,
      b"DPX0" => PixelFormat::Dpx0,
      b"AR10" => PixelFormat::Ar10,
      b"AB10" => PixelFormat::Ab10,
      b"RG30" => PixelFormat::Rg30,
      b"BYR2" => PixelFormat::Byr2,
      b"BYR4" => PixelFormat::Byr4,
      _ => return Err(CodecError::BadFormat),
    };
    return Ok(format);
  }

  pub fn fourcc(self) -> &'static [u8; 4] {
    match self {
      PixelFormat::Yuy2 => b"YUY2",
      PixelFormat::Uyvy => b"2vuy",
      PixelFormat::V210 => b"v210",
      PixelFormat::Yu64 => b"YU64",
      PixelFormat::R408 => b"r408",
      PixelFormat::V408 => b"v408",
      PixelFormat::Rgb24 => b"RGB8",
      PixelFormat::Bgr24 => b"BGR8",
      PixelFormat::Bgra => b"BGRA",
      PixelFormat::BgraTopDown => b"BGRa",
      PixelFormat::B64a => b"b64a",
      PixelFormat::Rg48 => b"RG48",
      PixelFormat::Wp13 => b"WP13",
      PixelFormat::W13a => b"W13A",
      PixelFormat::R210 => b"r210",
      PixelFormat::Dpx0 => b"DPX0",
      PixelFormat::Ar10 => b"AR10",
      PixelFormat::Ab10 => b"AB10",
      PixelFormat::Rg30 => b"RG30",
      PixelFormat::Byr2 => b"BYR2",
      PixelFormat::Byr4 => b"BYR4",
    }
  }

  pub fn color_model(self) -> ColorModel {
    match self {
      PixelFormat::Yuy2 | PixelFormat::Uyvy | PixelFormat::V210 | PixelFormat::Yu64 => {
        ColorModel::Yuv422
      }
      PixelFormat::R408 | PixelFormat::V408 => ColorModel::Yuv444,
      PixelFormat::Byr2 | PixelFormat::Byr4 => ColorModel::Bayer,
      _ => ColorModel::Rgb,
    }
  }

  pub fn bits_per_component(self) -> usize {
    match self {
      PixelFormat::Yuy2 | PixelFormat::Uyvy | PixelFormat::R408 | PixelFormat::V408
      | PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Bgra
      | PixelFormat::BgraTopDown => 8,
      PixelFormat::V210 | PixelFormat::R210 | PixelFormat::Dpx0 | PixelFormat::Ar10
      | PixelFormat::Ab10 | PixelFormat::Rg30 | PixelFormat::Byr2 => 10,
      PixelFormat::Wp13 | PixelFormat::W13a => 13,
      PixelFormat::Yu64 | PixelFormat::B64a | PixelFormat::Rg48 | PixelFormat::Byr4 => 16,
    }
  }

  pub fn has_alpha(self) -> bool {
    matches!(
      self,
      PixelFormat::Bgra | PixelFormat::BgraTopDown | PixelFormat::B64a
        | PixelFormat::W13a | PixelFormat::R408 | PixelFormat::V408
        | PixelFormat::Ar10
    )
  }

  pub fn bottom_up(self) -> bool {
    matches!(self, PixelFormat::Bgra | PixelFormat::Bgr24)
  }

  // Bytes per row of `width` pixels.
  // Bayer formats store one quad row (two sensor rows) per frame row, so
  // their pitch covers width*4 components at half the nominal row count.
  pub fn row_pitch(self, width: usize) -> usize {
    match self {
      PixelFormat::Yuy2 | PixelFormat::Uyvy => width * 2,
      // v210 packs 6 pixels into 16 bytes; rows round up to 48-pixel groups
      PixelFormat::V210 => ((width + 47) / 48) * 128,
      PixelFormat::Yu64 => width * 4,
      PixelFormat::R408 | PixelFormat::V408 => width * 4,
      PixelFormat::Rgb24 | PixelFormat::Bgr24 => width * 3,
      PixelFormat::Bgra | PixelFormat::BgraTopDown => width * 4,
      PixelFormat::B64a => width * 8,
      PixelFormat::Rg48 | PixelFormat::Wp13 => width * 6,
      PixelFormat::W13a => width * 8,
      PixelFormat::R210 | PixelFormat::Dpx0 | PixelFormat::Ar10 | PixelFormat::Ab10
      | PixelFormat::Rg30 => width * 4,
      PixelFormat::Byr2 | PixelFormat::Byr4 => width * 4,
    }
  }
}

impl EncodedFormat {
  pub fn to_tag(self) -> u16 {
    match self {
      EncodedFormat::Yuv422 => 0,
      EncodedFormat::Rgb444 => 1,
      EncodedFormat::Rgba4444 => 2,
      EncodedFormat::Bayer => 3,
      EncodedFormat::Yuva4444 => 4,
    }
  }

  pub fn from_tag(tag: u16) -> Result<EncodedFormat> {
    let format = match tag {
      0 => EncodedFormat::Yuv422,
      1 => EncodedFormat::Rgb444,
      2 => EncodedFormat::Rgba4444,
      3 => EncodedFormat::Bayer,
      4 => EncodedFormat::Yuva4444,
      _ => return Err(CodecError::BadSample("bad encoded format tag")),
    };
    return Ok(format);
  }

  pub fn channel_count(self) -> usize {
    match self {
      EncodedFormat::Yuv422 | EncodedFormat::Rgb444 => 3,
      EncodedFormat::Rgba4444 | EncodedFormat::Yuva4444 | EncodedFormat::Bayer => 4,
    }
  }

  // Dimensions of one coded channel for a frame of the given size.
  // Chroma channels of 4:2:2 are half width; Bayer components are half
  // size in both dimensions.
  pub fn channel_dims(self, channel: usize, width: usize, height: usize) -> (usize, usize) {
    assert!(channel < self.channel_count());
    match self {
      EncodedFormat::Yuv422 if channel > 0 => ((width + 1) / 2, height),
      EncodedFormat::Bayer => ((width + 1) / 2, (height + 1) / 2),
      _ => (width, height),
    }
  }
}

impl ColorSpace {
  pub fn to_tag(self) -> u16 {
    match self {
      ColorSpace::Cg601 => 0,
      ColorSpace::Cg709 => 1,
      ColorSpace::Vs601 => 2,
      ColorSpace::Vs709 => 3,
    }
  }

  pub fn from_tag(tag: u16) -> Result<ColorSpace> {
    let cs = match tag {
      0 => ColorSpace::Cg601,
      1 => ColorSpace::Cg709,
      2 => ColorSpace::Vs601,
      3 => ColorSpace::Vs709,
      _ => return Err(CodecError::BadSample("bad color space tag")),
    };
    return Ok(cs);
  }

  pub fn is_bt709(self) -> bool {
    matches!(self, ColorSpace::Cg709 | ColorSpace::Vs709)
  }

  // Computer-graphics range (16-235 luma) vs full-range video systems
  pub fn is_cg_range(self) -> bool {
    matches!(self, ColorSpace::Cg601 | ColorSpace::Cg709)
  }
}

impl Quality {
  pub fn to_tag(self) -> u16 {
    match self {
      Quality::Low => 0,
      Quality::Medium => 1,
      Quality::High => 2,
      Quality::FilmScan1 => 3,
      Quality::FilmScan2 => 4,
    }
  }

  pub fn from_tag(tag: u16) -> Result<Quality> {
    let q = match tag {
      0 => Quality::Low,
      1 => Quality::Medium,
      2 => Quality::High,
      3 => Quality::FilmScan1,
      4 => Quality::FilmScan2,
      _ => return Err(CodecError::BadSample("bad quality tag")),
    };
    return Ok(q);
  }
}

impl DecodedResolution {
  // Output dimensions for an encoded frame of the given size
  pub fn decoded_dims(self, width: usize, height: usize) -> (usize, usize) {
    match self {
      DecodedResolution::Full => (width, height),
      DecodedResolution::Half => ((width + 1) / 2, (height + 1) / 2),
      DecodedResolution::Quarter => ((width + 3) / 4, (height + 3) / 4),
      DecodedResolution::Thumbnail => ((width + 7) / 8, (height + 7) / 8),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fourcc_roundtrip() {
    for format in [
      PixelFormat::Yuy2, PixelFormat::Uyvy, PixelFormat::V210, PixelFormat::Yu64,
      PixelFormat::R408, PixelFormat::V408, PixelFormat::Rgb24, PixelFormat::Bgr24,
      PixelFormat::Bgra, PixelFormat::BgraTopDown, PixelFormat::B64a, PixelFormat::Rg48,
      PixelFormat::Wp13, PixelFormat::W13a, PixelFormat::R210, PixelFormat::Dpx0,
      PixelFormat::Ar10, PixelFormat::Ab10, PixelFormat::Rg30, PixelFormat::Byr2,
      PixelFormat::Byr4,
    ] {
      assert_eq!(PixelFormat::from_fourcc(format.fourcc()).unwrap(), format);
    }
  }

  #[test]
  fn v210_pitch_rounds_to_48_pixel_groups() {
    assert_eq!(PixelFormat::V210.row_pitch(48), 128);
    assert_eq!(PixelFormat::V210.row_pitch(1280), 3456);
    assert_eq!(PixelFormat::V210.row_pitch(1920), 5120);
  }

  #[test]
  fn chroma_channels_are_half_width_at_422() {
    assert_eq!(EncodedFormat::Yuv422.channel_dims(0, 1920, 1080), (1920, 1080));
    assert_eq!(EncodedFormat::Yuv422.channel_dims(1, 1920, 1080), (960, 1080));
    assert_eq!(EncodedFormat::Bayer.channel_dims(3, 1920, 1080), (960, 540));
  }

  #[test]
  fn decoded_resolution_dims() {
    assert_eq!(DecodedResolution::Quarter.decoded_dims(3840, 2160), (960, 540));
    assert_eq!(DecodedResolution::Thumbnail.decoded_dims(1920, 1080), (240, 135));
  }
}
