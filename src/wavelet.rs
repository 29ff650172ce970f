// Copyright (c) 2024-2025, The cfwave contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License. If
// the BSD 2 Clause License was not distributed with this source code in the
// LICENSE file, you can obtain it at
// https://opensource.org/license/bsd-2-clause

// Forward and inverse 2/6 biorthogonal wavelet in lifting form, the
// spatial recursion over the lowpass band, and the two-frame temporal
// transform.
//
// The 1-D kernel:
//   L[n] = x[2n] + x[2n+1]                       (unnormalized sum)
//   H[n] = x[2n] - x[2n+1]
//        + ((-x[2n-2] - x[2n-1] + x[2n+2] + x[2n+3] + 4) >> 3)
// The six-tap correction term equals (-L[n-1] + L[n+1] + 4) >> 3, which
// is how it is computed here. At the edges the missing neighbor sum is
// replaced by the nearest valid one, and the inverse substitutes the
// same value, so forward-then-inverse is an exact identity.
//
// The lowpass gains two bits per level; levels two and deeper prescale
// their input by (x + 2) >> 2 so every stored band fits 14 bits of a
// 16-bit signed coefficient.

use crate::array2d::Array2D;

// Band indices within a wavelet
pub const BAND_LL: usize = 0;
pub const BAND_LH: usize = 1; // horizontal highpass, vertical lowpass
pub const BAND_HL: usize = 2; // horizontal lowpass, vertical highpass
pub const BAND_HH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandState {
  #[default]
  Empty,
  Started,
  Decoded,
  Valid,
}

// One level of the decomposition: four band buffers plus their state
// and quantization steps. Wavelets live in the arena of a Transform and
// refer to the next-deeper level by index.
pub struct Wavelet {
  pub level: usize,
  // Input dimensions of this level before padding to even
  pub input_width: usize,
  pub input_height: usize,
  // Band dimensions
  pub width: usize,
  pub height: usize,
  pub bands: [Array2D<i16>; 4],
  pub state: [BandState; 4],
  pub quant: [i32; 4],
  pub parent: Option<usize>,
}

impl Wavelet {
  pub fn new(level: usize, input_width: usize, input_height: usize, parent: Option<usize>) -> Wavelet {
    let width = (input_width + 1) / 2;
    let height = (input_height + 1) / 2;
    Wavelet {
      level: level,
      input_width: input_width,
      input_height: input_height,
      width: width,
      height: height,
      bands: [
        Array2D::zeroed(height, width),
        Array2D::zeroed(height, width),
        Array2D::zeroed(height, width),
        Array2D::zeroed(height, width),
      ],
      state: [BandState::Empty; 4],
      quant: [1; 4],
      parent: parent,
    }
  }
}

// The wavelet tree for one channel. wavelets[0] is level 1 (finest);
// wavelets[levels-1] holds the deepest lowpass.
pub struct Transform {
  pub levels: usize,
  pub wavelets: Vec<Wavelet>,
}

impl Transform {
  // Allocate an empty tree for a channel of the given size
  pub fn new(width: usize, height: usize, levels: usize) -> Transform {
    assert!(levels >= 1 && levels <= 3);
    let mut wavelets = Vec::with_capacity(levels);
    let mut w = width;
    let mut h = height;
    for level in 1..=levels {
      let parent = if level < levels { Some(level) } else { None };
      let wavelet = Wavelet::new(level, w, h, parent);
      w = wavelet.width;
      h = wavelet.height;
      wavelets.push(wavelet);
    }
    Transform {
      levels: levels,
      wavelets: wavelets,
    }
  }

  pub fn deepest(&self) -> &Wavelet {
    &self.wavelets[self.levels - 1]
  }

  // The largest spatial level count that keeps the deepest band at
  // least two samples in each direction
  pub fn max_levels(width: usize, height: usize) -> usize {
    let mut levels = 0;
    let mut w = width;
    let mut h = height;
    while levels < 3 && w >= 4 && h >= 4 {
      w = (w + 1) / 2;
      h = (h + 1) / 2;
      levels += 1;
    }
    return levels.max(1);
  }
}

fn forward_1d(input: &[i16], low: &mut [i16], high: &mut [i16]) {
  let n = low.len();
  assert!(input.len() == 2 * n);
  assert!(high.len() == n);
  assert!(n >= 1);

  for i in 0..n {
    let sum = input[2 * i] as i32 + input[2 * i + 1] as i32;
    debug_assert!(sum >= i16::MIN as i32 && sum <= i16::MAX as i32);
    low[i] = sum as i16;
  }

  for i in 0..n {
    let prev = low[if i > 0 { i - 1 } else { 0 }] as i32;
    let next = low[if i + 1 < n { i + 1 } else { n - 1 }] as i32;
    let correction = (-prev + next + 4) >> 3;
    let diff = input[2 * i] as i32 - input[2 * i + 1] as i32;
    high[i] = (diff + correction).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
  }
}

fn inverse_1d(low: &[i16], high: &[i16], output: &mut [i16]) {
  let n = low.len();
  assert!(high.len() == n);
  assert!(output.len() == 2 * n);

  for i in 0..n {
    let prev = low[if i > 0 { i - 1 } else { 0 }] as i32;
    let next = low[if i + 1 < n { i + 1 } else { n - 1 }] as i32;
    let correction = (-prev + next + 4) >> 3;
    let diff = high[i] as i32 - correction;
    // L + D = 2*x[2n] exactly, so the shift loses nothing
    let x0 = (low[i] as i32 + diff) >> 1;
    let x1 = low[i] as i32 - x0;
    output[2 * i] = x0 as i16;
    output[2 * i + 1] = x1 as i16;
  }
}

// Copy a plane, rounding its dimensions up to even by duplicating the
// last column/row
fn pad_to_even(input: &Array2D<i16>) -> Array2D<i16> {
  let rows = input.rows();
  let cols = input.cols();
  let rows2 = rows + (rows & 1);
  let cols2 = cols + (cols & 1);
  if rows2 == rows && cols2 == cols {
    return input.clone();
  }
  let mut out = Array2D::zeroed(rows2, cols2);
  for r in 0..rows2 {
    let src_row = r.min(rows - 1);
    for c in 0..cols2 {
      out[r][c] = input[src_row][c.min(cols - 1)];
    }
  }
  return out;
}

fn crop(input: &Array2D<i16>, rows: usize, cols: usize) -> Array2D<i16> {
  if input.rows() == rows && input.cols() == cols {
    return input.clone();
  }
  assert!(rows <= input.rows() && cols <= input.cols());
  let mut out = Array2D::zeroed(rows, cols);
  for r in 0..rows {
    out[r][..].copy_from_slice(&input[r][..cols]);
  }
  return out;
}

fn descale(input: &Array2D<i16>) -> Array2D<i16> {
  let mut out = Array2D::zeroed(input.rows(), input.cols());
  for r in 0..input.rows() {
    for c in 0..input.cols() {
      out[r][c] = ((input[r][c] as i32 + 2) >> 2) as i16;
    }
  }
  return out;
}

fn upscale(input: &Array2D<i16>) -> Array2D<i16> {
  let mut out = Array2D::zeroed(input.rows(), input.cols());
  for r in 0..input.rows() {
    for c in 0..input.cols() {
      out[r][c] = ((input[r][c] as i32) << 2).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
  }
  return out;
}

// One 2-D decomposition: horizontal pass over every row, vertical pass
// over every column of the two half-width planes. Input dimensions must
// be even.
pub fn forward_2d(input: &Array2D<i16>) -> [Array2D<i16>; 4] {
  let rows = input.rows();
  let cols = input.cols();
  assert!(rows % 2 == 0 && cols % 2 == 0);
  assert!(rows >= 2 && cols >= 2);
  let half_rows = rows / 2;
  let half_cols = cols / 2;

  let mut row_low = Array2D::<i16>::zeroed(rows, half_cols);
  let mut row_high = Array2D::<i16>::zeroed(rows, half_cols);
  {
    let mut low = vec![0i16; half_cols];
    let mut high = vec![0i16; half_cols];
    for r in 0..rows {
      forward_1d(&input[r], &mut low, &mut high);
      row_low[r].copy_from_slice(&low);
      row_high[r].copy_from_slice(&high);
    }
  }

  let mut ll = Array2D::zeroed(half_rows, half_cols);
  let mut lh = Array2D::zeroed(half_rows, half_cols);
  let mut hl = Array2D::zeroed(half_rows, half_cols);
  let mut hh = Array2D::zeroed(half_rows, half_cols);

  let mut column = vec![0i16; rows];
  let mut low = vec![0i16; half_rows];
  let mut high = vec![0i16; half_rows];
  for c in 0..half_cols {
    row_low.gather_col(c, &mut column);
    forward_1d(&column, &mut low, &mut high);
    ll.scatter_col(c, &low);
    hl.scatter_col(c, &high);

    row_high.gather_col(c, &mut column);
    forward_1d(&column, &mut low, &mut high);
    lh.scatter_col(c, &low);
    hh.scatter_col(c, &high);
  }

  return [ll, lh, hl, hh];
}

// Exact inverse of forward_2d
pub fn inverse_2d(bands: &[Array2D<i16>; 4]) -> Array2D<i16> {
  let half_rows = bands[BAND_LL].rows();
  let half_cols = bands[BAND_LL].cols();
  for band in bands.iter() {
    assert!(band.rows() == half_rows && band.cols() == half_cols);
  }
  let rows = half_rows * 2;
  let cols = half_cols * 2;

  let mut row_low = Array2D::<i16>::zeroed(rows, half_cols);
  let mut row_high = Array2D::<i16>::zeroed(rows, half_cols);
  {
    let mut low = vec![0i16; half_rows];
    let mut high = vec![0i16; half_rows];
    let mut full = vec![0i16; rows];
    for c in 0..half_cols {
      bands[BAND_LL].gather_col(c, &mut low);
      bands[BAND_HL].gather_col(c, &mut high);
      inverse_1d(&low, &high, &mut full);
      row_low.scatter_col(c, &full);

      bands[BAND_LH].gather_col(c, &mut low);
      bands[BAND_HH].gather_col(c, &mut high);
      inverse_1d(&low, &high, &mut full);
      row_high.scatter_col(c, &full);
    }
  }

  let mut output = Array2D::zeroed(rows, cols);
  for r in 0..rows {
    let mut full = vec![0i16; cols];
    inverse_1d(&row_low[r], &row_high[r], &mut full);
    output[r].copy_from_slice(&full);
  }
  return output;
}

// Decompose one channel plane into a complete transform tree
pub fn forward_channel(plane: &Array2D<i16>, levels: usize) -> Transform {
  let mut transform = Transform::new(plane.cols(), plane.rows(), levels);

  let mut current = plane.clone();
  for index in 0..levels {
    if index > 0 {
      current = descale(&current);
    }
    let padded = pad_to_even(&current);
    let bands = forward_2d(&padded);
    let wavelet = &mut transform.wavelets[index];
    assert!(bands[BAND_LL].rows() == wavelet.height);
    assert!(bands[BAND_LL].cols() == wavelet.width);
    wavelet.bands = bands;
    wavelet.state = [BandState::Valid; 4];
    current = wavelet.bands[BAND_LL].clone();
  }
  return transform;
}

// Rebuild the channel plane down to `stop_level`. stop_level 0 yields
// the full-resolution plane; stop_level k yields the level-k lowpass
// (half resolution per level). All bands of the levels being inverted
// must have been populated.
pub fn reconstruct_channel(transform: &Transform, stop_level: usize) -> Array2D<i16> {
  assert!(stop_level <= transform.levels);
  if stop_level == transform.levels {
    return transform.deepest().bands[BAND_LL].clone();
  }

  let mut current = transform.deepest().bands[BAND_LL].clone();
  for index in (stop_level..transform.levels).rev() {
    let wavelet = &transform.wavelets[index];
    for band in 1..4 {
      assert!(
        wavelet.state[band] == BandState::Decoded || wavelet.state[band] == BandState::Valid,
        "inverting level {} with band {} in state {:?}", wavelet.level, band, wavelet.state[band]
      );
    }
    let bands = [
      current,
      wavelet.bands[BAND_LH].clone(),
      wavelet.bands[BAND_HL].clone(),
      wavelet.bands[BAND_HH].clone(),
    ];
    let padded = inverse_2d(&bands);
    let mut plane = crop(&padded, wavelet.input_height, wavelet.input_width);
    if index > 0 {
      plane = upscale(&plane);
    }
    current = plane;
  }
  return current;
}

// Two-frame temporal transform:
//   low = (f0 + f1) >> 1, high = f1 - f0
// and its exact integer inverse
pub fn temporal_forward(f0: &Array2D<i16>, f1: &Array2D<i16>) -> (Array2D<i16>, Array2D<i16>) {
  assert!(f0.rows() == f1.rows() && f0.cols() == f1.cols());
  let mut low = Array2D::zeroed(f0.rows(), f0.cols());
  let mut high = Array2D::zeroed(f0.rows(), f0.cols());
  for r in 0..f0.rows() {
    for c in 0..f0.cols() {
      let a = f0[r][c] as i32;
      let b = f1[r][c] as i32;
      low[r][c] = ((a + b) >> 1) as i16;
      high[r][c] = (b - a).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
  }
  return (low, high);
}

pub fn temporal_inverse(low: &Array2D<i16>, high: &Array2D<i16>) -> (Array2D<i16>, Array2D<i16>) {
  assert!(low.rows() == high.rows() && low.cols() == high.cols());
  let mut f0 = Array2D::zeroed(low.rows(), low.cols());
  let mut f1 = Array2D::zeroed(low.rows(), low.cols());
  for r in 0..low.rows() {
    for c in 0..low.cols() {
      let l = low[r][c] as i32;
      let h = high[r][c] as i32;
      f0[r][c] = (l - (h >> 1)) as i16;
      f1[r][c] = (l + ((h + 1) >> 1)) as i16;
    }
  }
  return (f0, f1);
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{Rng, SeedableRng};
  use rand::rngs::StdRng;

  fn random_plane(rng: &mut StdRng, rows: usize, cols: usize, limit: i16) -> Array2D<i16> {
    let mut plane = Array2D::zeroed(rows, cols);
    for r in 0..rows {
      for c in 0..cols {
        plane[r][c] = rng.gen_range(0..limit);
      }
    }
    return plane;
  }

  #[test]
  fn one_dimensional_roundtrip_is_exact() {
    let mut rng = StdRng::seed_from_u64(1);
    for len in [2usize, 4, 6, 64, 254] {
      let input: Vec<i16> = (0..len).map(|_| rng.gen_range(-4096..4096)).collect();
      let mut low = vec![0i16; len / 2];
      let mut high = vec![0i16; len / 2];
      forward_1d(&input, &mut low, &mut high);
      let mut output = vec![0i16; len];
      inverse_1d(&low, &high, &mut output);
      assert_eq!(input, output);
    }
  }

  #[test]
  fn single_level_2d_roundtrip_is_exact() {
    let mut rng = StdRng::seed_from_u64(2);
    let plane = random_plane(&mut rng, 32, 48, 4096);
    let bands = forward_2d(&plane);
    let back = inverse_2d(&bands);
    for r in 0..32 {
      assert_eq!(&plane[r][..], &back[r][..]);
    }
  }

  #[test]
  fn three_level_roundtrip_stays_within_prescale_error() {
    let mut rng = StdRng::seed_from_u64(3);
    let plane = random_plane(&mut rng, 40, 56, 4096);
    let transform = forward_channel(&plane, 3);
    let back = reconstruct_channel(&transform, 0);
    for r in 0..plane.rows() {
      for c in 0..plane.cols() {
        let diff = (plane[r][c] as i32 - back[r][c] as i32).abs();
        assert!(diff <= 8, "error {} at ({}, {})", diff, r, c);
      }
    }
  }

  #[test]
  fn odd_dimensions_pad_and_crop() {
    let mut rng = StdRng::seed_from_u64(4);
    let plane = random_plane(&mut rng, 33, 47, 4096);
    let transform = forward_channel(&plane, 2);
    let back = reconstruct_channel(&transform, 0);
    assert_eq!(back.rows(), 33);
    assert_eq!(back.cols(), 47);
    for r in 0..33 {
      for c in 0..47 {
        let diff = (plane[r][c] as i32 - back[r][c] as i32).abs();
        assert!(diff <= 4);
      }
    }
  }

  #[test]
  fn partial_reconstruction_dims_follow_the_tree() {
    let plane = Array2D::<i16>::zeroed(1080, 1920);
    let transform = forward_channel(&plane, 3);
    assert_eq!(reconstruct_channel(&transform, 1).cols(), 960);
    assert_eq!(reconstruct_channel(&transform, 2).cols(), 480);
    assert_eq!(reconstruct_channel(&transform, 3).cols(), 240);
  }

  #[test]
  fn temporal_roundtrip_is_exact_for_all_parities() {
    let mut rng = StdRng::seed_from_u64(5);
    let f0 = random_plane(&mut rng, 16, 16, 4096);
    let f1 = random_plane(&mut rng, 16, 16, 4096);
    let (low, high) = temporal_forward(&f0, &f1);
    let (g0, g1) = temporal_inverse(&low, &high);
    for r in 0..16 {
      assert_eq!(&f0[r][..], &g0[r][..]);
      assert_eq!(&f1[r][..], &g1[r][..]);
    }
  }

  #[test]
  fn max_levels_respects_small_frames() {
    assert_eq!(Transform::max_levels(1920, 1080), 3);
    assert_eq!(Transform::max_levels(8, 8), 2);
    assert_eq!(Transform::max_levels(4, 4), 1);
  }
}
