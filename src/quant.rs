// Per-subband quantization. Quality levels map to fixed step vectors,
// one entry per subband in the §-numbering used by the bitstream: index 0
// is the deepest lowpass, then each level's (LH, HL, HH) from the deepest
// level outward. Chroma channels get their own, slightly coarser vector.

use crate::array2d::Array2D;
use crate::pixel::Quality;

pub const MAX_SUBBANDS: usize = 10;

// [luma, chroma] step vectors per quality
const QUANT_LOW: [[i32; MAX_SUBBANDS]; 2] = [
  [1, 4, 4, 4, 8, 8, 8, 16, 16, 24],
  [1, 4, 4, 8, 8, 8, 16, 16, 16, 32],
];

const QUANT_MEDIUM: [[i32; MAX_SUBBANDS]; 2] = [
  [1, 2, 2, 4, 4, 4, 8, 8, 8, 12],
  [1, 4, 4, 4, 8, 8, 8, 12, 12, 16],
];

const QUANT_HIGH: [[i32; MAX_SUBBANDS]; 2] = [
  [1, 2, 2, 2, 4, 4, 4, 8, 8, 8],
  [1, 2, 2, 4, 4, 4, 8, 8, 8, 12],
];

const QUANT_FILMSCAN1: [[i32; MAX_SUBBANDS]; 2] = [
  [1, 1, 1, 1, 2, 2, 2, 4, 4, 4],
  [1, 1, 1, 2, 2, 2, 4, 4, 4, 8],
];

const QUANT_FILMSCAN2: [[i32; MAX_SUBBANDS]; 2] = [
  [1, 1, 1, 1, 1, 1, 1, 2, 2, 2],
  [1, 1, 1, 1, 1, 1, 2, 2, 2, 4],
];

fn table(quality: Quality) -> &'static [[i32; MAX_SUBBANDS]; 2] {
  match quality {
    Quality::Low => &QUANT_LOW,
    Quality::Medium => &QUANT_MEDIUM,
    Quality::High => &QUANT_HIGH,
    Quality::FilmScan1 => &QUANT_FILMSCAN1,
    Quality::FilmScan2 => &QUANT_FILMSCAN2,
  }
}

// Step for one subband of a transform with `levels` spatial levels.
// Transforms with fewer than three levels use the entries of their
// deepest level, i.e. a two-level transform reads positions 4..=9.
pub fn step_for(quality: Quality, is_chroma: bool, levels: usize, subband: usize) -> i32 {
  assert!(levels >= 1 && levels <= 3);
  assert!(subband <= 3 * levels);

  let row = &table(quality)[is_chroma as usize];
  if subband == 0 {
    return row[0];
  }
  return row[subband + 3 * (3 - levels)];
}

// q(x) = round(x / step) with ties away from zero
pub fn quantize_band(band: &mut Array2D<i16>, step: i32) {
  assert!(step > 0);
  if step == 1 {
    return;
  }
  let bias = step / 2;
  for row in 0..band.rows() {
    let line = &mut band[row];
    for value in line.iter_mut() {
      let x = *value as i32;
      let magnitude = (x.abs() + bias) / step;
      let index = if x < 0 { -magnitude } else { magnitude };
      *value = index.clamp(i16::MIN as i32 + 1, i16::MAX as i32) as i16;
    }
  }
}

// x = q * step, saturating; zero indices skip the multiply
pub fn dequantize_band(band: &mut Array2D<i16>, step: i32) {
  assert!(step > 0);
  if step == 1 {
    return;
  }
  for row in 0..band.rows() {
    let line = &mut band[row];
    for value in line.iter_mut() {
      let index = *value as i32;
      if index != 0 {
        *value = (index * step).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rounding_is_ties_away_from_zero() {
    let mut band = Array2D::<i16>::zeroed(1, 6);
    let inputs = [5i16, -5, 4, -4, 6, -6];
    for (i, value) in inputs.iter().enumerate() {
      band[0][i] = *value;
    }
    quantize_band(&mut band, 10);
    assert_eq!(&band[0][..], &[1, -1, 0, 0, 1, -1]);
  }

  #[test]
  fn dequantize_scales_back() {
    let mut band = Array2D::<i16>::zeroed(1, 3);
    band[0][0] = 3;
    band[0][1] = -2;
    band[0][2] = 0;
    dequantize_band(&mut band, 8);
    assert_eq!(&band[0][..], &[24, -16, 0]);
  }

  #[test]
  fn quant_error_bounded_by_half_step() {
    let step = 6;
    for x in -100i16..=100 {
      let mut band = Array2D::<i16>::zeroed(1, 1);
      band[0][0] = x;
      quantize_band(&mut band, step);
      dequantize_band(&mut band, step);
      assert!((band[0][0] as i32 - x as i32).abs() <= step / 2);
    }
  }

  #[test]
  fn lowpass_step_is_always_one() {
    for quality in [Quality::Low, Quality::Medium, Quality::High, Quality::FilmScan1, Quality::FilmScan2] {
      assert_eq!(step_for(quality, false, 3, 0), 1);
      assert_eq!(step_for(quality, true, 3, 0), 1);
    }
  }

  #[test]
  fn shallower_transforms_use_the_deep_entries() {
    // A one-level transform quantizes its three bands like the finest
    // level of the three-level vector
    assert_eq!(
      step_for(Quality::Low, false, 1, 1),
      step_for(Quality::Low, false, 3, 7)
    );
  }
}
