// Planar images as the codec sees them: an ordered list of channels,
// each a 2-D array of signed 16-bit coefficients with its own size and
// precision. Chroma channels of 4:2:2 material are half width; Bayer
// components are half size in both directions.

use crate::array2d::Array2D;
use crate::pixel::EncodedFormat;

// Internal component precision in bits. Packers deliver 16-bit samples;
// the engine works on 12-bit values so the unnormalized wavelet sums
// keep two levels of headroom in a signed 16-bit coefficient.
pub const INTERNAL_PRECISION: usize = 12;

pub struct Channel {
  pub width: usize,
  pub height: usize,
  pub precision: usize,
  pub data: Array2D<i16>,
}

impl Channel {
  pub fn new(width: usize, height: usize, precision: usize) -> Channel {
    Channel {
      width: width,
      height: height,
      precision: precision,
      data: Array2D::zeroed(height, width),
    }
  }
}

pub struct Image {
  pub channels: Vec<Channel>,
}

impl Image {
  // Allocate the planar channels for one coded frame
  pub fn for_encoded_format(format: EncodedFormat, width: usize, height: usize) -> Image {
    let mut channels = Vec::with_capacity(format.channel_count());
    for index in 0..format.channel_count() {
      let (w, h) = format.channel_dims(index, width, height);
      channels.push(Channel::new(w, h, INTERNAL_PRECISION));
    }
    Image { channels: channels }
  }

  pub fn channel_count(&self) -> usize {
    self.channels.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yuv422_chroma_is_half_width() {
    let image = Image::for_encoded_format(EncodedFormat::Yuv422, 1920, 1080);
    assert_eq!(image.channels[0].width, 1920);
    assert_eq!(image.channels[1].width, 960);
    assert_eq!(image.channels[2].height, 1080);
  }

  #[test]
  fn bayer_components_are_half_size() {
    let image = Image::for_encoded_format(EncodedFormat::Bayer, 1920, 1080);
    assert_eq!(image.channel_count(), 4);
    assert_eq!(image.channels[0].width, 960);
    assert_eq!(image.channels[0].height, 540);
  }
}
