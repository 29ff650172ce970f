// Copyright (c) 2024-2025, The cfwave contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License. If
// the BSD 2 Clause License was not distributed with this source code in the
// LICENSE file, you can obtain it at
// https://opensource.org/license/bsd-2-clause

// The encoder engine. One instance owns the per-channel transform state
// and drives the full pipeline per frame:
//   unpack rows -> color convert -> (temporal transform) -> spatial
//   wavelet -> quantize -> entropy code -> tag-value container.
//
// With a GOP length of two the first frame of each pair is buffered and
// encode_sample returns None; the pair is coded into a single sample
// when the second frame arrives.

use log::debug;

use crate::color;
use crate::error::{CodecError, Result};
use crate::frame::{Image, INTERNAL_PRECISION};
use crate::metadata::{MetadataScope, MetadataStore};
use crate::pack::{self, PlanarRows};
use crate::pixel::{ColorModel, ColorSpace, EncodedFormat, PixelFormat, Quality};
use crate::quant;
use crate::sample::{self, tag, SampleWriter};
use crate::vlc;
use crate::wavelet::{self, Transform, BAND_LL};

#[derive(Debug, Clone)]
pub struct EncoderParams {
  pub width: usize,
  pub height: usize,
  pub input_format: PixelFormat,
  pub encoded_format: EncodedFormat,
  pub color_space: ColorSpace,
  pub quality: Quality,
  pub gop_length: usize,
  pub progressive: bool,
  pub chroma_full_res: bool,
  pub frame_rate: u32,
}

impl Default for EncoderParams {
  fn default() -> Self {
    Self {
      width: 0,
      height: 0,
      input_format: PixelFormat::Bgra,
      encoded_format: EncodedFormat::Rgb444,
      color_space: ColorSpace::default(),
      quality: Quality::default(),
      gop_length: 1,
      progressive: true,
      chroma_full_res: false,
      frame_rate: 24,
    }
  }
}

pub struct Encoder {
  params: EncoderParams,
  levels: usize,
  prepared: bool,
  // First frame of a temporal pair, waiting for its partner
  pending: Option<Image>,
  pending_quality: Quality,
  metadata: MetadataStore,
  frame_count: u32,
}

// Which conversions the row importer can perform
fn conversion_supported(input: ColorModel, encoded: EncodedFormat) -> bool {
  match (input, encoded) {
    (ColorModel::Bayer, EncodedFormat::Bayer) => true,
    (ColorModel::Rgb, EncodedFormat::Rgb444)
    | (ColorModel::Rgb, EncodedFormat::Rgba4444)
    | (ColorModel::Rgb, EncodedFormat::Yuv422)
    | (ColorModel::Rgb, EncodedFormat::Yuva4444) => true,
    (ColorModel::Yuv422, EncodedFormat::Yuv422)
    | (ColorModel::Yuv422, EncodedFormat::Rgb444)
    | (ColorModel::Yuv422, EncodedFormat::Yuva4444) => true,
    (ColorModel::Yuv444, EncodedFormat::Yuva4444)
    | (ColorModel::Yuv444, EncodedFormat::Yuv422)
    | (ColorModel::Yuv444, EncodedFormat::Rgb444) => true,
    _ => false,
  }
}

impl Encoder {
  pub fn new() -> Encoder {
    Encoder {
      params: EncoderParams::default(),
      levels: 0,
      prepared: false,
      pending: None,
      pending_quality: Quality::default(),
      metadata: MetadataStore::new(),
      frame_count: 0,
    }
  }

  pub fn prepare(&mut self, params: EncoderParams) -> Result<()> {
    if params.width == 0 || params.height == 0 {
      return Err(CodecError::InvalidArgument("frame dimensions must be positive"));
    }
    if params.width > 0xFFFF || params.height > 0xFFFF {
      return Err(CodecError::InvalidArgument("frame dimensions exceed 16 bits"));
    }
    if params.gop_length == 0 || params.gop_length > 2 {
      return Err(CodecError::InvalidArgument("GOP length must be 1 or 2"));
    }
    if !conversion_supported(params.input_format.color_model(), params.encoded_format) {
      return Err(CodecError::BadFormat);
    }

    // Bayer codes four half-size component planes
    let (cw, ch) = params.encoded_format.channel_dims(0, params.width, params.height);
    self.levels = Transform::max_levels(cw, ch);
    self.params = params;
    self.prepared = true;
    self.pending = None;
    self.frame_count = 0;
    return Ok(());
  }

  pub fn params(&self) -> &EncoderParams {
    &self.params
  }

  pub fn is_prepared(&self) -> bool {
    self.prepared
  }

  pub fn attach_metadata(&mut self, scope: MetadataScope, tag: [u8; 4], type_code: u8, payload: &[u8]) {
    self.metadata.set(scope, tag, type_code, payload);
  }

  pub fn metadata_mut(&mut self) -> &mut MetadataStore {
    &mut self.metadata
  }

  // Replace the whole store; the pool uses this to hand each frame its
  // own snapshot
  pub fn set_metadata(&mut self, store: MetadataStore) {
    self.metadata = store;
  }

  pub fn encode_sample(&mut self, frame: &[u8], pitch: usize) -> Result<Option<Vec<u8>>> {
    let quality = self.params.quality;
    return self.encode_sample_with_quality(frame, pitch, quality);
  }

  // Encode one frame, optionally overriding the prepared quality for
  // this frame only. Returns None when the frame was buffered as the
  // head of a temporal pair.
  pub fn encode_sample_with_quality(
    &mut self,
    frame: &[u8],
    pitch: usize,
    quality: Quality,
  ) -> Result<Option<Vec<u8>>> {
    if !self.prepared {
      return Err(CodecError::EncodingNotStarted);
    }

    let image = self.import_frame(frame, pitch)?;
    let frame_number = self.frame_count;
    self.frame_count += 1;

    if self.params.gop_length == 2 {
      match self.pending.take() {
        None => {
          self.pending = Some(image);
          self.pending_quality = quality;
          return Ok(None);
        }
        Some(first) => {
          // The head frame's quality decides the whole GOP
          let gop_quality = self.pending_quality;
          let sample = self.encode_pair(&first, &image, frame_number - 1, gop_quality)?;
          return Ok(Some(sample));
        }
      }
    }

    let sample = self.encode_intra(&image, frame_number, quality)?;
    return Ok(Some(sample));
  }

  // Flush a buffered GOP head as a one-frame intra sample. Used at end
  // of stream when the frame count is odd.
  pub fn flush(&mut self) -> Result<Option<Vec<u8>>> {
    if !self.prepared {
      return Err(CodecError::EncodingNotStarted);
    }
    match self.pending.take() {
      None => Ok(None),
      Some(image) => {
        let frame_number = self.frame_count - 1;
        let quality = self.pending_quality;
        let sample = self.encode_intra(&image, frame_number, quality)?;
        Ok(Some(sample))
      }
    }
  }

  fn encode_intra(&mut self, image: &Image, frame_number: u32, quality: Quality) -> Result<Vec<u8>> {
    let transforms = self.transform_image(image, quality);
    return self.build_sample(sample::SAMPLE_TYPE_INTRA, &transforms, None, frame_number, quality);
  }

  fn encode_pair(&mut self, f0: &Image, f1: &Image, frame_number: u32, quality: Quality) -> Result<Vec<u8>> {
    let mut low = Image::for_encoded_format(self.params.encoded_format, self.params.width, self.params.height);
    let mut high = Image::for_encoded_format(self.params.encoded_format, self.params.width, self.params.height);
    for ch in 0..f0.channel_count() {
      let (l, h) = wavelet::temporal_forward(&f0.channels[ch].data, &f1.channels[ch].data);
      low.channels[ch].data = l;
      high.channels[ch].data = h;
    }

    let low_transforms = self.transform_image(&low, quality);
    let high_transforms = self.transform_image(&high, quality);
    return self.build_sample(
      sample::SAMPLE_TYPE_TEMPORAL_GOP,
      &low_transforms,
      Some(&high_transforms),
      frame_number,
      quality,
    );
  }

  // Spatial decomposition plus quantization for every channel
  fn transform_image(&self, image: &Image, quality: Quality) -> Vec<Transform> {
    let mut transforms = Vec::with_capacity(image.channel_count());
    for (index, channel) in image.channels.iter().enumerate() {
      let mut transform = wavelet::forward_channel(&channel.data, self.levels);
      let is_chroma = self.channel_is_chroma(index);
      for level in 1..=self.levels {
        let wavelet = &mut transform.wavelets[level - 1];
        for band in 1..4 {
          let subband = subband_index(self.levels, level, band);
          let step = quant::step_for(quality, is_chroma, self.levels, subband);
          wavelet.quant[band] = step;
          quant::quantize_band(&mut wavelet.bands[band], step);
        }
      }
      transforms.push(transform);
    }
    return transforms;
  }

  fn channel_is_chroma(&self, channel: usize) -> bool {
    match self.params.encoded_format {
      EncodedFormat::Yuv422 | EncodedFormat::Yuva4444 => channel == 1 || channel == 2,
      _ => false,
    }
  }

  fn build_sample(
    &mut self,
    sample_type: u16,
    low: &[Transform],
    high: Option<&[Transform]>,
    frame_number: u32,
    quality: Quality,
  ) -> Result<Vec<u8>> {
    let p = &self.params;
    let mut writer = SampleWriter::new();

    writer.put_short(tag::SAMPLE_TYPE, sample_type);
    writer.put_short(tag::FRAME_WIDTH, p.width as u16);
    writer.put_short(tag::FRAME_HEIGHT, p.height as u16);
    writer.put_short(tag::DISPLAY_WIDTH, p.width as u16);
    writer.put_short(tag::DISPLAY_HEIGHT, p.height as u16);
    writer.put_short(tag::ENCODED_FORMAT, p.encoded_format.to_tag());
    writer.put_short(tag::COLOR_SPACE, p.color_space.to_tag());
    writer.put_short(tag::CHANNEL_COUNT, p.encoded_format.channel_count() as u16);
    writer.put_short(tag::PRECISION, INTERNAL_PRECISION as u16);
    writer.put_short(tag::QUALITY, quality.to_tag());
    writer.put_short(tag::GOP_LENGTH, p.gop_length as u16);
    let mut flags = 0u16;
    if p.progressive {
      flags |= sample::FLAG_PROGRESSIVE;
    }
    if p.chroma_full_res {
      flags |= sample::FLAG_CHROMA_FULL_RES;
    }
    writer.put_short(tag::SAMPLE_FLAGS, flags);
    writer.put_short(tag::TRANSFORM_LEVELS, self.levels as u16);
    writer.put_short(tag::FRAME_NUMBER, (frame_number & 0xFFFF) as u16);

    let offsets_mark = writer.mark_offsets(tag::CHANNEL_OFFSETS, low.len());

    for (index, transform) in low.iter().enumerate() {
      let offset = writer.position();
      writer.patch_u32(offsets_mark + index * 4, offset as u32);
      write_channel_section(&mut writer, index, transform, self.levels);
    }

    if let Some(high_transforms) = high {
      // The temporal highpass frame rides inside one long tuple so a
      // single-frame decode can step over it without parsing it
      let mut inner = SampleWriter::new();
      for (index, transform) in high_transforms.iter().enumerate() {
        write_channel_section(&mut inner, index, transform, self.levels);
      }
      writer.put_long(tag::TEMPORAL_DATA, &inner.into_bytes());
    }

    let mut snapshot = self.metadata.clone();
    snapshot.ensure_frame_identity(frame_number, p.frame_rate);
    // The clip GUID must stay stable across frames, so an auto-assigned
    // one is copied back into the encoder's own store. Timecode and
    // frame number stay per-snapshot.
    if self.metadata.scope(MetadataScope::Both).get(crate::metadata::TAG_GUID).is_none() {
      let guid = snapshot
        .scope(MetadataScope::Both)
        .get(crate::metadata::TAG_GUID)
        .unwrap()
        .clone();
      self.metadata.set(MetadataScope::Both, guid.tag, guid.type_code, &guid.payload);
    }
    // Empty scopes, the delta scopes included, never reach the wire
    for chunk in snapshot.serialize_scopes() {
      writer.put_long(tag::SAMPLE_METADATA, &chunk);
    }

    let data = writer.finish();
    debug!(
      "encoded frame {} as {} byte {} sample",
      frame_number,
      data.len(),
      if sample_type == sample::SAMPLE_TYPE_INTRA { "intra" } else { "gop" }
    );
    return Ok(data);
  }

  // Unpack and color-convert one input frame into coded planar channels
  fn import_frame(&self, frame: &[u8], pitch: usize) -> Result<Image> {
    let p = &self.params;
    let model = p.input_format.color_model();
    let buffer_rows = if model == ColorModel::Bayer { (p.height + 1) / 2 } else { p.height };
    let row_bytes = p.input_format.row_pitch(p.width);
    if pitch < row_bytes {
      return Err(CodecError::InvalidArgument("row pitch smaller than a packed row"));
    }
    if frame.len() < pitch * (buffer_rows - 1) + row_bytes {
      return Err(CodecError::InvalidArgument("frame buffer too small"));
    }

    let mut image = Image::for_encoded_format(p.encoded_format, p.width, p.height);
    let mut rows = PlanarRows::for_format(p.input_format, p.width);

    let chroma_width = (p.width + 1) / 2;
    let mut full_a = vec![0u16; p.width];
    let mut full_b = vec![0u16; p.width];
    let mut full_c = vec![0u16; p.width];
    let mut half_a = vec![0u16; chroma_width];
    let mut half_b = vec![0u16; chroma_width];

    for out_row in 0..buffer_rows {
      let src_row = if p.input_format.bottom_up() { buffer_rows - 1 - out_row } else { out_row };
      let src = &frame[src_row * pitch..src_row * pitch + row_bytes];
      pack::unpack_row(p.input_format, src, p.width, &mut rows)?;

      match (model, p.encoded_format) {
        (ColorModel::Bayer, EncodedFormat::Bayer) => {
          for ch in 0..4 {
            store_row(&mut image, ch, out_row, &rows.planes[ch][..rows.widths[ch]]);
          }
        }

        (ColorModel::Rgb, EncodedFormat::Rgb444) => {
          for ch in 0..3 {
            store_row(&mut image, ch, out_row, &rows.planes[ch][..p.width]);
          }
        }

        (ColorModel::Rgb, EncodedFormat::Rgba4444) => {
          for ch in 0..3 {
            store_row(&mut image, ch, out_row, &rows.planes[ch][..p.width]);
          }
          if p.input_format.has_alpha() {
            store_row(&mut image, 3, out_row, &rows.planes[3][..p.width]);
          } else {
            store_opaque_row(&mut image, 3, out_row);
          }
        }

        (ColorModel::Rgb, EncodedFormat::Yuv422) => {
          color::rgb_to_yuv_row(
            p.color_space,
            &rows.planes[0][..p.width],
            &rows.planes[1][..p.width],
            &rows.planes[2][..p.width],
            &mut full_a,
            &mut full_b,
            &mut full_c,
          );
          store_row(&mut image, 0, out_row, &full_a);
          color::downsample_chroma_row(&full_b, &mut half_a);
          color::downsample_chroma_row(&full_c, &mut half_b);
          store_row(&mut image, 1, out_row, &half_a);
          store_row(&mut image, 2, out_row, &half_b);
        }

        (ColorModel::Rgb, EncodedFormat::Yuva4444) => {
          color::rgb_to_yuv_row(
            p.color_space,
            &rows.planes[0][..p.width],
            &rows.planes[1][..p.width],
            &rows.planes[2][..p.width],
            &mut full_a,
            &mut full_b,
            &mut full_c,
          );
          store_row(&mut image, 0, out_row, &full_a);
          store_row(&mut image, 1, out_row, &full_b);
          store_row(&mut image, 2, out_row, &full_c);
          if p.input_format.has_alpha() {
            store_row(&mut image, 3, out_row, &rows.planes[3][..p.width]);
          } else {
            store_opaque_row(&mut image, 3, out_row);
          }
        }

        (ColorModel::Yuv422, EncodedFormat::Yuv422) => {
          store_row(&mut image, 0, out_row, &rows.planes[0][..p.width]);
          store_row(&mut image, 1, out_row, &rows.planes[1][..chroma_width]);
          store_row(&mut image, 2, out_row, &rows.planes[2][..chroma_width]);
        }

        (ColorModel::Yuv422, EncodedFormat::Rgb444) => {
          color::upsample_chroma_row(&rows.planes[1][..chroma_width], &mut full_b);
          color::upsample_chroma_row(&rows.planes[2][..chroma_width], &mut full_c);
          full_a.copy_from_slice(&rows.planes[0][..p.width]);
          let (mut r, mut g, mut b) = (vec![0u16; p.width], vec![0u16; p.width], vec![0u16; p.width]);
          color::yuv_to_rgb_row(p.color_space, &full_a, &full_b, &full_c, &mut r, &mut g, &mut b);
          store_row(&mut image, 0, out_row, &r);
          store_row(&mut image, 1, out_row, &g);
          store_row(&mut image, 2, out_row, &b);
        }

        (ColorModel::Yuv422, EncodedFormat::Yuva4444) => {
          color::upsample_chroma_row(&rows.planes[1][..chroma_width], &mut full_b);
          color::upsample_chroma_row(&rows.planes[2][..chroma_width], &mut full_c);
          store_row(&mut image, 0, out_row, &rows.planes[0][..p.width]);
          store_row(&mut image, 1, out_row, &full_b);
          store_row(&mut image, 2, out_row, &full_c);
          store_opaque_row(&mut image, 3, out_row);
        }

        (ColorModel::Yuv444, EncodedFormat::Yuva4444) => {
          for ch in 0..4 {
            store_row(&mut image, ch, out_row, &rows.planes[ch][..p.width]);
          }
        }

        (ColorModel::Yuv444, EncodedFormat::Yuv422) => {
          store_row(&mut image, 0, out_row, &rows.planes[0][..p.width]);
          color::downsample_chroma_row(&rows.planes[1][..p.width], &mut half_a);
          color::downsample_chroma_row(&rows.planes[2][..p.width], &mut half_b);
          store_row(&mut image, 1, out_row, &half_a);
          store_row(&mut image, 2, out_row, &half_b);
        }

        (ColorModel::Yuv444, EncodedFormat::Rgb444) => {
          let (mut r, mut g, mut b) = (vec![0u16; p.width], vec![0u16; p.width], vec![0u16; p.width]);
          color::yuv_to_rgb_row(
            p.color_space,
            &rows.planes[0][..p.width],
            &rows.planes[1][..p.width],
            &rows.planes[2][..p.width],
            &mut r,
            &mut g,
            &mut b,
          );
          store_row(&mut image, 0, out_row, &r);
          store_row(&mut image, 1, out_row, &g);
          store_row(&mut image, 2, out_row, &b);
        }

        _ => return Err(CodecError::BadFormat),
      }
    }
    return Ok(image);
  }
}

// Subband index for a band of one level: 0 is the deepest lowpass,
// then each level's three highpass bands from the deepest level out
pub fn subband_index(levels: usize, level: usize, band: usize) -> usize {
  assert!(band >= 1 && band <= 3);
  assert!(level >= 1 && level <= levels);
  return 1 + 3 * (levels - level) + (band - 1);
}

fn store_row(image: &mut Image, channel: usize, row: usize, values: &[u16]) {
  let ch = &mut image.channels[channel];
  assert!(values.len() == ch.width);
  let line = &mut ch.data[row];
  for (dst, &v) in line.iter_mut().zip(values.iter()) {
    *dst = (v >> (16 - INTERNAL_PRECISION)) as i16;
  }
}

fn store_opaque_row(image: &mut Image, channel: usize, row: usize) {
  let max = (1i16 << INTERNAL_PRECISION) - 1;
  let ch = &mut image.channels[channel];
  let line = &mut ch.data[row];
  for dst in line.iter_mut() {
    *dst = max;
  }
}

fn write_channel_section(writer: &mut SampleWriter, channel: usize, transform: &Transform, levels: usize) {
  writer.put_short(tag::CHANNEL, channel as u16);

  let deepest = transform.deepest();
  writer.put_short(tag::SUBBAND, 0);
  writer.put_short(tag::BAND_WIDTH, deepest.width as u16);
  writer.put_short(tag::BAND_HEIGHT, deepest.height as u16);
  writer.put_short(tag::BAND_QUANT, 1);
  writer.put_short(tag::BAND_ENCODING, sample::BAND_ENCODING_RAW);
  let lowpass = &deepest.bands[BAND_LL];
  let mut payload = Vec::with_capacity(lowpass.as_slice().len() * 2);
  for &value in lowpass.as_slice() {
    payload.extend_from_slice(&value.to_be_bytes());
  }
  writer.put_long(tag::LOWPASS_DATA, &payload);

  for level in (1..=levels).rev() {
    let wavelet = &transform.wavelets[level - 1];
    for band in 1..4 {
      writer.put_short(tag::SUBBAND, subband_index(levels, level, band) as u16);
      writer.put_short(tag::BAND_WIDTH, wavelet.width as u16);
      writer.put_short(tag::BAND_HEIGHT, wavelet.height as u16);
      writer.put_short(tag::BAND_QUANT, wavelet.quant[band] as u16);
      writer.put_short(tag::BAND_ENCODING, sample::BAND_ENCODING_RLE_VLC);
      writer.put_long(tag::BAND_DATA, &vlc::encode_band(wavelet.bands[band].as_slice()));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_params(width: usize, height: usize) -> EncoderParams {
    EncoderParams {
      width: width,
      height: height,
      input_format: PixelFormat::BgraTopDown,
      encoded_format: EncodedFormat::Rgb444,
      ..EncoderParams::default()
    }
  }

  fn gradient_frame(width: usize, height: usize) -> Vec<u8> {
    let mut frame = vec![0u8; width * height * 4];
    for y in 0..height {
      for x in 0..width {
        let at = (y * width + x) * 4;
        frame[at] = (x * 255 / width) as u8;
        frame[at + 1] = (y * 255 / height) as u8;
        frame[at + 2] = ((x + y) % 256) as u8;
        frame[at + 3] = 255;
      }
    }
    return frame;
  }

  #[test]
  fn unprepared_encoder_refuses_frames() {
    let mut encoder = Encoder::new();
    assert_eq!(
      encoder.encode_sample(&[0u8; 16], 8),
      Err(CodecError::EncodingNotStarted)
    );
  }

  #[test]
  fn intra_sample_has_a_parseable_header() {
    let mut encoder = Encoder::new();
    encoder.prepare(test_params(64, 48)).unwrap();
    let frame = gradient_frame(64, 48);
    let data = encoder.encode_sample(&frame, 64 * 4).unwrap().unwrap();

    let header = sample::parse_sample_header(&data).unwrap();
    assert_eq!(header.width, 64);
    assert_eq!(header.height, 48);
    assert_eq!(header.encoded_format, EncodedFormat::Rgb444);
    assert_eq!(header.channel_offsets.len(), 3);
    assert!(header.channel_offsets.iter().all(|&o| o > 0));
    assert_eq!(data.len() % 4, 0);
  }

  #[test]
  fn gop_of_two_buffers_the_first_frame() {
    let mut params = test_params(32, 32);
    params.gop_length = 2;
    let mut encoder = Encoder::new();
    encoder.prepare(params).unwrap();

    let frame = gradient_frame(32, 32);
    assert!(encoder.encode_sample(&frame, 32 * 4).unwrap().is_none());
    let data = encoder.encode_sample(&frame, 32 * 4).unwrap().unwrap();
    let header = sample::parse_sample_header(&data).unwrap();
    assert_eq!(header.sample_type, sample::SAMPLE_TYPE_TEMPORAL_GOP);
  }

  #[test]
  fn flush_emits_a_lone_gop_head_as_intra() {
    let mut params = test_params(32, 32);
    params.gop_length = 2;
    let mut encoder = Encoder::new();
    encoder.prepare(params).unwrap();

    let frame = gradient_frame(32, 32);
    assert!(encoder.encode_sample(&frame, 32 * 4).unwrap().is_none());
    let data = encoder.flush().unwrap().unwrap();
    let header = sample::parse_sample_header(&data).unwrap();
    assert_eq!(header.sample_type, sample::SAMPLE_TYPE_INTRA);
    assert!(encoder.flush().unwrap().is_none());
  }

  #[test]
  fn bayer_input_requires_bayer_coding() {
    let mut params = test_params(32, 32);
    params.input_format = PixelFormat::Byr4;
    let mut encoder = Encoder::new();
    assert_eq!(encoder.prepare(params), Err(CodecError::BadFormat));
  }

  #[test]
  fn subband_numbering_counts_outward() {
    assert_eq!(subband_index(3, 3, 1), 1);
    assert_eq!(subband_index(3, 3, 3), 3);
    assert_eq!(subband_index(3, 2, 1), 4);
    assert_eq!(subband_index(3, 1, 3), 9);
  }
}
