// Copyright (c) 2024-2025, The cfwave contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License. If
// the BSD 2 Clause License was not distributed with this source code in the
// LICENSE file, you can obtain it at
// https://opensource.org/license/bsd-2-clause

// The decoder engine: parse the tag-value stream, entropy-decode the
// subbands, dequantize, invert the wavelet tree and pack the planar
// channels into the caller's pixel format.
//
// Reduced resolutions stop the inverse recursion early: half and
// quarter output the level-1 or level-2 lowpass, and thumbnails read
// only the deepest lowpass, which is stored raw, so no entropy
// decoding happens at all.
//
// Band-level problems never fail the call: the band is zero-filled, a
// warning is recorded on the report, and decoding continues.

use log::{debug, warn};

use crate::array2d::Array2D;
use crate::color;
use crate::error::{CodecError, DecodeWarning, Result};
use crate::frame::{Channel, Image, INTERNAL_PRECISION};
use crate::metadata::MetadataStore;
use crate::pack::{self, PlanarRows};
use crate::pixel::{ColorModel, DecodedResolution, EncodedFormat, PixelFormat};
use crate::quant;
use crate::sample::{self, parse_sample_header, tag, SampleHeader, TagReader, Tuple};
use crate::vlc::{BandError, VlcDecoder};
use crate::wavelet::{self, BandState, Transform, BAND_LL};

// Lowpass bands carry two extra bits from the unnormalized sums
const LOWPASS_PRECISION: usize = INTERNAL_PRECISION + 2;

#[derive(Debug, Clone)]
pub struct DecodeReport {
  pub frame_number: u16,
  pub width: usize,
  pub height: usize,
  pub warnings: Vec<DecodeWarning>,
}

pub struct Decoder {
  vlc: VlcDecoder,
  output_format: PixelFormat,
  resolution: DecodedResolution,
  prepared: bool,
  // Second frame of a temporal pair, produced by the previous
  // decode_sample call
  pending: Option<(Image, SampleHeader)>,
  metadata: MetadataStore,
}

fn stop_level(resolution: DecodedResolution, levels: usize) -> usize {
  match resolution {
    DecodedResolution::Full => 0,
    DecodedResolution::Half => 1.min(levels),
    DecodedResolution::Quarter => 2.min(levels),
    DecodedResolution::Thumbnail => levels,
  }
}

fn output_model_supported(encoded: EncodedFormat, output: PixelFormat) -> bool {
  match encoded {
    EncodedFormat::Bayer => output.color_model() == ColorModel::Bayer,
    _ => output.color_model() != ColorModel::Bayer,
  }
}

impl Decoder {
  pub fn new() -> Decoder {
    Decoder {
      vlc: VlcDecoder::new(),
      output_format: PixelFormat::BgraTopDown,
      resolution: DecodedResolution::Full,
      prepared: false,
      pending: None,
      metadata: MetadataStore::new(),
    }
  }

  // Negotiate output geometry for a sample: validates the requested
  // format against the sample header and returns the actual decoded
  // dimensions for the requested resolution.
  pub fn prepare_to_decode(
    &mut self,
    sample_data: &[u8],
    output_format: PixelFormat,
    resolution: DecodedResolution,
  ) -> Result<(usize, usize)> {
    let header = parse_sample_header(sample_data)?;
    if !output_model_supported(header.encoded_format, output_format) {
      return Err(CodecError::BadFormat);
    }
    self.output_format = output_format;
    self.resolution = resolution;
    self.prepared = true;
    self.pending = None;

    let stop = stop_level(resolution, header.transform_levels);
    return Ok(decoded_dims(&header, stop));
  }

  // Metadata parsed from the most recent sample
  pub fn metadata(&self) -> &MetadataStore {
    &self.metadata
  }

  // Decode one sample into the caller's buffer. For a temporal GOP
  // sample this produces the first frame and caches the second for
  // next_gop_frame. The output buffer is written only after the sample
  // has fully decoded.
  pub fn decode_sample(&mut self, sample_data: &[u8], out: &mut [u8], pitch: usize) -> Result<DecodeReport> {
    if !self.prepared {
      return Err(CodecError::InvalidArgument("decoder has not been prepared"));
    }
    self.pending = None;

    let header = parse_sample_header(sample_data)?;
    if !output_model_supported(header.encoded_format, self.output_format) {
      return Err(CodecError::BadFormat);
    }
    let stop = stop_level(self.resolution, header.transform_levels);
    let mut warnings = Vec::new();

    // Walk the tuple stream: the low (or only) frame's channel
    // sections, then any temporal payload and metadata
    let mut reader = TagReader::new(sample_data);
    skip_header(&mut reader, &mut warnings)?;

    let (mut transforms, mut terminator) =
      decode_frame_section(&mut reader, &header, &self.vlc, stop, &mut warnings)?;
    normalize_band_states(&mut transforms, stop);

    let mut temporal_payload: Vec<u8> = Vec::new();
    let mut metadata_chunks: Vec<Vec<u8>> = Vec::new();
    let mut saw_end = false;
    loop {
      let tuple = match terminator.take() {
        Some(t) => Some(t),
        None => reader.next()?,
      };
      let tuple = match tuple {
        Some(t) => t,
        None => break,
      };
      match tuple.tag {
        tag::TEMPORAL_DATA => temporal_payload.extend_from_slice(tuple.payload.unwrap()),
        tag::SAMPLE_METADATA => metadata_chunks.push(tuple.payload.unwrap().to_vec()),
        tag::SAMPLE_END => {
          saw_end = true;
          break;
        }
        other => {
          debug!("skipping unknown trailing tag {:#06x}", other);
          warnings.push(DecodeWarning::UnknownTagSkipped { tag: other });
        }
      }
    }
    if !saw_end {
      return Err(CodecError::BadSample("sample ends without SAMPLE_END"));
    }

    // Metadata problems never block image decode
    self.metadata = MetadataStore::new();
    for chunk in metadata_chunks {
      if self.metadata.parse_scope_chunk(&chunk).is_err() {
        warn!("ignoring unparseable metadata chunk");
        warnings.push(DecodeWarning::MetadataIgnored);
      }
    }

    let low_image = reconstruct_image(&transforms, stop);

    let output = if header.sample_type == sample::SAMPLE_TYPE_TEMPORAL_GOP && !temporal_payload.is_empty() {
      let mut inner = TagReader::new(&temporal_payload);
      let (mut high_transforms, _) =
        decode_frame_section(&mut inner, &header, &self.vlc, stop, &mut warnings)?;
      normalize_band_states(&mut high_transforms, stop);
      let high_image = reconstruct_image(&high_transforms, stop);

      let mut f0 = Image { channels: Vec::new() };
      let mut f1 = Image { channels: Vec::new() };
      for (low_ch, high_ch) in low_image.channels.iter().zip(high_image.channels.iter()) {
        let (a, b) = wavelet::temporal_inverse(&low_ch.data, &high_ch.data);
        f0.channels.push(Channel {
          width: low_ch.width,
          height: low_ch.height,
          precision: low_ch.precision,
          data: a,
        });
        f1.channels.push(Channel {
          width: low_ch.width,
          height: low_ch.height,
          precision: low_ch.precision,
          data: b,
        });
      }
      self.pending = Some((f1, header.clone()));
      f0
    } else {
      low_image
    };

    let (width, height) = decoded_dims(&header, stop);
    self.export_image(&output, &header, out, pitch)?;
    return Ok(DecodeReport {
      frame_number: header.frame_number,
      width: width,
      height: height,
      warnings: warnings,
    });
  }

  // The cached second frame of the last temporal GOP, if any
  pub fn next_gop_frame(&mut self, out: &mut [u8], pitch: usize) -> Result<Option<DecodeReport>> {
    let (image, header) = match self.pending.take() {
      Some(pair) => pair,
      None => return Ok(None),
    };
    let stop = stop_level(self.resolution, header.transform_levels);
    let (width, height) = decoded_dims(&header, stop);
    self.export_image(&image, &header, out, pitch)?;
    return Ok(Some(DecodeReport {
      frame_number: header.frame_number.wrapping_add(1),
      width: width,
      height: height,
      warnings: Vec::new(),
    }));
  }

  // Pack planar channels into the output pixel format, converting the
  // color model on the way when it differs from the coded one
  fn export_image(&self, image: &Image, header: &SampleHeader, out: &mut [u8], pitch: usize) -> Result<()> {
    let format = self.output_format;
    let model = format.color_model();
    let luma = &image.channels[0];

    // Nominal output frame size; Bayer quad planes pack two sensor
    // rows per buffer row
    let (width, out_rows) = if header.encoded_format == EncodedFormat::Bayer {
      (luma.width * 2, luma.height)
    } else {
      (luma.width, luma.height)
    };

    let row_bytes = format.row_pitch(width);
    if pitch < row_bytes {
      return Err(CodecError::InvalidArgument("row pitch smaller than a packed row"));
    }
    let needed = pitch * (out_rows - 1) + row_bytes;
    if out.len() < needed {
      return Err(CodecError::DecodeBufferSize { needed: needed, got: out.len() });
    }

    let chroma_width = (width + 1) / 2;
    let mut rows = PlanarRows::for_format(format, width);
    let mut full_a = vec![0u16; width];
    let mut full_b = vec![0u16; width];
    let mut full_c = vec![0u16; width];
    let mut half_a = vec![0u16; chroma_width];
    let mut half_b = vec![0u16; chroma_width];

    for row in 0..out_rows {
      match (header.encoded_format, model) {
        (EncodedFormat::Bayer, ColorModel::Bayer) => {
          for ch in 0..4 {
            widen_row(&image.channels[ch], row, &mut rows.planes[ch]);
          }
        }

        (EncodedFormat::Rgb444 | EncodedFormat::Rgba4444, ColorModel::Rgb) => {
          for ch in 0..3 {
            widen_row(&image.channels[ch], row, &mut rows.planes[ch]);
          }
          if format.has_alpha() {
            fill_alpha_row(image, row, &mut rows.planes[3]);
          }
        }

        (EncodedFormat::Rgb444 | EncodedFormat::Rgba4444, ColorModel::Yuv422) => {
          widen_row(&image.channels[0], row, &mut full_a);
          widen_row(&image.channels[1], row, &mut full_b);
          widen_row(&image.channels[2], row, &mut full_c);
          let (mut y, mut u, mut v) = (vec![0u16; width], vec![0u16; width], vec![0u16; width]);
          color::rgb_to_yuv_row(header.color_space, &full_a, &full_b, &full_c, &mut y, &mut u, &mut v);
          rows.planes[0][..width].copy_from_slice(&y);
          color::downsample_chroma_row(&u, &mut half_a);
          color::downsample_chroma_row(&v, &mut half_b);
          rows.planes[1][..chroma_width].copy_from_slice(&half_a);
          rows.planes[2][..chroma_width].copy_from_slice(&half_b);
        }

        (EncodedFormat::Rgb444 | EncodedFormat::Rgba4444, ColorModel::Yuv444) => {
          widen_row(&image.channels[0], row, &mut full_a);
          widen_row(&image.channels[1], row, &mut full_b);
          widen_row(&image.channels[2], row, &mut full_c);
          let (mut y, mut u, mut v) = (vec![0u16; width], vec![0u16; width], vec![0u16; width]);
          color::rgb_to_yuv_row(header.color_space, &full_a, &full_b, &full_c, &mut y, &mut u, &mut v);
          rows.planes[0][..width].copy_from_slice(&y);
          rows.planes[1][..width].copy_from_slice(&u);
          rows.planes[2][..width].copy_from_slice(&v);
          fill_alpha_row(image, row, &mut rows.planes[3]);
        }

        (EncodedFormat::Yuv422 | EncodedFormat::Yuva4444, ColorModel::Yuv422) => {
          widen_row(&image.channels[0], row, &mut rows.planes[0]);
          if header.encoded_format == EncodedFormat::Yuv422 {
            widen_row(&image.channels[1], row, &mut rows.planes[1]);
            widen_row(&image.channels[2], row, &mut rows.planes[2]);
          } else {
            widen_row(&image.channels[1], row, &mut full_b);
            widen_row(&image.channels[2], row, &mut full_c);
            color::downsample_chroma_row(&full_b, &mut half_a);
            color::downsample_chroma_row(&full_c, &mut half_b);
            rows.planes[1][..chroma_width].copy_from_slice(&half_a);
            rows.planes[2][..chroma_width].copy_from_slice(&half_b);
          }
        }

        (EncodedFormat::Yuv422, ColorModel::Yuv444) => {
          widen_row(&image.channels[0], row, &mut rows.planes[0]);
          widen_row(&image.channels[1], row, &mut half_a);
          widen_row(&image.channels[2], row, &mut half_b);
          color::upsample_chroma_row(&half_a, &mut rows.planes[1][..width]);
          color::upsample_chroma_row(&half_b, &mut rows.planes[2][..width]);
          fill_alpha_row(image, row, &mut rows.planes[3]);
        }

        (EncodedFormat::Yuva4444, ColorModel::Yuv444) => {
          for ch in 0..4 {
            widen_row(&image.channels[ch], row, &mut rows.planes[ch]);
          }
        }

        (EncodedFormat::Yuv422, ColorModel::Rgb) => {
          widen_row(&image.channels[0], row, &mut full_a);
          widen_row(&image.channels[1], row, &mut half_a);
          widen_row(&image.channels[2], row, &mut half_b);
          color::upsample_chroma_row(&half_a, &mut full_b);
          color::upsample_chroma_row(&half_b, &mut full_c);
          let (mut r, mut g, mut b) = (vec![0u16; width], vec![0u16; width], vec![0u16; width]);
          color::yuv_to_rgb_row(header.color_space, &full_a, &full_b, &full_c, &mut r, &mut g, &mut b);
          rows.planes[0][..width].copy_from_slice(&r);
          rows.planes[1][..width].copy_from_slice(&g);
          rows.planes[2][..width].copy_from_slice(&b);
          if format.has_alpha() {
            for value in rows.planes[3].iter_mut() {
              *value = 0xFFFF;
            }
          }
        }

        (EncodedFormat::Yuva4444, ColorModel::Rgb) => {
          widen_row(&image.channels[0], row, &mut full_a);
          widen_row(&image.channels[1], row, &mut full_b);
          widen_row(&image.channels[2], row, &mut full_c);
          let (mut r, mut g, mut b) = (vec![0u16; width], vec![0u16; width], vec![0u16; width]);
          color::yuv_to_rgb_row(header.color_space, &full_a, &full_b, &full_c, &mut r, &mut g, &mut b);
          rows.planes[0][..width].copy_from_slice(&r);
          rows.planes[1][..width].copy_from_slice(&g);
          rows.planes[2][..width].copy_from_slice(&b);
          if format.has_alpha() {
            fill_alpha_row(image, row, &mut rows.planes[3]);
          }
        }

        _ => return Err(CodecError::BadFormat),
      }

      let dst_row = if format.bottom_up() { out_rows - 1 - row } else { row };
      let dst = &mut out[dst_row * pitch..dst_row * pitch + row_bytes];
      pack::pack_row(format, &rows, width, dst)?;
    }
    return Ok(());
  }
}

// Advance a fresh reader past the header tags, leaving it at the first
// CHANNEL tuple. Unknown tags on the way are skipped and reported.
fn skip_header(reader: &mut TagReader, warnings: &mut Vec<DecodeWarning>) -> Result<()> {
  loop {
    let pos = reader.position();
    match reader.next()? {
      None => return Err(CodecError::BadSample("sample ends without SAMPLE_END")),
      Some(t) if t.tag == tag::CHANNEL => {
        reader.seek(pos)?;
        return Ok(());
      }
      Some(t) if t.tag == tag::SAMPLE_END => {
        return Err(CodecError::BadSample("sample has no channel data"));
      }
      Some(t) => {
        if !sample::is_known_tag(t.tag) {
          debug!("skipping unknown header tag {:#06x}", t.tag);
          warnings.push(DecodeWarning::UnknownTagSkipped { tag: t.tag });
        }
      }
    }
  }
}

struct BandDescriptor {
  subband: usize,
  width: usize,
  height: usize,
  quant: i32,
  encoding: u16,
}

// Parse channel sections from a tuple stream until a non-section tag
// or the end of the stream, decoding every band at or below the
// requested resolution. Returns the transforms plus the tuple that
// terminated the section, if any.
fn decode_frame_section<'a>(
  reader: &mut TagReader<'a>,
  header: &SampleHeader,
  vlc: &VlcDecoder,
  stop: usize,
  warnings: &mut Vec<DecodeWarning>,
) -> Result<(Vec<Transform>, Option<Tuple<'a>>)> {
  let levels = header.transform_levels;
  let mut transforms: Vec<Transform> = (0..header.channel_count)
    .map(|ch| {
      let (w, h) = header.encoded_format.channel_dims(ch, header.width, header.height);
      Transform::new(w, h, levels)
    })
    .collect();

  let mut channel: Option<usize> = None;
  let mut descriptor: Option<BandDescriptor> = None;
  let mut payload: Vec<u8> = Vec::new();

  macro_rules! finalize_band {
    () => {
      if let (Some(ch), Some(desc)) = (channel, descriptor.take()) {
        if !payload.is_empty() {
          apply_band(&mut transforms[ch], ch, &desc, &payload, levels, stop, vlc, warnings)?;
        }
      }
      payload.clear();
    };
  }

  loop {
    let tuple = match reader.next()? {
      Some(t) => t,
      None => {
        finalize_band!();
        return Ok((transforms, None));
      }
    };

    match tuple.tag {
      tag::CHANNEL => {
        finalize_band!();
        let index = tuple.value as usize;
        if index >= header.channel_count {
          return Err(CodecError::BadSample("channel index out of range"));
        }
        channel = Some(index);
      }
      tag::SUBBAND => {
        finalize_band!();
        descriptor = Some(BandDescriptor {
          subband: tuple.value as usize,
          width: 0,
          height: 0,
          quant: 1,
          encoding: sample::BAND_ENCODING_RLE_VLC,
        });
      }
      tag::BAND_WIDTH => {
        if let Some(desc) = descriptor.as_mut() {
          desc.width = tuple.value as usize;
        }
      }
      tag::BAND_HEIGHT => {
        if let Some(desc) = descriptor.as_mut() {
          desc.height = tuple.value as usize;
        }
      }
      tag::BAND_QUANT => {
        if let Some(desc) = descriptor.as_mut() {
          desc.quant = (tuple.value as i32).max(1);
        }
      }
      tag::BAND_ENCODING => {
        if let Some(desc) = descriptor.as_mut() {
          desc.encoding = tuple.value;
        }
      }
      tag::LOWPASS_DATA | tag::BAND_DATA => {
        if channel.is_none() || descriptor.is_none() {
          return Err(CodecError::BadSample("band data outside a subband"));
        }
        payload.extend_from_slice(tuple.payload.unwrap());
      }
      tag::TEMPORAL_DATA | tag::SAMPLE_METADATA | tag::SAMPLE_END => {
        finalize_band!();
        return Ok((transforms, Some(tuple)));
      }
      other => {
        debug!("skipping unknown tag {:#06x} in channel section", other);
        warnings.push(DecodeWarning::UnknownTagSkipped { tag: other });
      }
    }
  }
}

// Place one parsed band into the transform tree, entropy-decoding and
// dequantizing as needed
#[allow(clippy::too_many_arguments)]
fn apply_band(
  transform: &mut Transform,
  channel: usize,
  desc: &BandDescriptor,
  payload: &[u8],
  levels: usize,
  stop: usize,
  vlc: &VlcDecoder,
  warnings: &mut Vec<DecodeWarning>,
) -> Result<()> {
  if desc.subband == 0 {
    // The deepest lowpass, stored raw
    let wavelet = &mut transform.wavelets[levels - 1];
    if desc.width != wavelet.width || desc.height != wavelet.height {
      return Err(CodecError::BadSample("lowpass band dimensions mismatch"));
    }
    if desc.encoding != sample::BAND_ENCODING_RAW {
      return Err(CodecError::BadSample("lowpass band must be raw"));
    }
    let count = desc.width * desc.height;
    if payload.len() < count * 2 {
      return Err(CodecError::BadSample("lowpass band payload too short"));
    }
    let band = &mut wavelet.bands[BAND_LL];
    let slice = band.as_mut_slice();
    for i in 0..count {
      slice[i] = i16::from_be_bytes([payload[2 * i], payload[2 * i + 1]]);
    }
    wavelet.state[BAND_LL] = BandState::Decoded;
    return Ok(());
  }

  if desc.subband > 3 * levels {
    warnings.push(DecodeWarning::UnknownTagSkipped { tag: tag::SUBBAND });
    return Ok(());
  }
  let level = levels - (desc.subband - 1) / 3;
  let band = 1 + (desc.subband - 1) % 3;

  // Bands finer than the requested resolution are never touched
  if level <= stop {
    return Ok(());
  }

  let wavelet = &mut transform.wavelets[level - 1];
  if desc.width != wavelet.width || desc.height != wavelet.height {
    return Err(CodecError::BadSample("highpass band dimensions mismatch"));
  }

  wavelet.state[band] = BandState::Started;
  let buffer = &mut wavelet.bands[band];
  buffer.fill(0);
  let outcome = vlc.decode_band(payload, buffer.as_mut_slice());
  match outcome {
    Ok(()) => {
      quant::dequantize_band(buffer, desc.quant);
    }
    Err(error) => {
      // Recover by leaving the band empty
      buffer.fill(0);
      warn!(
        "zero-filling channel {} subband {} after {:?}",
        channel, desc.subband, error
      );
      warnings.push(match error {
        BandError::EntropyCorrupt => DecodeWarning::EntropyCorrupt { channel: channel, subband: desc.subband },
        BandError::BandUnderflow => DecodeWarning::BandUnderflow { channel: channel, subband: desc.subband },
        BandError::BandOverflow => DecodeWarning::BandOverflow { channel: channel, subband: desc.subband },
      });
    }
  }
  wavelet.state[band] = BandState::Decoded;
  return Ok(());
}

// A band the sample never delivered decodes as silence: leave its
// zeros in place and let the inverse transform run
fn normalize_band_states(transforms: &mut [Transform], stop: usize) {
  for transform in transforms.iter_mut() {
    for wavelet in transform.wavelets.iter_mut() {
      if wavelet.level <= stop {
        continue;
      }
      for band in 1..4 {
        if wavelet.state[band] == BandState::Empty {
          wavelet.state[band] = BandState::Decoded;
        }
      }
    }
  }
}

// Invert the wavelet trees down to the requested level and wrap the
// planes as an image
fn reconstruct_image(transforms: &[Transform], stop: usize) -> Image {
  let mut channels = Vec::with_capacity(transforms.len());
  for transform in transforms.iter() {
    let plane = wavelet::reconstruct_channel(transform, stop);
    let precision = if stop == 0 { INTERNAL_PRECISION } else { LOWPASS_PRECISION };
    channels.push(Channel {
      width: plane.cols(),
      height: plane.rows(),
      precision: precision,
      data: plane,
    });
  }
  return Image { channels: channels };
}

// Scale one plane row back to 16-bit components
fn widen_row(channel: &Channel, row: usize, out: &mut [u16]) {
  let shift = 16 - channel.precision;
  let max = ((1i32 << channel.precision) - 1) as i32;
  let line = &channel.data[row.min(channel.height - 1)];
  for (i, slot) in out.iter_mut().enumerate() {
    let v = line[i.min(channel.width - 1)] as i32;
    *slot = (v.clamp(0, max) << shift) as u16;
  }
}

fn fill_alpha_row(image: &Image, row: usize, out: &mut [u16]) {
  if image.channels.len() > 3 {
    widen_row(&image.channels[3], row, out);
  } else {
    for value in out.iter_mut() {
      *value = 0xFFFF;
    }
  }
}

fn decoded_dims(header: &SampleHeader, stop: usize) -> (usize, usize) {
  let scale = 1usize << stop;
  let (mut w, mut h) = (header.width, header.height);
  w = (w + scale - 1) / scale;
  h = (h + scale - 1) / scale;
  return (w, h);
}

// Dimensions of the thumbnail stored in a sample, without decoding it
pub fn thumbnail_info(sample_data: &[u8]) -> Result<(usize, usize)> {
  let header = parse_sample_header(sample_data)?;
  let stop = header.transform_levels;
  return Ok(decoded_dims(&header, stop));
}

// Extract the deepest lowpass of every channel straight from the
// channel-offset tags. No entropy decoding, no inverse transform; the
// samples come out at lowpass precision.
pub fn extract_thumbnail(sample_data: &[u8]) -> Result<Image> {
  let header = parse_sample_header(sample_data)?;
  if header.channel_offsets.len() != header.channel_count {
    return Err(CodecError::BadSample("missing channel offset table"));
  }

  let mut channels = Vec::with_capacity(header.channel_count);
  for &offset in header.channel_offsets.iter() {
    let mut reader = TagReader::new(sample_data);
    reader.seek(offset as usize)?;

    let mut width = 0usize;
    let mut height = 0usize;
    let mut payload: Vec<u8> = Vec::new();
    loop {
      let tuple = match reader.next()? {
        Some(t) => t,
        None => break,
      };
      match tuple.tag {
        tag::CHANNEL => {
          // Each offset points at the CHANNEL tuple that opens the
          // block; a second one means we ran into the next channel
          if !payload.is_empty() {
            break;
          }
        }
        tag::SUBBAND => {
          // The next subband begins right after the lowpass tuples
          if tuple.value != 0 {
            break;
          }
        }
        tag::BAND_WIDTH => width = tuple.value as usize,
        tag::BAND_HEIGHT => height = tuple.value as usize,
        tag::BAND_QUANT | tag::BAND_ENCODING => {}
        tag::LOWPASS_DATA => payload.extend_from_slice(tuple.payload.unwrap()),
        _ => break,
      }
    }

    if width == 0 || height == 0 || payload.len() < width * height * 2 {
      return Err(CodecError::BadSample("truncated thumbnail lowpass"));
    }
    let mut data = Array2D::<i16>::zeroed(height, width);
    let slice = data.as_mut_slice();
    for i in 0..width * height {
      slice[i] = i16::from_be_bytes([payload[2 * i], payload[2 * i + 1]]);
    }
    channels.push(Channel {
      width: width,
      height: height,
      precision: LOWPASS_PRECISION,
      data: data,
    });
  }
  return Ok(Image { channels: channels });
}
