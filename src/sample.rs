// The sample container: a flat sequence of 32-bit tag-value tuples,
// big-endian on the wire. A short tuple is a 16-bit tag plus a 16-bit
// value; a tag with the high bit set opens a long tuple whose value
// field counts payload words (payload bytes / 4, zero-padded).
//
// Samples carry no outer length; parsing advances until SAMPLE_END.
// Unknown tags are skippable by construction.

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{CodecError, Result};
use crate::pixel::{ColorSpace, EncodedFormat, Quality};

pub const LONG_FORM: u16 = 0x8000;

// Closed tag set. Every tag the encoder writes is listed here; decoders
// skip anything else by the long-form rule.
pub mod tag {
  pub const SAMPLE_TYPE: u16 = 0x0001;
  pub const FRAME_WIDTH: u16 = 0x0002;
  pub const FRAME_HEIGHT: u16 = 0x0003;
  pub const DISPLAY_WIDTH: u16 = 0x0004;
  pub const DISPLAY_HEIGHT: u16 = 0x0005;
  pub const ENCODED_FORMAT: u16 = 0x0006;
  pub const COLOR_SPACE: u16 = 0x0007;
  pub const CHANNEL_COUNT: u16 = 0x0008;
  pub const PRECISION: u16 = 0x0009;
  pub const QUALITY: u16 = 0x000A;
  pub const GOP_LENGTH: u16 = 0x000B;
  pub const SAMPLE_FLAGS: u16 = 0x000C;
  pub const TRANSFORM_LEVELS: u16 = 0x000D;
  pub const FRAME_NUMBER: u16 = 0x000E;

  pub const CHANNEL: u16 = 0x0010;
  pub const SUBBAND: u16 = 0x0011;
  pub const BAND_WIDTH: u16 = 0x0012;
  pub const BAND_HEIGHT: u16 = 0x0013;
  pub const BAND_QUANT: u16 = 0x0014;
  pub const BAND_ENCODING: u16 = 0x0015;

  pub const SAMPLE_END: u16 = 0x0020;

  pub const LOWPASS_DATA: u16 = 0x8021;
  pub const BAND_DATA: u16 = 0x8022;
  pub const TEMPORAL_DATA: u16 = 0x8023;
  pub const CHANNEL_OFFSETS: u16 = 0x8030;
  pub const SAMPLE_METADATA: u16 = 0x8040;
}

// Sample type values
pub const SAMPLE_TYPE_INTRA: u16 = 0;
pub const SAMPLE_TYPE_TEMPORAL_GOP: u16 = 1;

// SAMPLE_FLAGS bits
pub const FLAG_PROGRESSIVE: u16 = 0x0001;
pub const FLAG_CHROMA_FULL_RES: u16 = 0x0002;

// Band encoding methods
pub const BAND_ENCODING_RAW: u16 = 0;
pub const BAND_ENCODING_RLE_VLC: u16 = 1;

// Largest payload a single long tuple can carry (the word count must
// fit the 16-bit value field). Bigger payloads are split into
// consecutive tuples with the same tag.
pub const MAX_TUPLE_PAYLOAD: usize = 0xFFFF * 4;

pub struct SampleWriter {
  data: Vec<u8>,
}

impl SampleWriter {
  pub fn new() -> Self {
    Self { data: Vec::new() }
  }

  pub fn position(&self) -> usize {
    self.data.len()
  }

  pub fn put_short(&mut self, tag: u16, value: u16) {
    assert!(tag & LONG_FORM == 0);
    self.data.write_u16::<BigEndian>(tag).unwrap();
    self.data.write_u16::<BigEndian>(value).unwrap();
  }

  // Write one long tuple. Payloads larger than MAX_TUPLE_PAYLOAD are
  // split into consecutive tuples; every chunk but the last is an exact
  // multiple of four bytes, so concatenating the payloads on read
  // reconstructs the original byte stream.
  pub fn put_long(&mut self, tag: u16, payload: &[u8]) {
    assert!(tag & LONG_FORM != 0);

    let mut rest = payload;
    loop {
      let chunk_len = rest.len().min(MAX_TUPLE_PAYLOAD);
      let chunk = &rest[..chunk_len];
      rest = &rest[chunk_len..];

      let words = (chunk_len + 3) / 4;
      self.data.write_u16::<BigEndian>(tag).unwrap();
      self.data.write_u16::<BigEndian>(words as u16).unwrap();
      self.data.extend_from_slice(chunk);
      for _ in chunk_len..words * 4 {
        self.data.push(0);
      }

      if rest.is_empty() {
        break;
      }
    }
  }

  // Reserve a long tuple of `count` 32-bit slots to be patched later;
  // returns the byte position of the payload
  pub fn mark_offsets(&mut self, tag: u16, count: usize) -> usize {
    assert!(tag & LONG_FORM != 0);
    assert!(count <= 0xFFFF);
    self.data.write_u16::<BigEndian>(tag).unwrap();
    self.data.write_u16::<BigEndian>(count as u16).unwrap();
    let payload_pos = self.data.len();
    for _ in 0..count {
      self.data.write_u32::<BigEndian>(0).unwrap();
    }
    return payload_pos;
  }

  pub fn patch_u32(&mut self, pos: usize, value: u32) {
    assert!(self.data.len() >= pos + 4);
    self.data[pos] = ((value >> 24) & 0xFF) as u8;
    self.data[pos + 1] = ((value >> 16) & 0xFF) as u8;
    self.data[pos + 2] = ((value >> 8) & 0xFF) as u8;
    self.data[pos + 3] = (value & 0xFF) as u8;
  }

  pub fn finish(mut self) -> Vec<u8> {
    self.put_short(tag::SAMPLE_END, 0);
    return self.data;
  }

  // The raw tuple stream without a SAMPLE_END terminator, for sections
  // nested inside a long tuple
  pub fn into_bytes(self) -> Vec<u8> {
    return self.data;
  }
}

// One parsed tuple. Long tuples borrow their payload from the sample.
#[derive(Debug, Clone, Copy)]
pub struct Tuple<'a> {
  pub tag: u16,
  pub value: u16,
  pub payload: Option<&'a [u8]>,
}

impl<'a> Tuple<'a> {
  pub fn is_long(&self) -> bool {
    self.tag & LONG_FORM != 0
  }
}

pub struct TagReader<'a> {
  data: &'a [u8],
  pos: usize,
}

impl<'a> TagReader<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self { data: data, pos: 0 }
  }

  pub fn position(&self) -> usize {
    self.pos
  }

  pub fn seek(&mut self, pos: usize) -> Result<()> {
    if pos > self.data.len() || pos % 4 != 0 {
      return Err(CodecError::BadSample("seek outside sample"));
    }
    self.pos = pos;
    return Ok(());
  }

  // Next tuple, or None at the physical end of the buffer. A sample
  // that ends without SAMPLE_END is truncated; callers treat None from
  // this method accordingly.
  pub fn next(&mut self) -> Result<Option<Tuple<'a>>> {
    if self.pos == self.data.len() {
      return Ok(None);
    }
    if self.data.len() - self.pos < 4 {
      return Err(CodecError::BadSample("sample truncated mid-tuple"));
    }

    let tag = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
    let value = u16::from_be_bytes([self.data[self.pos + 2], self.data[self.pos + 3]]);
    self.pos += 4;

    if tag & LONG_FORM == 0 {
      return Ok(Some(Tuple {
        tag: tag,
        value: value,
        payload: None,
      }));
    }

    let payload_len = value as usize * 4;
    if self.data.len() - self.pos < payload_len {
      return Err(CodecError::BadSample("sample truncated mid-payload"));
    }
    let payload = &self.data[self.pos..self.pos + payload_len];
    self.pos += payload_len;
    return Ok(Some(Tuple {
      tag: tag,
      value: value,
      payload: Some(payload),
    }));
  }
}

// Everything a reader can learn about a sample without touching the
// entropy-coded payloads
#[derive(Debug, Clone)]
pub struct SampleHeader {
  pub sample_type: u16,
  pub width: usize,
  pub height: usize,
  pub display_width: usize,
  pub display_height: usize,
  pub encoded_format: EncodedFormat,
  pub color_space: ColorSpace,
  pub channel_count: usize,
  pub precision: usize,
  pub quality: Quality,
  pub gop_length: usize,
  pub progressive: bool,
  pub chroma_full_res: bool,
  pub transform_levels: usize,
  pub frame_number: u16,
  // Byte offsets of each channel's deepest-lowpass SUBBAND tuple
  pub channel_offsets: Vec<u32>,
}

// Parse the header tags of a sample. Stops at the first CHANNEL tag;
// nothing past it is touched, so this is safe on partially corrupt
// samples and cheap enough for probing.
pub fn parse_sample_header(data: &[u8]) -> Result<SampleHeader> {
  if data.is_empty() {
    return Err(CodecError::BadSample("empty sample"));
  }

  let mut reader = TagReader::new(data);
  let mut sample_type = None;
  let mut width = None;
  let mut height = None;
  let mut display_width = None;
  let mut display_height = None;
  let mut encoded_format = None;
  let mut color_space = ColorSpace::default();
  let mut channel_count = None;
  let mut precision = 12usize;
  let mut quality = Quality::default();
  let mut gop_length = 1usize;
  let mut flags = FLAG_PROGRESSIVE;
  let mut transform_levels = None;
  let mut frame_number = 0u16;
  let mut channel_offsets = Vec::new();

  loop {
    let tuple = match reader.next()? {
      Some(t) => t,
      None => return Err(CodecError::BadSample("sample ends without SAMPLE_END")),
    };
    match tuple.tag {
      tag::SAMPLE_TYPE => sample_type = Some(tuple.value),
      tag::FRAME_WIDTH => width = Some(tuple.value as usize),
      tag::FRAME_HEIGHT => height = Some(tuple.value as usize),
      tag::DISPLAY_WIDTH => display_width = Some(tuple.value as usize),
      tag::DISPLAY_HEIGHT => display_height = Some(tuple.value as usize),
      tag::ENCODED_FORMAT => encoded_format = Some(EncodedFormat::from_tag(tuple.value)?),
      tag::COLOR_SPACE => color_space = ColorSpace::from_tag(tuple.value)?,
      tag::CHANNEL_COUNT => channel_count = Some(tuple.value as usize),
      tag::PRECISION => precision = tuple.value as usize,
      tag::QUALITY => quality = Quality::from_tag(tuple.value)?,
      tag::GOP_LENGTH => gop_length = tuple.value as usize,
      tag::SAMPLE_FLAGS => flags = tuple.value,
      tag::TRANSFORM_LEVELS => transform_levels = Some(tuple.value as usize),
      tag::FRAME_NUMBER => frame_number = tuple.value,
      tag::CHANNEL_OFFSETS => {
        let payload = tuple.payload.unwrap();
        channel_offsets = payload
          .chunks_exact(4)
          .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
          .collect();
      }
      tag::CHANNEL | tag::SAMPLE_END => break,
      // Unknown tags in the header region are skipped like anywhere else
      _ => {}
    }
  }

  let width = width.ok_or(CodecError::BadSample("missing frame width"))?;
  let height = height.ok_or(CodecError::BadSample("missing frame height"))?;
  let encoded_format = encoded_format.ok_or(CodecError::BadSample("missing encoded format"))?;
  let channel_count = channel_count.ok_or(CodecError::BadSample("missing channel count"))?;
  let transform_levels = transform_levels.ok_or(CodecError::BadSample("missing transform levels"))?;

  if width == 0 || height == 0 {
    return Err(CodecError::BadSample("zero frame dimensions"));
  }
  if channel_count != encoded_format.channel_count() {
    return Err(CodecError::BadSample("channel count does not match format"));
  }
  if transform_levels == 0 || transform_levels > 3 {
    return Err(CodecError::BadSample("bad transform level count"));
  }

  return Ok(SampleHeader {
    sample_type: sample_type.unwrap_or(SAMPLE_TYPE_INTRA),
    width: width,
    height: height,
    display_width: display_width.unwrap_or(width),
    display_height: display_height.unwrap_or(height),
    encoded_format: encoded_format,
    color_space: color_space,
    channel_count: channel_count,
    precision: precision,
    quality: quality,
    gop_length: gop_length.max(1),
    progressive: flags & FLAG_PROGRESSIVE != 0,
    chroma_full_res: flags & FLAG_CHROMA_FULL_RES != 0,
    transform_levels: transform_levels,
    frame_number: frame_number,
    channel_offsets: channel_offsets,
  });
}

// Membership in the closed tag set the encoder writes
pub fn is_known_tag(t: u16) -> bool {
  matches!(
    t,
    tag::SAMPLE_TYPE
      | tag::FRAME_WIDTH
      | tag::FRAME_HEIGHT
      | tag::DISPLAY_WIDTH
      | tag::DISPLAY_HEIGHT
      | tag::ENCODED_FORMAT
      | tag::COLOR_SPACE
      | tag::CHANNEL_COUNT
      | tag::PRECISION
      | tag::QUALITY
      | tag::GOP_LENGTH
      | tag::SAMPLE_FLAGS
      | tag::TRANSFORM_LEVELS
      | tag::FRAME_NUMBER
      | tag::CHANNEL
      | tag::SUBBAND
      | tag::BAND_WIDTH
      | tag::BAND_HEIGHT
      | tag::BAND_QUANT
      | tag::BAND_ENCODING
      | tag::SAMPLE_END
      | tag::LOWPASS_DATA
      | tag::BAND_DATA
      | tag::TEMPORAL_DATA
      | tag::CHANNEL_OFFSETS
      | tag::SAMPLE_METADATA
  )
}

// True if the sample parses and starts a group of pictures. Every
// intra sample and every temporal GOP head qualifies.
pub fn is_sample_key_frame(data: &[u8]) -> bool {
  match parse_sample_header(data) {
    Ok(header) => {
      header.sample_type == SAMPLE_TYPE_INTRA || header.sample_type == SAMPLE_TYPE_TEMPORAL_GOP
    }
    Err(_) => false,
  }
}
