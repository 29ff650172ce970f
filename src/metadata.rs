// Typed metadata tuples carried alongside the coded image. Six scopes:
// a global "both eyes" blob, per-eye blobs, per-eye delta blobs and the
// per-frame local blob. Each blob is a flat sequence of
//   tag: 4-byte FOURCC, type: 1 byte, size: 24-bit big-endian,
//   payload (zero-padded to a 4-byte boundary)
// tuples. The type byte is preserved verbatim so readers can
// reconstruct the original scalar, array or string without a schema.

use byteorder::{BigEndian, WriteBytesExt};
use rand::RngCore;

use crate::error::{CodecError, Result};

// Type codes
pub const TYPE_CHAR: u8 = b'c';
pub const TYPE_LONG: u8 = b'L';
pub const TYPE_SHORT: u8 = b'S';
pub const TYPE_BYTE: u8 = b'B';
pub const TYPE_FLOAT: u8 = b'f';
pub const TYPE_DOUBLE: u8 = b'd';
pub const TYPE_GUID: u8 = b'G';
pub const TYPE_XML: u8 = b'x';
pub const TYPE_LONG_HEX: u8 = b'H';
pub const TYPE_SHORT_HEX: u8 = b'h';
pub const TYPE_TIMECODE: u8 = b'T';

// Well-known tags
pub const TAG_GUID: [u8; 4] = *b"GUID";
pub const TAG_TIMECODE: [u8; 4] = *b"TIMC";
pub const TAG_UNIQUE_FRAME: [u8; 4] = *b"UFRM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataScope {
  Both,
  Left,
  Right,
  DeltaLeft,
  DeltaRight,
  Local,
}

pub const ALL_SCOPES: [MetadataScope; 6] = [
  MetadataScope::Both,
  MetadataScope::Left,
  MetadataScope::Right,
  MetadataScope::DeltaLeft,
  MetadataScope::DeltaRight,
  MetadataScope::Local,
];

impl MetadataScope {
  pub fn fourcc(self) -> &'static [u8; 4] {
    match self {
      MetadataScope::Both => b"BOTH",
      MetadataScope::Left => b"LEFT",
      MetadataScope::Right => b"RGHT",
      MetadataScope::DeltaLeft => b"DLFT",
      MetadataScope::DeltaRight => b"DRGT",
      MetadataScope::Local => b"LOCL",
    }
  }

  pub fn from_fourcc(tag: &[u8]) -> Result<MetadataScope> {
    let scope = match tag {
      b"BOTH" => MetadataScope::Both,
      b"LEFT" => MetadataScope::Left,
      b"RGHT" => MetadataScope::Right,
      b"DLFT" => MetadataScope::DeltaLeft,
      b"DRGT" => MetadataScope::DeltaRight,
      b"LOCL" => MetadataScope::Local,
      _ => return Err(CodecError::BadMetadata),
    };
    return Ok(scope);
  }

  fn index(self) -> usize {
    match self {
      MetadataScope::Both => 0,
      MetadataScope::Left => 1,
      MetadataScope::Right => 2,
      MetadataScope::DeltaLeft => 3,
      MetadataScope::DeltaRight => 4,
      MetadataScope::Local => 5,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
  pub tag: [u8; 4],
  pub type_code: u8,
  pub payload: Vec<u8>,
}

// One ordered blob of tuples; writing an existing tag replaces its
// value in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataBlob {
  items: Vec<MetadataItem>,
}

impl MetadataBlob {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn items(&self) -> &[MetadataItem] {
    &self.items
  }

  pub fn set(&mut self, tag: [u8; 4], type_code: u8, payload: &[u8]) {
    for item in self.items.iter_mut() {
      if item.tag == tag {
        item.type_code = type_code;
        item.payload = payload.to_vec();
        return;
      }
    }
    self.items.push(MetadataItem {
      tag: tag,
      type_code: type_code,
      payload: payload.to_vec(),
    });
  }

  pub fn get(&self, tag: [u8; 4]) -> Option<&MetadataItem> {
    self.items.iter().find(|item| item.tag == tag)
  }

  pub fn serialize(&self) -> Vec<u8> {
    let mut data = Vec::new();
    for item in self.items.iter() {
      assert!(item.payload.len() < (1 << 24));
      data.extend_from_slice(&item.tag);
      data.write_u8(item.type_code).unwrap();
      data.write_u8((item.payload.len() >> 16) as u8).unwrap();
      data.write_u16::<BigEndian>((item.payload.len() & 0xFFFF) as u16).unwrap();
      data.extend_from_slice(&item.payload);
      while data.len() % 4 != 0 {
        data.push(0);
      }
    }
    return data;
  }

  pub fn parse(mut data: &[u8]) -> Result<MetadataBlob> {
    let mut blob = MetadataBlob::default();
    while !data.is_empty() {
      if data.len() < 8 {
        return Err(CodecError::BadMetadata);
      }
      let tag = [data[0], data[1], data[2], data[3]];
      let type_code = data[4];
      let size = ((data[5] as usize) << 16) | ((data[6] as usize) << 8) | data[7] as usize;
      let padded = (size + 3) / 4 * 4;
      if data.len() < 8 + padded {
        return Err(CodecError::BadMetadata);
      }
      blob.set(tag, type_code, &data[8..8 + size]);
      data = &data[8 + padded..];
    }
    return Ok(blob);
  }

  // Overlay `other` on top of this blob: later writes win tag-wise
  pub fn merge_from(&mut self, other: &MetadataBlob) {
    for item in other.items.iter() {
      self.set(item.tag, item.type_code, &item.payload);
    }
  }
}

// Tag-wise difference: tuples of `right` that are absent from or
// different in `left`. This is what rides in the delta scopes.
pub fn eye_delta(left: &MetadataBlob, right: &MetadataBlob) -> MetadataBlob {
  let mut delta = MetadataBlob::default();
  for item in right.items.iter() {
    let same = left
      .get(item.tag)
      .map(|l| l.type_code == item.type_code && l.payload == item.payload)
      .unwrap_or(false);
    if !same {
      delta.set(item.tag, item.type_code, &item.payload);
    }
  }
  return delta;
}

#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
  blobs: [MetadataBlob; 6],
}

impl MetadataStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn scope(&self, scope: MetadataScope) -> &MetadataBlob {
    &self.blobs[scope.index()]
  }

  pub fn scope_mut(&mut self, scope: MetadataScope) -> &mut MetadataBlob {
    &mut self.blobs[scope.index()]
  }

  pub fn set(&mut self, scope: MetadataScope, tag: [u8; 4], type_code: u8, payload: &[u8]) {
    self.scope_mut(scope).set(tag, type_code, payload);
  }

  // The view a consumer sees for this frame: global tuples overridden
  // by per-frame ones
  pub fn merged_view(&self) -> MetadataBlob {
    let mut merged = self.scope(MetadataScope::Both).clone();
    merged.merge_from(self.scope(MetadataScope::Local));
    return merged;
  }

  // Serialize every non-empty scope as (scope FOURCC, blob bytes)
  // chunks for the sample container
  pub fn serialize_scopes(&self) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    for scope in ALL_SCOPES {
      let blob = self.scope(scope);
      if blob.is_empty() {
        continue;
      }
      let mut chunk = Vec::new();
      chunk.extend_from_slice(scope.fourcc());
      chunk.extend_from_slice(&blob.serialize());
      chunks.push(chunk);
    }
    return chunks;
  }

  pub fn parse_scope_chunk(&mut self, chunk: &[u8]) -> Result<()> {
    if chunk.len() < 4 {
      return Err(CodecError::BadMetadata);
    }
    let scope = MetadataScope::from_fourcc(&chunk[..4])?;
    let blob = MetadataBlob::parse(&chunk[4..])?;
    self.scope_mut(scope).merge_from(&blob);
    return Ok(());
  }

  // Fill in the identity tuples the producer did not set: a clip GUID,
  // a timecode derived from the frame number and rate, and a unique
  // frame number. Existing values are left alone.
  pub fn ensure_frame_identity(&mut self, frame_number: u32, frame_rate: u32) {
    if self.scope(MetadataScope::Both).get(TAG_GUID).is_none() {
      let mut guid = [0u8; 16];
      rand::thread_rng().fill_bytes(&mut guid);
      self.set(MetadataScope::Both, TAG_GUID, TYPE_GUID, &guid);
    }

    if self.scope(MetadataScope::Local).get(TAG_TIMECODE).is_none() {
      let rate = frame_rate.max(1);
      let ff = frame_number % rate;
      let seconds = frame_number / rate;
      let timecode = format!(
        "{:02}:{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
        ff
      );
      self.set(MetadataScope::Local, TAG_TIMECODE, TYPE_TIMECODE, timecode.as_bytes());
    }

    if self.scope(MetadataScope::Local).get(TAG_UNIQUE_FRAME).is_none() {
      self.set(
        MetadataScope::Local,
        TAG_UNIQUE_FRAME,
        TYPE_LONG,
        &frame_number.to_be_bytes(),
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blob_serialization_roundtrip() {
    let mut blob = MetadataBlob::default();
    blob.set(*b"CAMN", TYPE_CHAR, b"HERO7");
    blob.set(*b"EXPO", TYPE_FLOAT, &1.5f32.to_be_bytes());
    let parsed = MetadataBlob::parse(&blob.serialize()).unwrap();
    assert_eq!(parsed, blob);
  }

  #[test]
  fn same_tag_overwrites() {
    let mut blob = MetadataBlob::default();
    blob.set(*b"CAMN", TYPE_CHAR, b"one");
    blob.set(*b"CAMN", TYPE_CHAR, b"two");
    assert_eq!(blob.items().len(), 1);
    assert_eq!(blob.get(*b"CAMN").unwrap().payload, b"two");
  }

  #[test]
  fn local_beats_global_in_merged_view() {
    let mut store = MetadataStore::new();
    store.set(MetadataScope::Both, *b"ISOV", TYPE_LONG, &100u32.to_be_bytes());
    store.set(MetadataScope::Local, *b"ISOV", TYPE_LONG, &400u32.to_be_bytes());
    let merged = store.merged_view();
    assert_eq!(merged.get(*b"ISOV").unwrap().payload, 400u32.to_be_bytes());
  }

  #[test]
  fn eye_delta_only_carries_differences() {
    let mut left = MetadataBlob::default();
    left.set(*b"WBAL", TYPE_SHORT, &[0, 1]);
    left.set(*b"EXPO", TYPE_SHORT, &[0, 2]);
    let mut right = MetadataBlob::default();
    right.set(*b"WBAL", TYPE_SHORT, &[0, 1]);
    right.set(*b"EXPO", TYPE_SHORT, &[0, 3]);

    let delta = eye_delta(&left, &right);
    assert_eq!(delta.items().len(), 1);
    assert_eq!(delta.get(*b"EXPO").unwrap().payload, vec![0, 3]);
  }

  #[test]
  fn identity_is_assigned_once() {
    let mut store = MetadataStore::new();
    store.ensure_frame_identity(75, 25);
    let guid = store.scope(MetadataScope::Both).get(TAG_GUID).unwrap().payload.clone();
    assert_eq!(guid.len(), 16);
    let timecode = store.scope(MetadataScope::Local).get(TAG_TIMECODE).unwrap();
    assert_eq!(timecode.payload, b"00:00:03:00");

    // A second call keeps the existing GUID
    store.ensure_frame_identity(76, 25);
    assert_eq!(store.scope(MetadataScope::Both).get(TAG_GUID).unwrap().payload, guid);
  }

  #[test]
  fn scope_chunks_roundtrip() {
    let mut store = MetadataStore::new();
    store.set(MetadataScope::Both, *b"CAMN", TYPE_CHAR, b"HERO7");
    store.set(MetadataScope::Local, *b"TAKE", TYPE_LONG, &7u32.to_be_bytes());

    let mut back = MetadataStore::new();
    for chunk in store.serialize_scopes() {
      back.parse_scope_chunk(&chunk).unwrap();
    }
    assert_eq!(back.scope(MetadataScope::Both).get(*b"CAMN").unwrap().payload, b"HERO7");
    assert_eq!(back.scope(MetadataScope::Local).get(*b"TAKE").unwrap().payload, 7u32.to_be_bytes());
  }

  #[test]
  fn short_blob_is_bad_metadata() {
    assert!(MetadataBlob::parse(&[1, 2, 3]).is_err());
  }
}
