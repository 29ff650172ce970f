// Copyright (c) 2024-2025, The cfwave contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License. If
// the BSD 2 Clause License was not distributed with this source code in the
// LICENSE file, you can obtain it at
// https://opensource.org/license/bsd-2-clause

//! An intra-frame wavelet video codec for mezzanine and mastering use.
//!
//! Frames pass through a 2/6 biorthogonal wavelet (two to three spatial
//! levels, optionally preceded by a two-frame temporal transform),
//! per-subband quantization and a run-length variable-length entropy
//! coder, and come out as self-delimiting samples made of big-endian
//! tag-value tuples. Decoding supports full, half, quarter and
//! thumbnail resolutions; thumbnails need no entropy decoding at all.

pub mod array2d;
pub mod color;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod pack;
pub mod pixel;
pub mod pool;
pub mod quant;
pub mod sample;
pub mod vlc;
pub mod wavelet;

pub use decoder::{extract_thumbnail, thumbnail_info, DecodeReport, Decoder};
pub use encoder::{Encoder, EncoderParams};
pub use error::{CodecError, DecodeWarning, Result};
pub use frame::{Channel, Image};
pub use metadata::{MetadataBlob, MetadataScope, MetadataStore};
pub use pixel::{ColorSpace, DecodedResolution, EncodedFormat, PixelFormat, Quality};
pub use pool::EncoderPool;
pub use sample::{is_sample_key_frame, parse_sample_header, SampleHeader};
