use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

// Error kinds surfaced by the codec core. Band-level entropy problems are
// not in this list: those are recovered by zero-filling the band and are
// reported as warnings on the decoded frame instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
  #[error("invalid argument: {0}")]
  InvalidArgument(&'static str),

  #[error("out of memory")]
  OutOfMemory,

  #[error("unsupported pixel or encoded format")]
  BadFormat,

  #[error("malformed sample: {0}")]
  BadSample(&'static str),

  #[error("internal error: {0}")]
  Internal(&'static str),

  #[error("encoding has not been started")]
  EncodingNotStarted,

  #[error("no finished sample available")]
  NotFinished,

  #[error("decode buffer too small: need {needed} bytes, got {got}")]
  DecodeBufferSize { needed: usize, got: usize },

  #[error("licensing restriction")]
  Licensing,

  #[error("unknown tag {0:#06x}")]
  UnknownTag(u16),

  #[error("bad metadata tuple")]
  BadMetadata,

  #[error("failed to create worker thread")]
  ThreadCreateFailed,

  #[error("failed to wait for worker thread")]
  ThreadWaitFailed,
}

// Recoverable conditions noticed while decoding a sample. The frame is
// still returned; the affected band has been zero-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeWarning {
  // A variable-length code fell outside the codebook
  EntropyCorrupt { channel: usize, subband: usize },
  // The coded coefficients ran past the band size without a band-end marker
  BandUnderflow { channel: usize, subband: usize },
  // The band-end marker appeared before the band was fully populated
  BandOverflow { channel: usize, subband: usize },
  // A tag outside the known set was skipped
  UnknownTagSkipped { tag: u16 },
  // The metadata blob could not be parsed; image decode was not affected
  MetadataIgnored,
}
