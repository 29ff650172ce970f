// End-to-end encode/decode scenarios.

use cfwave::sample::{tag, TagReader};
use cfwave::{
  parse_sample_header, DecodeWarning, DecodedResolution, Decoder, EncodedFormat, Encoder,
  EncoderParams, PixelFormat, Quality,
};

fn prepare(width: usize, height: usize, input: PixelFormat, encoded: EncodedFormat, quality: Quality, gop: usize) -> Encoder {
  let mut encoder = Encoder::new();
  encoder
    .prepare(EncoderParams {
      width: width,
      height: height,
      input_format: input,
      encoded_format: encoded,
      quality: quality,
      gop_length: gop,
      ..EncoderParams::default()
    })
    .unwrap();
  return encoder;
}

// A synthetic frame with gradients, edges and a little texture; byte
// layout is BGRA
fn test_frame_bgra(width: usize, height: usize, seed: u32) -> Vec<u8> {
  let mut frame = vec![0u8; width * height * 4];
  for y in 0..height {
    for x in 0..width {
      let at = (y * width + x) * 4;
      let texture = ((x * 13 + y * 7 + seed as usize * 11) % 32) as u8;
      frame[at] = ((x * 255) / width) as u8;
      frame[at + 1] = ((y * 255) / height) as u8;
      frame[at + 2] = if (x / 64 + y / 64) % 2 == 0 { 200 } else { 40 + texture };
      frame[at + 3] = 255;
    }
  }
  return frame;
}

fn psnr_8bit(a: &[u8], b: &[u8]) -> f64 {
  assert_eq!(a.len(), b.len());
  let mut sum = 0f64;
  for (&x, &y) in a.iter().zip(b.iter()) {
    let d = x as f64 - y as f64;
    sum += d * d;
  }
  let mse = sum / a.len() as f64;
  if mse == 0.0 {
    return f64::INFINITY;
  }
  return 10.0 * (255.0 * 255.0 / mse).log10();
}

// Four 1920x1080 BGRA frames at FilmScan1 survive a full-resolution
// round trip above 50 dB
#[test]
fn hd_bgra_filmscan1_psnr() {
  let width = 1920;
  let height = 1080;
  let mut encoder = prepare(width, height, PixelFormat::Bgra, EncodedFormat::Rgb444, Quality::FilmScan1, 1);
  let mut decoder = Decoder::new();
  let pitch = width * 4;

  for frame_index in 0..4 {
    let frame = test_frame_bgra(width, height, frame_index);
    let sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();

    let dims = decoder.prepare_to_decode(&sample, PixelFormat::Bgra, DecodedResolution::Full).unwrap();
    assert_eq!(dims, (width, height));
    let mut out = vec![0u8; pitch * height];
    let report = decoder.decode_sample(&sample, &mut out, pitch).unwrap();
    assert!(report.warnings.is_empty());

    let psnr = psnr_8bit(&frame, &out);
    assert!(psnr >= 50.0, "frame {}: PSNR {:.2} dB below 50", frame_index, psnr);
  }
}

// One UHD RG48 frame coded as RGB 4:4:4 and decoded at quarter
// resolution: 960x540 out, average level preserved within one percent
#[test]
fn uhd_rg48_quarter_resolution() {
  let width = 3840;
  let height = 2160;
  let pitch = PixelFormat::Rg48.row_pitch(width);

  let mut frame = vec![0u8; pitch * height];
  for y in 0..height {
    for x in 0..width {
      let at = y * pitch + x * 6;
      let r = ((x * 65535) / width) as u16;
      let g = ((y * 65535) / height) as u16;
      let b = (((x + y) * 65535) / (width + height)) as u16;
      frame[at..at + 2].copy_from_slice(&r.to_le_bytes());
      frame[at + 2..at + 4].copy_from_slice(&g.to_le_bytes());
      frame[at + 4..at + 6].copy_from_slice(&b.to_le_bytes());
    }
  }

  let mut encoder = prepare(width, height, PixelFormat::Rg48, EncodedFormat::Rgb444, Quality::FilmScan1, 1);
  let sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();

  let mut decoder = Decoder::new();
  let (dw, dh) = decoder.prepare_to_decode(&sample, PixelFormat::Rg48, DecodedResolution::Quarter).unwrap();
  assert_eq!((dw, dh), (960, 540));

  let out_pitch = PixelFormat::Rg48.row_pitch(dw);
  let mut out = vec![0u8; out_pitch * dh];
  let report = decoder.decode_sample(&sample, &mut out, out_pitch).unwrap();
  assert_eq!((report.width, report.height), (960, 540));

  let mean_in = mean_rg48(&frame, width, height, pitch);
  let mean_out = mean_rg48(&out, dw, dh, out_pitch);
  let relative = (mean_in - mean_out).abs() / mean_in;
  assert!(relative < 0.01, "mean level drifted {:.3}%", relative * 100.0);
}

fn mean_rg48(data: &[u8], width: usize, height: usize, pitch: usize) -> f64 {
  let mut sum = 0f64;
  for y in 0..height {
    for x in 0..width {
      let at = y * pitch + x * 6;
      for c in 0..3 {
        sum += u16::from_le_bytes([data[at + c * 2], data[at + c * 2 + 1]]) as f64;
      }
    }
  }
  return sum / (width * height * 3) as f64;
}

// A GOP of two: decoding frame one alone and decoding the full pair
// must reconstruct frame one identically
#[test]
fn gop_first_frame_is_stable() {
  let width = 256;
  let height = 144;
  let pitch = width * 4;
  let mut encoder = prepare(width, height, PixelFormat::BgraTopDown, EncodedFormat::Rgb444, Quality::FilmScan1, 2);

  let f0 = test_frame_bgra(width, height, 1);
  let f1 = test_frame_bgra(width, height, 2);
  assert!(encoder.encode_sample(&f0, pitch).unwrap().is_none());
  let sample = encoder.encode_sample(&f1, pitch).unwrap().unwrap();

  // Path one: frame one alone
  let mut decoder_a = Decoder::new();
  decoder_a.prepare_to_decode(&sample, PixelFormat::BgraTopDown, DecodedResolution::Full).unwrap();
  let mut out_a = vec![0u8; pitch * height];
  decoder_a.decode_sample(&sample, &mut out_a, pitch).unwrap();

  // Path two: both frames
  let mut decoder_b = Decoder::new();
  decoder_b.prepare_to_decode(&sample, PixelFormat::BgraTopDown, DecodedResolution::Full).unwrap();
  let mut out_b = vec![0u8; pitch * height];
  decoder_b.decode_sample(&sample, &mut out_b, pitch).unwrap();
  let mut out_b2 = vec![0u8; pitch * height];
  let second = decoder_b.next_gop_frame(&mut out_b2, pitch).unwrap();
  assert!(second.is_some());

  assert_eq!(out_a, out_b);
  // And the second frame resembles its source
  assert!(psnr_8bit(&f1, &out_b2) >= 50.0);
}

// Corrupting one coefficient band must not fail the decode: the band
// is zero-filled and the warning names the entropy corruption
#[test]
fn corrupt_band_recovers_with_warning() {
  let width = 320;
  let height = 240;
  let pitch = width * 4;
  let mut encoder = prepare(width, height, PixelFormat::BgraTopDown, EncodedFormat::Rgb444, Quality::FilmScan1, 1);
  let frame = test_frame_bgra(width, height, 3);
  let mut sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();

  // Overwrite the first entropy-coded band payload with ones, which no
  // codebook entry can start with
  let mut band_payload = None;
  {
    let mut reader = TagReader::new(&sample);
    loop {
      let before = reader.position();
      match reader.next().unwrap() {
        Some(tuple) if tuple.tag == tag::BAND_DATA => {
          let payload_len = tuple.payload.unwrap().len();
          band_payload = Some((before + 4, payload_len));
          break;
        }
        Some(_) => {}
        None => break,
      }
    }
  }
  let (start, len) = band_payload.expect("sample has no coded bands");
  for byte in sample[start..start + len].iter_mut() {
    *byte = 0xFF;
  }

  let mut decoder = Decoder::new();
  decoder.prepare_to_decode(&sample, PixelFormat::BgraTopDown, DecodedResolution::Full).unwrap();
  let mut out = vec![0u8; pitch * height];
  let report = decoder.decode_sample(&sample, &mut out, pitch).unwrap();
  assert!(
    report.warnings.iter().any(|w| matches!(w, DecodeWarning::EntropyCorrupt { .. })),
    "warnings were {:?}",
    report.warnings
  );
}

// An unknown tag between the header and the channel data is skipped
#[test]
fn unknown_tag_is_skipped() {
  let width = 128;
  let height = 96;
  let pitch = width * 4;
  let mut encoder = prepare(width, height, PixelFormat::BgraTopDown, EncodedFormat::Rgb444, Quality::High, 1);
  let frame = test_frame_bgra(width, height, 4);
  let sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();

  // Splice an unknown short tuple in front of the first channel block
  let mut channel_pos = None;
  {
    let mut reader = TagReader::new(&sample);
    loop {
      let before = reader.position();
      match reader.next().unwrap() {
        Some(tuple) if tuple.tag == tag::CHANNEL => {
          channel_pos = Some(before);
          break;
        }
        Some(_) => {}
        None => break,
      }
    }
  }
  let at = channel_pos.unwrap();
  let mut spliced = Vec::with_capacity(sample.len() + 4);
  spliced.extend_from_slice(&sample[..at]);
  spliced.extend_from_slice(&0x0777u16.to_be_bytes());
  spliced.extend_from_slice(&42u16.to_be_bytes());
  spliced.extend_from_slice(&sample[at..]);

  assert!(parse_sample_header(&spliced).is_ok());

  let mut decoder = Decoder::new();
  decoder.prepare_to_decode(&spliced, PixelFormat::BgraTopDown, DecodedResolution::Full).unwrap();
  let mut out = vec![0u8; pitch * height];
  let report = decoder.decode_sample(&spliced, &mut out, pitch).unwrap();
  assert!(report.warnings.iter().any(|w| matches!(w, DecodeWarning::UnknownTagSkipped { tag: 0x0777 })));

  // The image itself is unharmed
  assert!(psnr_8bit(&frame, &out) >= 45.0);
}

// Thumbnails come straight from the stored lowpass bands
#[test]
fn thumbnail_extraction_matches_info() {
  let width = 640;
  let height = 360;
  let pitch = width * 4;
  let mut encoder = prepare(width, height, PixelFormat::BgraTopDown, EncodedFormat::Rgb444, Quality::Medium, 1);
  let frame = test_frame_bgra(width, height, 5);
  let sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();

  let (tw, th) = cfwave::thumbnail_info(&sample).unwrap();
  assert_eq!((tw, th), (80, 45));

  let image = cfwave::extract_thumbnail(&sample).unwrap();
  assert_eq!(image.channels.len(), 3);
  assert_eq!(image.channels[0].width, 80);
  assert_eq!(image.channels[0].height, 45);

  // Thumbnail decoding through the engine agrees on geometry
  let mut decoder = Decoder::new();
  let dims = decoder.prepare_to_decode(&sample, PixelFormat::BgraTopDown, DecodedResolution::Thumbnail).unwrap();
  assert_eq!(dims, (80, 45));
}

// The YUV 4:2:2 coding path end to end, with the color conversion loss
// included. The source is smooth: chroma subsampling of hard edges is
// lossy by design and would dominate the measurement.
#[test]
fn yuv422_roundtrip_is_visually_clean() {
  let width = 512;
  let height = 288;
  let pitch = width * 4;
  let mut encoder = prepare(width, height, PixelFormat::BgraTopDown, EncodedFormat::Yuv422, Quality::FilmScan1, 1);

  let mut frame = vec![0u8; pitch * height];
  for y in 0..height {
    for x in 0..width {
      let at = (y * width + x) * 4;
      frame[at] = ((x * 255) / width) as u8;
      frame[at + 1] = ((y * 255) / height) as u8;
      frame[at + 2] = (((x + 2 * y) * 255) / (width + 2 * height)) as u8;
      frame[at + 3] = 255;
    }
  }
  let sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();

  let header = parse_sample_header(&sample).unwrap();
  assert_eq!(header.encoded_format, EncodedFormat::Yuv422);

  let mut decoder = Decoder::new();
  decoder.prepare_to_decode(&sample, PixelFormat::BgraTopDown, DecodedResolution::Full).unwrap();
  let mut out = vec![0u8; pitch * height];
  decoder.decode_sample(&sample, &mut out, pitch).unwrap();

  // Chroma subsampling plus matrix loss lands well under visually
  // lossless territory but nowhere near bit exactness
  assert!(psnr_8bit(&frame, &out) >= 38.0);
}

// Raw Bayer quads code as four half-size planes and come back close
#[test]
fn bayer_roundtrip_stays_tight() {
  let width = 256;
  let height = 128;
  let pitch = PixelFormat::Byr4.row_pitch(width);
  let quad_rows = height / 2;

  let mut frame = vec![0u8; pitch * quad_rows];
  for row in 0..quad_rows {
    for quad in 0..width / 2 {
      let at = row * pitch + quad * 8;
      for c in 0..4usize {
        let value = (((quad * 251 + row * 127 + c * 59) % 4096) * 16) as u16;
        frame[at + c * 2..at + c * 2 + 2].copy_from_slice(&value.to_le_bytes());
      }
    }
  }

  let mut encoder = prepare(width, height, PixelFormat::Byr4, EncodedFormat::Bayer, Quality::FilmScan1, 1);
  let sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();
  let header = parse_sample_header(&sample).unwrap();
  assert_eq!(header.encoded_format, EncodedFormat::Bayer);
  assert_eq!(header.channel_count, 4);

  let mut decoder = Decoder::new();
  decoder.prepare_to_decode(&sample, PixelFormat::Byr4, DecodedResolution::Full).unwrap();
  let mut out = vec![0u8; pitch * quad_rows];
  decoder.decode_sample(&sample, &mut out, pitch).unwrap();

  let mut worst = 0i32;
  for (a, b) in frame.chunks_exact(2).zip(out.chunks_exact(2)) {
    let x = u16::from_le_bytes([a[0], a[1]]) as i32;
    let y = u16::from_le_bytes([b[0], b[1]]) as i32;
    worst = worst.max((x - y).abs());
  }
  // Quantization plus prescale rounding, expressed at 16-bit scale
  assert!(worst <= 1024, "worst component error {}", worst);
}

// Every supported decode resolution reports consistent geometry
#[test]
fn decoded_resolutions_report_consistent_dims() {
  let width = 800;
  let height = 600;
  let pitch = width * 4;
  let mut encoder = prepare(width, height, PixelFormat::BgraTopDown, EncodedFormat::Rgb444, Quality::High, 1);
  let frame = test_frame_bgra(width, height, 7);
  let sample = encoder.encode_sample(&frame, pitch).unwrap().unwrap();

  for (resolution, expected) in [
    (DecodedResolution::Full, (800, 600)),
    (DecodedResolution::Half, (400, 300)),
    (DecodedResolution::Quarter, (200, 150)),
    (DecodedResolution::Thumbnail, (100, 75)),
  ] {
    let mut decoder = Decoder::new();
    let dims = decoder.prepare_to_decode(&sample, PixelFormat::BgraTopDown, resolution).unwrap();
    assert_eq!(dims, expected);

    let out_pitch = expected.0 * 4;
    let mut out = vec![0u8; out_pitch * expected.1];
    let report = decoder.decode_sample(&sample, &mut out, out_pitch).unwrap();
    assert_eq!((report.width, report.height), expected);
  }
}
