// Command-line front end: encode raw frames to a stream of samples and
// back. Each sample in the stream file is preceded by a big-endian
// 32-bit byte count; the samples themselves are self-delimiting, the
// prefix just makes file scanning trivial.

use std::fs::File;
use std::io::prelude::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use clap::{Parser, Subcommand};

use cfwave::{
  parse_sample_header, thumbnail_info, DecodedResolution, Decoder, EncodedFormat, Encoder,
  EncoderParams, PixelFormat, Quality,
};

#[derive(Parser)]
#[command(name = "cfwave", about = "wavelet mezzanine codec")]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  // Encode raw frames into a sample stream
  Encode {
    input: String,
    output: String,
    #[arg(long)]
    width: usize,
    #[arg(long)]
    height: usize,
    #[arg(long, default_value = "BGRa")]
    pixel_format: String,
    #[arg(long, default_value = "rgb444")]
    encoded_format: String,
    #[arg(long, default_value = "filmscan1")]
    quality: String,
    #[arg(long, default_value_t = 1)]
    gop: usize,
  },
  // Decode a sample stream back to raw frames
  Decode {
    input: String,
    output: String,
    #[arg(long, default_value = "BGRa")]
    pixel_format: String,
    #[arg(long, default_value = "full")]
    resolution: String,
  },
  // Print the header of the first sample in a stream
  Info {
    input: String,
  },
}

fn parse_pixel_format(name: &str) -> PixelFormat {
  let bytes: [u8; 4] = name.as_bytes().try_into().unwrap_or(*b"????");
  match PixelFormat::from_fourcc(&bytes) {
    Ok(format) => format,
    Err(_) => {
      eprintln!("Unknown pixel format '{}'", name);
      std::process::exit(1);
    }
  }
}

fn parse_quality(name: &str) -> Quality {
  match name {
    "low" => Quality::Low,
    "medium" => Quality::Medium,
    "high" => Quality::High,
    "filmscan1" => Quality::FilmScan1,
    "filmscan2" => Quality::FilmScan2,
    _ => {
      eprintln!("Unknown quality '{}'", name);
      std::process::exit(1);
    }
  }
}

fn parse_encoded_format(name: &str) -> EncodedFormat {
  match name {
    "yuv422" => EncodedFormat::Yuv422,
    "rgb444" => EncodedFormat::Rgb444,
    "rgba4444" => EncodedFormat::Rgba4444,
    "yuva4444" => EncodedFormat::Yuva4444,
    "bayer" => EncodedFormat::Bayer,
    _ => {
      eprintln!("Unknown encoded format '{}'", name);
      std::process::exit(1);
    }
  }
}

fn parse_resolution(name: &str) -> DecodedResolution {
  match name {
    "full" => DecodedResolution::Full,
    "half" => DecodedResolution::Half,
    "quarter" => DecodedResolution::Quarter,
    "thumbnail" => DecodedResolution::Thumbnail,
    _ => {
      eprintln!("Unknown resolution '{}'", name);
      std::process::exit(1);
    }
  }
}

fn run_encode(
  input: &str,
  output: &str,
  width: usize,
  height: usize,
  pixel_format: PixelFormat,
  encoded_format: EncodedFormat,
  quality: Quality,
  gop: usize,
) -> std::io::Result<()> {
  let mut encoder = Encoder::new();
  encoder
    .prepare(EncoderParams {
      width: width,
      height: height,
      input_format: pixel_format,
      encoded_format: encoded_format,
      quality: quality,
      gop_length: gop,
      ..EncoderParams::default()
    })
    .unwrap_or_else(|err| {
      eprintln!("Cannot prepare encoder: {}", err);
      std::process::exit(1);
    });

  let pitch = pixel_format.row_pitch(width);
  let rows = if pixel_format == PixelFormat::Byr2 || pixel_format == PixelFormat::Byr4 {
    (height + 1) / 2
  } else {
    height
  };
  let frame_size = pitch * rows;

  let mut infile = File::open(input)?;
  let mut outfile = File::create(output)?;
  let mut frame = vec![0u8; frame_size];
  let mut count = 0u32;

  loop {
    match infile.read_exact(&mut frame) {
      Ok(()) => {}
      Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
      Err(err) => return Err(err),
    }
    if let Some(sample) = encoder.encode_sample(&frame, pitch).unwrap() {
      outfile.write_u32::<BigEndian>(sample.len() as u32)?;
      outfile.write_all(&sample)?;
    }
    count += 1;
  }
  if let Some(sample) = encoder.flush().unwrap() {
    outfile.write_u32::<BigEndian>(sample.len() as u32)?;
    outfile.write_all(&sample)?;
  }

  eprintln!("Encoded {} frames", count);
  return Ok(());
}

fn run_decode(input: &str, output: &str, pixel_format: PixelFormat, resolution: DecodedResolution) -> std::io::Result<()> {
  let mut infile = File::open(input)?;
  let mut outfile = File::create(output)?;
  let mut decoder = Decoder::new();
  let mut count = 0u32;

  loop {
    let size = match infile.read_u32::<BigEndian>() {
      Ok(size) => size as usize,
      Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
      Err(err) => return Err(err),
    };
    let mut sample = vec![0u8; size];
    infile.read_exact(&mut sample)?;

    let (width, height) = decoder
      .prepare_to_decode(&sample, pixel_format, resolution)
      .unwrap_or_else(|err| {
        eprintln!("Cannot decode sample: {}", err);
        std::process::exit(1);
      });

    let pitch = pixel_format.row_pitch(width);
    let rows = if pixel_format == PixelFormat::Byr2 || pixel_format == PixelFormat::Byr4 {
      (height + 1) / 2
    } else {
      height
    };
    let mut out = vec![0u8; pitch * rows];

    let report = decoder.decode_sample(&sample, &mut out, pitch).unwrap();
    for warning in report.warnings.iter() {
      eprintln!("frame {}: {:?}", report.frame_number, warning);
    }
    outfile.write_all(&out)?;
    count += 1;

    // A temporal GOP sample carries a second frame
    if decoder.next_gop_frame(&mut out, pitch).unwrap().is_some() {
      outfile.write_all(&out)?;
      count += 1;
    }
  }

  eprintln!("Decoded {} frames", count);
  return Ok(());
}

fn run_info(input: &str) -> std::io::Result<()> {
  let mut infile = File::open(input)?;
  let size = infile.read_u32::<BigEndian>()? as usize;
  let mut sample = vec![0u8; size];
  infile.read_exact(&mut sample)?;

  match parse_sample_header(&sample) {
    Ok(header) => {
      println!("sample type:      {}", header.sample_type);
      println!("frame size:       {}x{}", header.width, header.height);
      println!("display size:     {}x{}", header.display_width, header.display_height);
      println!("encoded format:   {:?}", header.encoded_format);
      println!("color space:      {:?}", header.color_space);
      println!("channels:         {}", header.channel_count);
      println!("precision:        {} bits", header.precision);
      println!("quality:          {:?}", header.quality);
      println!("GOP length:       {}", header.gop_length);
      println!("transform levels: {}", header.transform_levels);
      if let Ok((tw, th)) = thumbnail_info(&sample) {
        println!("thumbnail:        {}x{}", tw, th);
      }
    }
    Err(err) => {
      eprintln!("Bad sample: {}", err);
      std::process::exit(1);
    }
  }
  return Ok(());
}

fn main() -> std::io::Result<()> {
  env_logger::init();
  let args = Args::parse();

  match args.command {
    Command::Encode { input, output, width, height, pixel_format, encoded_format, quality, gop } => {
      run_encode(
        &input,
        &output,
        width,
        height,
        parse_pixel_format(&pixel_format),
        parse_encoded_format(&encoded_format),
        parse_quality(&quality),
        gop,
      )
    }
    Command::Decode { input, output, pixel_format, resolution } => {
      run_decode(&input, &output, parse_pixel_format(&pixel_format), parse_resolution(&resolution))
    }
    Command::Info { input } => run_info(&input),
  }
}
