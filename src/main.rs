#![warn(unused_extern_crates)]
use ab_glyph::FontVec;
use anyhow::{Context, Error, Result};
use clap::{Parser, ValueEnum};
use image::{ImageFormat, Rgb};
use masked::detection::{PoseDetector, PoseDetectorOptions};
use masked::mask::{MaskOptions, MaskScale, MaskShape};
use masked::pipeline::{Mode, Pipeline, RunStats};
use masked::progress::Progress;
use masked::video::{VideoInfo, VideoReader, VideoWriter, copy_audio};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

const DEFAULT_OUTPUT: &str = "out.mp4";

#[derive(Parser, Debug)]
#[command(version, about = "Masks the eyes of people in videos and images", long_about = None)]
struct CmdArgs {
    /// Video or image to anonymize
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the result. Defaults to out.mp4, or to out with the
    /// input's extension for images
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum person detection confidence, 0 to 1
    #[arg(short, long, default_value = "0.8", value_parser = parse_unit)]
    threshold: f32,

    /// Mask only one of several detections with eyes at the same spot
    #[arg(long)]
    remove_duplicates: bool,

    /// Mask at most this many faces per frame, most confident first
    #[arg(short, long, value_parser = parse_positive)]
    faces: Option<usize>,

    /// Don't copy the input's audio into the output
    #[arg(long)]
    no_audio: bool,

    /// Draw detections instead of masking them
    #[arg(long)]
    visualize: bool,

    /// YOLO pose model in ONNX format
    #[arg(short, long, default_value = "models/yolov8n-pose.onnx")]
    model: PathBuf,

    /// Minimum visibility for a keypoint to be used, 0 to 1
    #[arg(long, default_value = "0.5", value_parser = parse_unit)]
    keypoint_threshold: f32,

    /// Mask size multipliers along and across the eye line
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], default_values_t = [1., 1.])]
    mask_scale: Vec<f32>,

    /// Mask color
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], default_values_t = [0, 0, 0])]
    mask_color: Vec<u8>,

    /// Read --mask-color as blue, green, red
    #[arg(long)]
    bgr: bool,

    #[arg(long, value_enum, default_value_t = ShapeArg::Rectangle)]
    mask_shape: ShapeArg,

    /// Thickness in pixels of the line mask
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u32).range(1..))]
    line_thickness: u32,

    /// Inference threads, defaults to the number of CPUs
    #[arg(long, value_parser = parse_positive)]
    threads: Option<usize>,

    /// Font file for detection scores in --visualize mode
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeArg {
    /// Box over both eyes
    Rectangle,
    /// Line between the eyes
    Line,
}

impl CmdArgs {
    fn image_input(&self) -> bool {
        ImageFormat::from_path(&self.input).is_ok()
    }

    fn output_path(&self) -> Result<PathBuf> {
        if !self.image_input() {
            return Ok(self.output.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)));
        }

        let output = match &self.output {
            Some(output) => output.clone(),
            None => {
                let ext = self.input.extension().unwrap_or_default();
                PathBuf::from(DEFAULT_OUTPUT).with_extension(ext)
            }
        };
        if ImageFormat::from_path(&output).is_err() {
            return Err(Error::msg(format!(
                "{} is an image, but {} is not an image file name",
                self.input.display(),
                output.display()
            )));
        }

        Ok(output)
    }

    fn mask_options(&self) -> Result<MaskOptions> {
        let [width, height] = self.mask_scale[..] else {
            return Err(Error::msg("--mask-scale takes a width and a height"));
        };

        let shape = match self.mask_shape {
            ShapeArg::Rectangle => MaskShape::Rectangle,
            ShapeArg::Line => MaskShape::Line {
                thickness: self.line_thickness,
            },
        };

        Ok(MaskOptions {
            scale: MaskScale::new(width, height)?,
            color: sink_color(&self.mask_color, self.bgr)?,
            shape,
            remove_duplicates: self.remove_duplicates,
            max_faces: self.faces,
            keypoint_threshold: self.keypoint_threshold,
        })
    }
}

fn parse_unit(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|_| format!("{s} is not a number"))?;
    if (0. ..=1.).contains(&v) {
        Ok(v)
    } else {
        Err(format!("{v} is not between 0 and 1"))
    }
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(v) => Ok(v),
        Err(_) => Err(format!("{s} is not a positive whole number")),
    }
}

/// Frames are decoded as RGB, so a color given in BGR order is flipped here.
fn sink_color(values: &[u8], bgr: bool) -> Result<Rgb<u8>> {
    let [a, b, c] = values[..] else {
        return Err(Error::msg(format!(
            "--mask-color takes three values, got {values:?}"
        )));
    };

    Ok(if bgr { Rgb([c, b, a]) } else { Rgb([a, b, c]) })
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let args = CmdArgs::parse();
    let options = args.mask_options()?;
    let output = args.output_path()?;
    debug!("{options:?}");

    let detector = PoseDetector::new(&PoseDetectorOptions {
        model_path: args.model.clone(),
        threshold: args.threshold,
        threads: args.threads.unwrap_or_else(num_cpus::get),
    })?;

    let mode = if args.visualize {
        Mode::Visualize {
            font: load_font(args.font.as_deref())?,
        }
    } else {
        Mode::Anonymize
    };
    let mut pipeline = Pipeline::new(detector, options, mode);

    if args.image_input() {
        return process_image(&args.input, &output, &mut pipeline);
    }

    let start = Instant::now();
    let stats = process_video(&args.input, &output, &mut pipeline)?;
    info!(
        "Processed {} frames in {:?}: {} faces detected, {} masked",
        stats.frames,
        start.elapsed(),
        stats.faces_detected,
        stats.faces_masked
    );

    if !args.no_audio {
        if let Err(e) = copy_audio(&args.input, &output) {
            error!("{e:?}");
            std::process::exit(1);
        }
    }

    info!("Result at {output:?}");
    Ok(())
}

fn load_font(path: Option<&Path>) -> Result<Option<FontVec>> {
    let Some(path) = path else {
        warn!("No --font given, detection scores will not be drawn");
        return Ok(None);
    };

    let data =
        std::fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    let font = FontVec::try_from_vec(data)
        .map_err(|e| Error::msg(format!("Invalid font {}: {e}", path.display())))?;

    Ok(Some(font))
}

fn process_image(
    src: &Path,
    dest: &Path,
    pipeline: &mut Pipeline<PoseDetector>,
) -> Result<()> {
    let mut img = image::open(src)
        .with_context(|| format!("Failed to open {}", src.display()))?
        .into_rgb8();

    let report = pipeline.process_frame(&mut img)?;
    info!("{report:?}");

    img.save(dest)
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    info!("Result at {dest:?}");
    Ok(())
}

fn process_video(
    src: &Path,
    dest: &Path,
    pipeline: &mut Pipeline<PoseDetector>,
) -> Result<RunStats> {
    let info = VideoInfo::probe(src)?;
    debug!("{info:?}");

    let mut reader = VideoReader::open(src, &info)?;
    let mut writer = VideoWriter::create(dest, &info)?;
    let mut progress = Progress::new(info.frame_count);

    let stats = pipeline.run(&mut reader, &mut writer, |s| {
        progress.update(s.frames, s.faces_masked)
    })?;
    progress.finish();

    writer.finish()?;
    reader.finish()?;

    if stats.frames == 0 {
        warn!("No frames decoded from {}", src.display());
    }

    Ok(stats)
}
