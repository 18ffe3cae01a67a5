use crate::anonymize::{FrameReport, anonymize_frame};
use crate::detection::KeypointDetector;
use crate::draw::draw_detections;
use crate::mask::MaskOptions;
use crate::video::FrameSink;
use ab_glyph::FontVec;
use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{Level, span, trace};

/// What the pipeline does with the detections of each frame.
pub enum Mode {
    Anonymize,
    /// Draw boxes, keypoints and scores instead of masks
    Visualize { font: Option<FontVec> },
}

/// Totals over all frames of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub faces_detected: usize,
    pub faces_masked: usize,
}

impl RunStats {
    fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.faces_detected += report.detected;
        self.faces_masked += report.masked;
    }
}

pub struct Pipeline<D> {
    detector: D,
    options: MaskOptions,
    mode: Mode,
}

impl<D: KeypointDetector> Pipeline<D> {
    pub fn new(detector: D, options: MaskOptions, mode: Mode) -> Self {
        Self {
            detector,
            options,
            mode,
        }
    }

    pub fn process_frame(&mut self, img: &mut RgbImage) -> Result<FrameReport> {
        let span = span!(Level::DEBUG, "process_frame");
        let _guard = span.enter();

        let detections = self.detector.detect(img)?;
        let vocabulary = self.detector.vocabulary();

        let report = match &self.mode {
            Mode::Anonymize => anonymize_frame(img, &detections, vocabulary, &self.options),
            Mode::Visualize { font } => {
                draw_detections(
                    img,
                    &detections,
                    vocabulary,
                    self.options.keypoint_threshold,
                    font.as_ref(),
                );
                FrameReport {
                    detected: detections.len(),
                    ..Default::default()
                }
            }
        };
        trace!("{report:?}");

        Ok(report)
    }

    /// Processes every frame of `frames` in order, writing each to `sink`
    /// whether or not anything was masked. Stops at the first failure.
    pub fn run<I, S, F>(&mut self, frames: I, sink: &mut S, mut on_frame: F) -> Result<RunStats>
    where
        I: IntoIterator<Item = Result<RgbImage>>,
        S: FrameSink + ?Sized,
        F: FnMut(&RunStats),
    {
        let mut stats = RunStats::default();

        for (idx, frame) in frames.into_iter().enumerate() {
            let mut img = frame.with_context(|| format!("Failed to read frame {idx}"))?;
            let report = self
                .process_frame(&mut img)
                .with_context(|| format!("Failed to process frame {idx}"))?;
            sink.write_frame(&img)
                .with_context(|| format!("Failed to write frame {idx}"))?;

            stats.record(&report);
            on_frame(&stats);
        }

        Ok(stats)
    }
}
