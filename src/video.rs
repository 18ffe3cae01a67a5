use anyhow::{Context, Error, Result};
use image::RgbImage;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use tracing::{debug, error, warn};

/// Decoded frames allowed to queue up ahead of processing
const FRAME_BUFFER: usize = 8;
const FALLBACK_FRAME_RATE: &str = "25";

/// Accepts processed frames, in order.
pub trait FrameSink {
    fn write_frame(&mut self, img: &RgbImage) -> Result<()>;
}

impl FrameSink for Vec<RgbImage> {
    fn write_frame(&mut self, img: &RgbImage) -> Result<()> {
        self.push(img.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// As ffmpeg writes it, e.g. "30000/1001"
    pub frame_rate: String,
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    pub fn probe(path: &Path) -> Result<VideoInfo> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,nb_frames",
                "-of",
                "default=noprint_wrappers=1",
            ])
            .arg(path)
            .output()
            .context("Failed to run ffprobe")?;

        if !output.status.success() {
            return Err(Error::msg(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        VideoInfo::parse(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("No video stream found in {}", path.display()))
    }

    fn parse(probe_output: &str) -> Result<VideoInfo> {
        let mut width = None;
        let mut height = None;
        let mut frame_rate = None;
        let mut frame_count = None;

        for line in probe_output.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            match key {
                "width" => width = value.parse::<u32>().ok(),
                "height" => height = value.parse::<u32>().ok(),
                "r_frame_rate" => frame_rate = Some(value.to_string()),
                "nb_frames" => frame_count = value.parse::<u64>().ok(),
                _ => {}
            }
        }

        let (width, height) = match (width, height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(Error::msg("Missing frame dimensions in ffprobe output")),
        };

        let frame_rate = match frame_rate {
            Some(rate) if valid_rate(&rate) => rate,
            rate => {
                warn!("Unusable frame rate {rate:?}, assuming {FALLBACK_FRAME_RATE}");
                FALLBACK_FRAME_RATE.to_string()
            }
        };

        Ok(VideoInfo {
            width,
            height,
            frame_rate,
            frame_count: frame_count.filter(|c| *c > 0),
        })
    }

    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

fn valid_rate(rate: &str) -> bool {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    match (num.parse::<f64>(), den.parse::<f64>()) {
        (Ok(n), Ok(d)) => n > 0. && d > 0.,
        _ => false,
    }
}

/// Raw rgb24 frames decoded by an ffmpeg child process. Decoding runs on a
/// background thread, a few frames ahead of the consumer.
pub struct VideoReader {
    decoder: Child,
    frames: flume::Receiver<Result<RgbImage>>,
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        stop(&mut self.decoder, "decoder");
    }
}

impl VideoReader {
    pub fn open(path: &Path, info: &VideoInfo) -> Result<Self> {
        let mut decoder = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to start ffmpeg decoder")?;

        let stdout = decoder
            .stdout
            .take()
            .ok_or_else(|| Error::msg("ffmpeg decoder has no output pipe"))?;

        let (tx, rx) = flume::bounded(FRAME_BUFFER);
        let (width, height, frame_bytes) = (info.width, info.height, info.frame_bytes());
        thread::spawn(move || read_frames(stdout, width, height, frame_bytes, tx));

        Ok(Self {
            decoder,
            frames: rx,
        })
    }

    /// Waits for the decoder to exit and reports whether it succeeded.
    pub fn finish(&mut self) -> Result<()> {
        let status = self.decoder.wait()?;
        if !status.success() {
            return Err(Error::msg(format!("ffmpeg decoder exited with {status}")));
        }
        Ok(())
    }
}

impl Iterator for VideoReader {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.recv().ok()
    }
}

fn read_frames(
    mut input: impl Read,
    width: u32,
    height: u32,
    frame_bytes: usize,
    tx: flume::Sender<Result<RgbImage>>,
) {
    loop {
        let mut buf = vec![0u8; frame_bytes];
        match input.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Decoder output ended");
                break;
            }
            Err(e) => {
                let _ = tx.send(Err(Error::new(e).context("Failed to read decoded frame")));
                break;
            }
        }

        let frame = RgbImage::from_raw(width, height, buf)
            .ok_or_else(|| Error::msg("Decoded frame does not match the video size"));
        if tx.send(frame).is_err() {
            // consumer is gone
            break;
        }
    }
}

/// Encodes raw rgb24 frames to a video file with an ffmpeg child process.
pub struct VideoWriter {
    encoder: Child,
    input: Option<ChildStdin>,
    width: u32,
    height: u32,
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        drop(self.input.take());
        stop(&mut self.encoder, "encoder");
    }
}

impl VideoWriter {
    pub fn create(path: &Path, info: &VideoInfo) -> Result<Self> {
        let mut encoder = Command::new("ffmpeg")
            .args([
                "-v",
                "error",
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", info.width, info.height),
                "-r",
                &info.frame_rate,
                "-i",
                "-",
                "-an",
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-pix_fmt",
                "yuv420p",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to start ffmpeg encoder")?;

        let input = encoder.stdin.take();

        Ok(Self {
            encoder,
            input,
            width: info.width,
            height: info.height,
        })
    }

    /// Closes the encoder input and waits for the file to be written.
    pub fn finish(mut self) -> Result<()> {
        drop(self.input.take());
        let status = self.encoder.wait()?;
        if !status.success() {
            return Err(Error::msg(format!("ffmpeg encoder exited with {status}")));
        }
        Ok(())
    }
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, img: &RgbImage) -> Result<()> {
        if img.dimensions() != (self.width, self.height) {
            return Err(Error::msg(format!(
                "Frame is {:?}, encoder expects {}x{}",
                img.dimensions(),
                self.width,
                self.height
            )));
        }

        let input = self
            .input
            .as_mut()
            .ok_or_else(|| Error::msg("Encoder input already closed"))?;
        input
            .write_all(img.as_raw())
            .context("ffmpeg encoder stopped accepting frames")?;

        Ok(())
    }
}

fn stop(proc: &mut Child, name: &str) {
    match proc.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            if let Err(e) = proc.kill() {
                error!("Failed to stop ffmpeg {name}: {e:?}");
            }
            let _ = proc.wait();
        }
    }
}

/// Muxes the audio of `source` into `video`, replacing `video`. Sources
/// without audio leave the video as it is.
pub fn copy_audio(source: &Path, video: &Path) -> Result<()> {
    let muxed = sibling_path(video, "audio");
    let status = Command::new("ffmpeg")
        .args(["-v", "error", "-y", "-nostdin", "-i"])
        .arg(video)
        .arg("-i")
        .arg(source)
        .args([
            "-map", "0:v:0", "-map", "1:a?", "-c", "copy", "-shortest",
        ])
        .arg(&muxed)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .status()
        .context("Failed to run ffmpeg for audio copy")?;

    if !status.success() {
        let _ = std::fs::remove_file(&muxed);
        return Err(Error::msg(format!(
            "Copying audio from {} failed, ffmpeg exited with {status}",
            source.display()
        )));
    }

    std::fs::rename(&muxed, video)
        .with_context(|| format!("Failed to replace {}", video.display()))?;
    Ok(())
}

/// `dir/name.mp4` -> `dir/name.<tag>.mp4`
fn sibling_path(path: &Path, tag: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{tag}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}"),
    };
    path.with_file_name(name)
}
