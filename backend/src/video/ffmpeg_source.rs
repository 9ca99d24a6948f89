use image::RgbImage;
use serde::Deserialize;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use super::frame_sampler::{FrameSource, SamplerError};
use crate::config::VideoConfig;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix side data or the
    /// legacy `rotate` tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|side_data| side_data.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0)
    }

    /// Frame size as ffmpeg emits it. Autorotation transposes quarter-turned
    /// streams, so the coded width and height swap.
    fn display_dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => {
                let quarter_turns = (self.rotation() / 90.0).round() as i64;
                if quarter_turns.rem_euclid(2) == 1 {
                    Some((h, w))
                } else {
                    Some((w, h))
                }
            }
            _ => None,
        }
    }
}

pub(crate) fn parse_dimensions(probe_json: &[u8]) -> Result<(u32, u32), SamplerError> {
    let probe: ProbeOutput = serde_json::from_slice(probe_json)
        .map_err(|e| SamplerError::Open(format!("unreadable ffprobe output: {}", e)))?;
    probe
        .streams
        .iter()
        .find_map(ProbeStream::display_dimensions)
        .ok_or_else(|| SamplerError::Open("no video stream found".into()))
}

fn probe_dimensions(ffprobe: &Path, video_path: &Path) -> Result<(u32, u32), SamplerError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:stream_tags=rotate:stream_side_data=rotation",
            "-of",
            "json",
        ])
        .arg(video_path)
        .output()
        .map_err(|e| SamplerError::Open(format!("failed to run {}: {}", ffprobe.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SamplerError::Open(stderr.trim().to_string()));
    }
    parse_dimensions(&output.stdout)
}

/// Decodes a video through an `ffmpeg` child process emitting raw RGB24
/// frames on stdout. The child is killed and reaped when the source drops.
pub struct FfmpegSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    scratch: Vec<u8>,
    frames_read: usize,
}

impl FfmpegSource {
    pub fn open(video_path: &Path, config: &VideoConfig) -> Result<Self, SamplerError> {
        if !video_path.is_file() {
            return Err(SamplerError::Open(format!(
                "{} does not exist",
                video_path.display()
            )));
        }
        let (width, height) = probe_dimensions(&config.ffprobe_path, video_path)?;

        let mut child = Command::new(&config.ffmpeg_path)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(video_path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SamplerError::Open(format!(
                    "failed to run {}: {}",
                    config.ffmpeg_path.display(),
                    e
                ))
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SamplerError::Open("decoder produced no output pipe".into()));
        };

        log::debug!(
            "Opened {} ({}x{}) for frame decoding",
            video_path.display(),
            width,
            height
        );
        let frame_len = width as usize * height as usize * 3;
        Ok(Self {
            child,
            stdout: BufReader::with_capacity(frame_len.min(8 * 1024 * 1024), stdout),
            width,
            height,
            scratch: vec![0u8; frame_len],
            frames_read: 0,
        })
    }

    /// Fills the scratch buffer with one frame. `Ok(false)` on clean end of
    /// stream; a trailing partial frame is also treated as the end.
    fn read_into_scratch(&mut self) -> Result<bool, SamplerError> {
        let mut filled = 0;
        while filled < self.scratch.len() {
            match self.stdout.read(&mut self.scratch[filled..]) {
                Ok(0) => {
                    if filled > 0 {
                        log::warn!(
                            "Discarding truncated frame {} ({} of {} bytes)",
                            self.frames_read,
                            filled,
                            self.scratch.len()
                        );
                    }
                    return Ok(false);
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(SamplerError::Decode {
                        index: self.frames_read,
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.frames_read += 1;
        Ok(true)
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SamplerError> {
        if !self.read_into_scratch()? {
            return Ok(None);
        }
        let index = self.frames_read - 1;
        RgbImage::from_raw(self.width, self.height, self.scratch.clone())
            .map(Some)
            .ok_or_else(|| SamplerError::Decode {
                index,
                reason: "frame buffer size mismatch".into(),
            })
    }

    fn skip_frame(&mut self) -> Result<bool, SamplerError> {
        self.read_into_scratch()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
