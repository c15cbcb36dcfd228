use crate::core::{PlateError, PlateResult};
use crate::video::Frame;
use image::RgbImage;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Where frames come from: a video file or a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    File(PathBuf),
    Device(String),
}

impl VideoSource {
    /// Digits ("0"), `/dev/...` paths and dshow names ("video=...") are
    /// devices; anything else is a file.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let is_device = (!input.is_empty() && input.chars().all(|c| c.is_ascii_digit()))
            || input.starts_with("/dev/")
            || input.starts_with("video=");
        if is_device {
            VideoSource::Device(input.to_string())
        } else {
            VideoSource::File(PathBuf::from(input))
        }
    }

    /// ffmpeg/ffprobe arguments selecting this source as input.
    fn input_args(&self) -> Vec<String> {
        match self {
            VideoSource::File(path) => vec!["-i".to_string(), path.to_string_lossy().into_owned()],
            VideoSource::Device(device) => {
                let (format, name) = if cfg!(target_os = "windows") {
                    let name = if device.starts_with("video=") {
                        device.clone()
                    } else {
                        format!("video={}", device)
                    };
                    ("dshow", name)
                } else if cfg!(target_os = "macos") {
                    ("avfoundation", device.clone())
                } else if device.chars().all(|c| c.is_ascii_digit()) {
                    ("v4l2", format!("/dev/video{}", device))
                } else {
                    ("v4l2", device.clone())
                };
                vec!["-f".to_string(), format.to_string(), "-i".to_string(), name]
            }
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::File(path) => write!(f, "{}", path.display()),
            VideoSource::Device(device) => write!(f, "device {}", device),
        }
    }
}

/// An open stream of frames. Holds the underlying resource until released.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream is exhausted.
    fn read(&mut self) -> PlateResult<Option<Frame>>;

    /// Gives the resource back. Must be safe to call more than once.
    fn release(&mut self);
}

pub trait SourceOpener: Send + Sync {
    fn open(&self, source: &VideoSource) -> PlateResult<Box<dyn FrameSource>>;
}

/// Opens sources by piping raw RGB frames out of an ffmpeg child process.
pub struct FfmpegOpener {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegOpener {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn probe_dimensions(&self, source: &VideoSource) -> PlateResult<(u32, u32)> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-select_streams", "v:0"])
            .args(source.input_args())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| PlateError::source_unavailable(source.to_string(), format!("ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(PlateError::source_unavailable(
                source.to_string(),
                format!("ffprobe exited with {}", output.status),
            ));
        }

        parse_probe_dimensions(&output.stdout)
            .ok_or_else(|| PlateError::source_unavailable(source.to_string(), "no video stream found"))
    }
}

fn parse_probe_dimensions(probe_json: &[u8]) -> Option<(u32, u32)> {
    let json: serde_json::Value = serde_json::from_slice(probe_json).ok()?;
    let stream = json["streams"]
        .as_array()?
        .iter()
        .find(|s| s["codec_type"] == "video")?;
    let width = stream["width"].as_u64()? as u32;
    let height = stream["height"].as_u64()? as u32;
    if width == 0 || height == 0 {
        return None;
    }
    // ffmpeg autorotates, so quarter turns swap the output dimensions.
    if stream_rotation(stream).rem_euclid(180) == 90 {
        Some((height, width))
    } else {
        Some((width, height))
    }
}

/// Rotation in degrees from display matrix side data or the legacy `rotate` tag.
fn stream_rotation(stream: &serde_json::Value) -> i64 {
    let side_data = stream["side_data_list"]
        .as_array()
        .and_then(|list| list.iter().find_map(|entry| entry["rotation"].as_i64()));
    let tag = stream["tags"]["rotate"].as_str().and_then(|r| r.trim().parse::<i64>().ok());
    side_data.or(tag).unwrap_or(0)
}

impl SourceOpener for FfmpegOpener {
    fn open(&self, source: &VideoSource) -> PlateResult<Box<dyn FrameSource>> {
        if let VideoSource::File(path) = source {
            if !Path::new(path).is_file() {
                return Err(PlateError::source_unavailable(source.to_string(), "file not found"));
            }
        }

        let (width, height) = self.probe_dimensions(source)?;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(source.input_args())
            .args([
                "-f", "rawvideo",   // Raw video output for streaming
                "-pix_fmt", "rgb24",
            ])
            .arg("-s").arg(format!("{}x{}", width, height)) // Frame size read() expects
            .args([
                "-an",              // No audio
                "-v", "quiet",
                "-",                // Output to stdout
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| PlateError::source_unavailable(source.to_string(), format!("ffmpeg: {}", e)))?;
        let stdout = child.stdout.take();

        log::info!("Opened {} ({}x{})", source, width, height);
        Ok(Box::new(FfmpegSource {
            description: source.to_string(),
            child: Some(child),
            stdout,
            width,
            height,
            next_index: 0,
        }))
    }
}

pub struct FfmpegSource {
    description: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    width: u32,
    height: u32,
    next_index: u64,
}

impl FrameSource for FfmpegSource {
    fn read(&mut self) -> PlateResult<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let frame_size = (self.width * self.height * 3) as usize;
        let mut frame_data = vec![0u8; frame_size];
        match stdout.read_exact(&mut frame_data) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(PlateError::Io(e)),
        }

        let image = RgbImage::from_raw(self.width, self.height, frame_data)
            .ok_or_else(|| PlateError::source_unavailable(self.description.clone(), "short frame buffer"))?;
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.stdout = None;
        if let Some(mut process) = self.child.take() {
            let _ = process.kill();
            let _ = process.wait();
            log::info!("Released {}", self.description);
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}
