use image::imageops::FilterType;
use image::{ImageBuffer, Rgb};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};
use anyhow::{Result, Context, anyhow, bail};
use colored::*;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::CameraConfig;

pub type Frame = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Pause between capture attempts while the camera is failing.
pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(50);

pub trait FrameSource {
    fn name(&self) -> String;
    fn capture(&mut self) -> Result<Frame>;
}

pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    /// Opens the camera and waits for the first decodable frame. Not ready
    /// within `ready_timeout_secs` is a hard failure; nothing retries it.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let cam_index = CameraIndex::Index(config.index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(cam_index, requested).context("Failed to create camera instance")?;

        camera.open_stream().map_err(|e| anyhow!(e)).context("Failed to open camera stream")?;

        let mut source = Self { camera };
        source.wait_ready(Duration::from_secs(config.ready_timeout_secs))?;

        for _ in 0..config.warmup_frames {
            let _ = source.capture();
        }

        println!("{}", format!("Opened camera: {}", source.name()).green());
        println!("Format: {}", source.camera.camera_format());

        Ok(source)
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            match self.capture() {
                Ok(_) => return Ok(()),
                Err(e) if start.elapsed() >= timeout => {
                    bail!("Camera not ready after {}s: {:#}", timeout.as_secs(), e);
                }
                Err(_) => thread::sleep(CAPTURE_RETRY_DELAY),
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.camera.resolution().width()
    }

    pub fn height(&self) -> u32 {
        self.camera.resolution().height()
    }
}

impl FrameSource for CameraSource {
    fn name(&self) -> String {
        self.camera.info().human_name()
    }

    fn capture(&mut self) -> Result<Frame> {
        let frame = self.camera.frame().map_err(|e| anyhow!(e)).context("Failed to get frame")?;
        let decoded = frame.decode_image::<RgbFormat>().map_err(|e| anyhow!(e)).context("Failed to decode frame")?;
        Ok(decoded)
    }
}

/// Blank frames at a fixed rate, for running without a camera.
pub struct BlankFrames {
    width: u32,
    height: u32,
    interval: Duration,
    last: Option<Instant>,
}

impl BlankFrames {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            interval: Duration::from_secs(1) / fps.max(1),
            last: None,
        }
    }
}

impl FrameSource for BlankFrames {
    fn name(&self) -> String {
        format!("Blank {}x{}", self.width, self.height)
    }

    fn capture(&mut self) -> Result<Frame> {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
        Ok(ImageBuffer::new(self.width, self.height))
    }
}

/// Resizes to the detection size and optionally mirrors.
pub fn prepare_frame(frame: Frame, config: &CameraConfig) -> Frame {
    let mut frame = if frame.dimensions() != (config.width, config.height) {
        image::imageops::resize(&frame, config.width, config.height, FilterType::Triangle)
    } else {
        frame
    };
    if config.mirror {
        image::imageops::flip_horizontal_in_place(&mut frame);
    }
    frame
}

/// Tolerates a run of capture failures for a bounded time.
pub struct CaptureRetry {
    limit: Duration,
    failing_since: Option<Instant>,
}

impl CaptureRetry {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            failing_since: None,
        }
    }

    pub fn succeeded(&mut self) {
        self.failing_since = None;
    }

    /// Records a failed capture. Returns `false` once failures have lasted
    /// past the limit; otherwise waits [`CAPTURE_RETRY_DELAY`] and returns `true`.
    pub fn failed(&mut self) -> bool {
        let since = *self.failing_since.get_or_insert_with(Instant::now);
        if since.elapsed() >= self.limit {
            return false;
        }
        thread::sleep(CAPTURE_RETRY_DELAY);
        true
    }
}
