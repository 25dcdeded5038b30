//! Camera collaborator.
//!
//! A device hands out a [`VideoStream`]; [`CameraCapture`] owns that stream
//! and stops it when the capture is closed, when a photo is taken, or when
//! the guard is dropped for any other reason.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::DeviceError;
use crate::request::InlineImage;

pub const CAPTURE_MIME: &str = "image/jpeg";

/// How long a photo waits for the device to deliver a frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// A still photo, serialized as a JPEG data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    data_uri: String,
}

impl CapturedImage {
    pub fn from_jpeg(bytes: &[u8]) -> Self {
        Self {
            data_uri: InlineImage::from_bytes(CAPTURE_MIME, bytes).to_data_uri(),
        }
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

/// A live video source.
#[async_trait]
pub trait VideoStream: Send {
    /// The most recent complete JPEG frame.
    async fn grab_frame(&mut self) -> Result<Vec<u8>, DeviceError>;

    /// Release the device. Must be idempotent.
    fn stop(&mut self);
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn VideoStream>, DeviceError>;
}

/// Scoped ownership of an acquired camera stream.
pub struct CameraCapture {
    stream: Option<Box<dyn VideoStream>>,
}

impl CameraCapture {
    pub async fn open(device: &dyn CameraDevice) -> Result<Self, DeviceError> {
        let stream = device.acquire().await?;
        tracing::info!("camera acquired");
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Grab one frame and release the camera, whatever the outcome.
    pub async fn take_photo(self) -> Result<CapturedImage, DeviceError> {
        self.take_photo_within(FRAME_TIMEOUT).await
    }

    async fn take_photo_within(mut self, limit: Duration) -> Result<CapturedImage, DeviceError> {
        let frame = match self.stream.as_mut() {
            Some(stream) => match tokio::time::timeout(limit, stream.grab_frame()).await {
                Ok(frame) => frame,
                Err(_) => {
                    tracing::warn!(timeout_ms = limit.as_millis() as u64, "camera delivered no frame");
                    Err(DeviceError::StreamEnded)
                }
            },
            None => Err(DeviceError::StreamEnded),
        };
        self.release();
        let frame = frame?;
        tracing::info!(byte_len = frame.len(), "photo captured");
        Ok(CapturedImage::from_jpeg(&frame))
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            tracing::info!("camera released");
        }
    }
}

impl std::fmt::Debug for CameraCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCapture")
            .field("active", &self.stream.is_some())
            .finish()
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera backed by a capture program (ffmpeg) reading a V4L2 device and
/// writing an MJPEG stream to stdout.
pub struct CommandCamera {
    program: String,
    device: String,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            device: device.into(),
        }
    }

    fn args(&self) -> Vec<&str> {
        vec![
            "-loglevel", "error", "-f", "v4l2", "-i", &self.device, "-f", "mjpeg", "-q:v", "3",
            "pipe:1",
        ]
    }
}

#[async_trait]
impl CameraDevice for CommandCamera {
    async fn acquire(&self) -> Result<Box<dyn VideoStream>, DeviceError> {
        if !Path::new(&self.device).exists() {
            return Err(DeviceError::Unavailable(format!("{} not found", self.device)));
        }

        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeviceError::Unavailable(format!("{}: {e}", self.program)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DeviceError::Unavailable("capture program has no stdout".to_string()))?;

        let (frames_tx, frames_rx) = watch::channel(None);
        let reader = tokio::spawn(async move {
            let mut buffer = Vec::new();
            let mut chunk = [0u8; 16 * 1024];
            loop {
                match stdout.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        buffer.extend_from_slice(&chunk[..n]);
                        while let Some(frame) = take_jpeg_frame(&mut buffer) {
                            frames_tx.send_replace(Some(frame));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "camera read failed");
                        break;
                    }
                }
            }
        });

        tracing::debug!(device = %self.device, program = %self.program, "capture program spawned");
        Ok(Box::new(MjpegStream {
            child,
            reader,
            frames: frames_rx,
        }))
    }
}

struct MjpegStream {
    child: Child,
    reader: JoinHandle<()>,
    frames: watch::Receiver<Option<Vec<u8>>>,
}

#[async_trait]
impl VideoStream for MjpegStream {
    async fn grab_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
        let frame = self
            .frames
            .wait_for(|frame| frame.is_some())
            .await
            .map_err(|_| DeviceError::StreamEnded)?;
        frame.clone().ok_or(DeviceError::StreamEnded)
    }

    fn stop(&mut self) {
        self.reader.abort();
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "capture program already exited");
        }
    }
}

/// Pop the first complete JPEG (SOI..EOI) off the front of `buffer`.
fn take_jpeg_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8]);
    let Some(start) = start else {
        // keep a trailing 0xFF, it may be the first half of the next SOI
        let keep = usize::from(buffer.last() == Some(&0xFF));
        buffer.drain(..buffer.len() - keep);
        return None;
    };

    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])
        .map(|i| start + 2 + i + 2)?;

    let frame = buffer[start..end].to_vec();
    buffer.drain(..end);
    Some(frame)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory camera that counts how often its stream is stopped.
    #[derive(Clone, Default)]
    pub struct FakeCamera {
        pub stops: Arc<AtomicUsize>,
        pub fail_acquire: bool,
        pub fail_frame: bool,
        /// The device never delivers a frame.
        pub stall_frame: bool,
    }

    impl FakeCamera {
        pub fn stop_count(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    struct FakeStream {
        stops: Arc<AtomicUsize>,
        stopped: bool,
        fail_frame: bool,
        stall_frame: bool,
    }

    #[async_trait]
    impl VideoStream for FakeStream {
        async fn grab_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
            if self.stall_frame {
                std::future::pending::<()>().await;
            }
            if self.fail_frame {
                Err(DeviceError::StreamEnded)
            } else {
                Ok(vec![0xFF, 0xD8, 0x01, 0xFF, 0xD9])
            }
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl CameraDevice for FakeCamera {
        async fn acquire(&self) -> Result<Box<dyn VideoStream>, DeviceError> {
            if self.fail_acquire {
                return Err(DeviceError::Unavailable("permission denied".to_string()));
            }
            Ok(Box::new(FakeStream {
                stops: Arc::clone(&self.stops),
                stopped: false,
                fail_frame: self.fail_frame,
                stall_frame: self.stall_frame,
            }))
        }
    }
}
