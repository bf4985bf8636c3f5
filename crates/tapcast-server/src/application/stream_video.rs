//! StreamVideo use case: pulls encoded packets from a capture backend and
//! frames them onto the connection.
//!
//! One capture session runs at a time. A session ends when the backend
//! reports end-of-stream (a device rotation surfaces this way) or fails; the
//! streamer then starts a fresh session after a backoff. Once stopped, the
//! streamer returns and never captures again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tapcast_core::protocol::video::{FrameHeader, PtsRebaser};
use tapcast_core::{Rect, Size};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::screen_geometry::ScreenInfoProvider;

/// Error raised by a capture backend or one of its sessions.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture backend unavailable: {0}")]
    Unavailable(String),
    #[error("encoder failure: {0}")]
    Encoder(String),
}

/// Error that ends the streamer for good.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to write video frame: {0}")]
    Sink(#[from] std::io::Error),
    #[error("encoded packet of {0} bytes does not fit a frame header")]
    FrameTooLarge(usize),
}

/// Encoder parameters passed to every capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Target bit rate in bits per second.
    pub bit_rate: u32,
    pub max_fps: u32,
    /// Seconds between key frames.
    pub i_frame_interval_secs: u32,
    /// Re-emit the last picture when the screen is static for this long.
    pub repeat_previous_frame_after_us: u64,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            bit_rate: 8_000_000,
            max_fps: 60,
            i_frame_interval_secs: 10,
            repeat_previous_frame_after_us: 100_000,
        }
    }
}

/// Everything a backend needs to open a virtual display and an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Region of the video to capture; both dimensions are multiples of 8.
    pub crop: Rect,
    /// Video size the crop is taken from.
    pub video_size: Size,
    pub layer_stack: u32,
    pub encoder: EncoderSettings,
}

/// One packet produced by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Encoder timestamp in microseconds.
    pub pts_us: i64,
    pub data: Vec<u8>,
    /// Codec configuration data (SPS/PPS) rather than a picture.
    pub is_config: bool,
    /// Last packet of the session.
    pub is_end_of_stream: bool,
}

impl EncodedFrame {
    pub fn config(data: Vec<u8>) -> Self {
        Self {
            pts_us: 0,
            data,
            is_config: true,
            is_end_of_stream: false,
        }
    }

    pub fn picture(pts_us: i64, data: Vec<u8>) -> Self {
        Self {
            pts_us,
            data,
            is_config: false,
            is_end_of_stream: false,
        }
    }

    pub fn end_of_stream() -> Self {
        Self {
            pts_us: 0,
            data: Vec::new(),
            is_config: false,
            is_end_of_stream: true,
        }
    }
}

/// Screen capture and encoding capability.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Opens a virtual display mirroring `request.layer_stack`, projects
    /// `request.crop` onto an encoder surface and starts encoding.
    async fn start_session(
        &self,
        request: &CaptureRequest,
    ) -> Result<Box<dyn CaptureSession>, CaptureError>;
}

/// A running capture session.
#[async_trait]
pub trait CaptureSession: Send {
    /// Waits for the next encoded packet.
    async fn next_frame(&mut self) -> Result<EncodedFrame, CaptureError>;

    /// Releases the virtual display, the encoder and its input surface.
    fn end(&mut self);
}

/// Outbound half of the connection, as seen by the streamer.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Writes `header` followed by `payload`. No other frame may be written
    /// between the two.
    async fn send_frame(&self, header: FrameHeader, payload: &[u8]) -> std::io::Result<()>;
}

// ── Stop signal ───────────────────────────────────────────────────────────────

/// Creates a linked stopper/signal pair.
pub fn stop_channel() -> (StreamStopper, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StreamStopper { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Requests the streamer to stop. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct StreamStopper {
    tx: Arc<watch::Sender<bool>>,
}

impl StreamStopper {
    /// Returns `true` if this call is the one that stopped streaming.
    pub fn stop(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observed by the streamer at every frame-dequeue boundary.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&mut self) {
        let closed = self.rx.wait_for(|stopped| *stopped).await.is_err();
        if closed {
            // every stopper is gone; nobody can stop us any more
            std::future::pending::<()>().await;
        }
    }
}

// ── Streamer ──────────────────────────────────────────────────────────────────

/// Streaming behaviour that does not change between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Region to capture; `None` captures the whole video.
    pub crop: Option<Rect>,
    pub encoder: EncoderSettings,
    /// Delay before the first restart of a failing capture.
    pub restart_backoff: Duration,
    /// Upper bound for the doubling restart delay.
    pub max_restart_backoff: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            crop: None,
            encoder: EncoderSettings::default(),
            restart_backoff: Duration::from_millis(100),
            max_restart_backoff: Duration::from_secs(2),
        }
    }
}

enum SessionEnd {
    Stopped,
    Finished { frames: u64 },
}

/// The capture loop. Consumed by [`run`](Self::run).
pub struct VideoStreamer {
    capture: Arc<dyn CaptureBackend>,
    screen: Arc<dyn ScreenInfoProvider>,
    sink: Arc<dyn FrameSink>,
    settings: StreamSettings,
    stop: StopSignal,
}

impl VideoStreamer {
    pub fn new(
        capture: Arc<dyn CaptureBackend>,
        screen: Arc<dyn ScreenInfoProvider>,
        sink: Arc<dyn FrameSink>,
        settings: StreamSettings,
        stop: StopSignal,
    ) -> Self {
        Self {
            capture,
            screen,
            sink,
            settings,
            stop,
        }
    }

    /// Builds the request for a new session from the current screen geometry.
    pub fn capture_request(&self) -> CaptureRequest {
        let video_size = self.screen.screen_info().video_size();
        let crop = self
            .settings
            .crop
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| Rect::from_size(video_size));
        CaptureRequest {
            crop: align_crop(crop),
            video_size,
            layer_stack: self.screen.layer_stack(),
            encoder: self.settings.encoder.clone(),
        }
    }

    /// Streams until stopped.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] when a frame cannot be written; capture
    /// failures only trigger a restart.
    pub async fn run(mut self) -> Result<(), StreamError> {
        info!("video streaming started");
        let mut backoff = self.settings.restart_backoff;

        while !self.stop.is_stopped() {
            let request = self.capture_request();
            debug!(crop = ?request.crop, video_size = %request.video_size, "starting capture session");

            let frames = match self.capture.start_session(&request).await {
                Ok(session) => match self.stream_session(session).await? {
                    SessionEnd::Stopped => break,
                    SessionEnd::Finished { frames } => frames,
                },
                Err(e) => {
                    warn!("failed to start capture session: {e}");
                    0
                }
            };

            if frames > 0 {
                backoff = self.settings.restart_backoff;
            }
            info!(delay_ms = backoff.as_millis() as u64, "restarting capture session");
            tokio::select! {
                biased;
                _ = self.stop.stopped() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            if frames == 0 {
                backoff = (backoff * 2).min(self.settings.max_restart_backoff);
            }
        }

        info!("video streaming stopped");
        Ok(())
    }

    async fn stream_session(
        &mut self,
        mut session: Box<dyn CaptureSession>,
    ) -> Result<SessionEnd, StreamError> {
        let result = self.pump(session.as_mut()).await;
        session.end();
        result
    }

    async fn pump(&mut self, session: &mut dyn CaptureSession) -> Result<SessionEnd, StreamError> {
        let mut rebaser = PtsRebaser::new();
        let mut frames = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.stop.stopped() => return Ok(SessionEnd::Stopped),
                next = session.next_frame() => next,
            };
            let frame = match next {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(frames, "capture session failed: {e}");
                    return Ok(SessionEnd::Finished { frames });
                }
            };

            if !frame.data.is_empty() || !frame.is_end_of_stream {
                let len = u32::try_from(frame.data.len())
                    .map_err(|_| StreamError::FrameTooLarge(frame.data.len()))?;
                let header = FrameHeader {
                    pts: rebaser.rebase(frame.pts_us, frame.is_config),
                    len,
                };
                self.sink.send_frame(header, &frame.data).await?;
                frames += 1;
            }

            if frame.is_end_of_stream {
                info!(frames, "capture session reached end of stream");
                return Ok(SessionEnd::Finished { frames });
            }
        }
    }
}

/// Shrinks `crop` so both dimensions are multiples of 8, keeping its
/// top-left corner.
fn align_crop(crop: Rect) -> Rect {
    Rect::new(
        crop.left,
        crop.top,
        crop.left + (crop.width() & !7),
        crop.top + (crop.height() & !7),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::screen_geometry::MockScreenInfoProvider;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tapcast_core::{DisplayInfo, ScreenInfo};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    // ── Fakes ─────────────────────────────────────────────────────────────────

    struct ChannelSink(mpsc::UnboundedSender<(FrameHeader, Vec<u8>)>);

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_frame(&self, header: FrameHeader, payload: &[u8]) -> std::io::Result<()> {
            self.0
                .send((header, payload.to_vec()))
                .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    struct QueueSession(VecDeque<EncodedFrame>);

    #[async_trait]
    impl CaptureSession for QueueSession {
        async fn next_frame(&mut self) -> Result<EncodedFrame, CaptureError> {
            match self.0.pop_front() {
                Some(frame) => Ok(frame),
                None => std::future::pending().await,
            }
        }

        fn end(&mut self) {}
    }

    /// Serves one queued session per start; fails once the queue is empty.
    struct QueueBackend {
        sessions: Mutex<VecDeque<Vec<EncodedFrame>>>,
        starts: mpsc::UnboundedSender<(Instant, CaptureRequest)>,
    }

    #[async_trait]
    impl CaptureBackend for QueueBackend {
        async fn start_session(
            &self,
            request: &CaptureRequest,
        ) -> Result<Box<dyn CaptureSession>, CaptureError> {
            let _ = self.starts.send((Instant::now(), request.clone()));
            match self.sessions.lock().unwrap().pop_front() {
                Some(frames) => Ok(Box::new(QueueSession(frames.into()))),
                None => Err(CaptureError::Unavailable("no display".into())),
            }
        }
    }

    fn screen(width: u32, height: u32) -> Arc<MockScreenInfoProvider> {
        let info = ScreenInfo::compute(
            &DisplayInfo { size: Size::new(width, height), rotation: 0, layer_stack: 0 },
            None,
            None,
        );
        let mut mock = MockScreenInfoProvider::new();
        mock.expect_screen_info().return_const(info);
        mock.expect_layer_stack().return_const(7u32);
        Arc::new(mock)
    }

    struct Harness {
        frames: mpsc::UnboundedReceiver<(FrameHeader, Vec<u8>)>,
        starts: mpsc::UnboundedReceiver<(Instant, CaptureRequest)>,
        stopper: StreamStopper,
        streamer: VideoStreamer,
    }

    fn harness(sessions: Vec<Vec<EncodedFrame>>, settings: StreamSettings) -> Harness {
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (start_tx, starts) = mpsc::unbounded_channel();
        let (stopper, stop) = stop_channel();
        let backend = QueueBackend { sessions: Mutex::new(sessions.into()), starts: start_tx };
        let streamer = VideoStreamer::new(
            Arc::new(backend),
            screen(1080, 1920),
            Arc::new(ChannelSink(frame_tx)),
            settings,
            stop,
        );
        Harness { frames, starts, stopper, streamer }
    }

    // ── Capture request ───────────────────────────────────────────────────────

    #[test]
    fn test_capture_request_defaults_to_full_video() {
        let h = harness(Vec::new(), StreamSettings::default());

        let request = h.streamer.capture_request();

        assert_eq!(request.crop, Rect::new(0, 0, 1080, 1920));
        assert_eq!(request.video_size, Size::new(1080, 1920));
        assert_eq!(request.layer_stack, 7);
        assert_eq!(request.encoder.bit_rate, 8_000_000);
    }

    #[test]
    fn test_capture_request_rounds_explicit_crop_down_to_multiple_of_8() {
        let settings = StreamSettings {
            crop: Some(Rect::new(10, 20, 110, 70)),
            ..StreamSettings::default()
        };
        let h = harness(Vec::new(), settings);

        let request = h.streamer.capture_request();

        assert_eq!(request.crop, Rect::new(10, 20, 106, 68));
    }

    #[test]
    fn test_capture_request_ignores_empty_crop() {
        let settings = StreamSettings {
            crop: Some(Rect::default()),
            ..StreamSettings::default()
        };
        let h = harness(Vec::new(), settings);

        assert_eq!(h.streamer.capture_request().crop, Rect::new(0, 0, 1080, 1920));
    }

    // ── Streaming loop ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_rebased_per_session_and_restarted_after_eos() {
        // Arrange
        let sessions = vec![
            vec![
                EncodedFrame::config(vec![0xC0]),
                EncodedFrame::picture(1_000_000, vec![1]),
                EncodedFrame::picture(1_016_000, vec![2]),
                EncodedFrame::end_of_stream(),
            ],
            vec![EncodedFrame::picture(5_000, vec![3])],
        ];
        let mut h = harness(sessions, StreamSettings::default());
        let task = tokio::spawn(h.streamer.run());

        // Act
        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(h.frames.recv().await.unwrap());
        }
        h.stopper.stop();
        task.await.unwrap().unwrap();

        // Assert
        let pts: Vec<i64> = received.iter().map(|(header, _)| header.pts).collect();
        assert_eq!(pts, vec![-1, 0, 16_000, 0]);
        assert!(received.iter().all(|(header, data)| header.len as usize == data.len()));
        assert_eq!(received[3].1, vec![3]);
    }

    #[tokio::test]
    async fn test_stop_before_run_captures_nothing() {
        let mut h = harness(vec![vec![EncodedFrame::picture(1, vec![1])]], StreamSettings::default());
        h.stopper.stop();

        h.streamer.run().await.unwrap();

        assert!(h.starts.try_recv().is_err(), "no session may start after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_starts_back_off_exponentially_until_cap() {
        // Arrange
        let settings = StreamSettings {
            restart_backoff: Duration::from_millis(100),
            max_restart_backoff: Duration::from_millis(300),
            ..StreamSettings::default()
        };
        let mut h = harness(Vec::new(), settings);
        let task = tokio::spawn(h.streamer.run());

        // Act
        let mut at = Vec::new();
        for _ in 0..4 {
            at.push(h.starts.recv().await.unwrap().0);
        }
        h.stopper.stop();
        task.await.unwrap().unwrap();

        // Assert
        let gaps: Vec<u128> = at.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
        assert_eq!(gaps, vec![100, 200, 300]);
    }

    #[test]
    fn test_stopper_reports_first_stop_only() {
        let (stopper, signal) = stop_channel();

        assert!(stopper.stop());
        assert!(!stopper.stop());
        assert!(signal.is_stopped());
    }
}
