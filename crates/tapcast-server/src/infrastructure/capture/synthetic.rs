//! Synthetic capture backend.
//!
//! Produces an H.264-shaped packet stream without touching a display: one
//! configuration packet, then pictures paced at the requested frame rate,
//! with a key frame every `i_frame_interval_secs`. Payloads are tiny
//! Annex-B units carrying the frame index, which is enough for a controller
//! to exercise its framing and timing paths.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::application::stream_video::{
    CaptureBackend, CaptureError, CaptureRequest, CaptureSession, EncodedFrame,
};

const START_CODE: [u8; 4] = [0, 0, 0, 1];
const NAL_SPS: u8 = 0x67;
const NAL_IDR: u8 = 0x65;
const NAL_SLICE: u8 = 0x41;

/// Capture backend that synthesizes frames.
#[derive(Debug, Default)]
pub struct SyntheticCapture;

impl SyntheticCapture {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaptureBackend for SyntheticCapture {
    async fn start_session(
        &self,
        request: &CaptureRequest,
    ) -> Result<Box<dyn CaptureSession>, CaptureError> {
        if request.crop.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "empty capture region {:?}",
                request.crop
            )));
        }
        debug!(crop = ?request.crop, layer_stack = request.layer_stack, "synthetic capture session opened");
        Ok(Box::new(SyntheticSession::new(request)))
    }
}

struct SyntheticSession {
    width: u16,
    height: u16,
    key_frame_every: u64,
    ticker: Interval,
    origin: Instant,
    sent_config: bool,
    index: u64,
}

impl SyntheticSession {
    fn new(request: &CaptureRequest) -> Self {
        let fps = request.encoder.max_fps.max(1);
        let mut ticker = interval(Duration::from_secs(1) / fps);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let size = request.crop.size();
        Self {
            width: u16::try_from(size.width).unwrap_or(u16::MAX),
            height: u16::try_from(size.height).unwrap_or(u16::MAX),
            key_frame_every: u64::from(fps) * u64::from(request.encoder.i_frame_interval_secs.max(1)),
            ticker,
            origin: Instant::now(),
            sent_config: false,
            index: 0,
        }
    }

    fn config_packet(&self) -> Vec<u8> {
        let mut data = START_CODE.to_vec();
        data.push(NAL_SPS);
        data.extend_from_slice(&self.width.to_be_bytes());
        data.extend_from_slice(&self.height.to_be_bytes());
        data
    }

    fn picture_packet(&self) -> Vec<u8> {
        let nal = if self.index % self.key_frame_every == 0 {
            NAL_IDR
        } else {
            NAL_SLICE
        };
        let mut data = START_CODE.to_vec();
        data.push(nal);
        data.extend_from_slice(&self.index.to_be_bytes());
        data
    }
}

#[async_trait]
impl CaptureSession for SyntheticSession {
    async fn next_frame(&mut self) -> Result<EncodedFrame, CaptureError> {
        if !self.sent_config {
            self.sent_config = true;
            return Ok(EncodedFrame::config(self.config_packet()));
        }
        let tick = self.ticker.tick().await;
        let pts_us = i64::try_from(tick.duration_since(self.origin).as_micros()).unwrap_or(i64::MAX);
        let frame = EncodedFrame::picture(pts_us, self.picture_packet());
        self.index += 1;
        Ok(frame)
    }

    fn end(&mut self) {
        debug!(frames = self.index, "synthetic capture session released");
    }
}
