//! Scripted capture backend for tests.
//!
//! Each call to `start_session` takes the next script from a queue and
//! replays it step by step. Once a script runs out, the session waits
//! forever, like an encoder on a static screen. When no scripts are left, new
//! sessions are idle from the start.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::application::stream_video::{
    CaptureBackend, CaptureError, CaptureRequest, CaptureSession, EncodedFrame,
};

/// One step of a scripted session.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Frame(EncodedFrame),
    /// The encoder fails with this message.
    Fail(String),
}

/// Capture backend that replays scripted sessions.
#[derive(Debug, Default)]
pub struct ScriptedCaptureBackend {
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Mutex<Vec<CaptureRequest>>,
    ended: Arc<AtomicUsize>,
}

impl ScriptedCaptureBackend {
    pub fn new(scripts: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        }
    }

    /// Every request a session was started with, in order.
    pub fn requests(&self) -> Vec<CaptureRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of sessions that have been ended.
    pub fn sessions_ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for ScriptedCaptureBackend {
    async fn start_session(
        &self,
        request: &CaptureRequest,
    ) -> Result<Box<dyn CaptureSession>, CaptureError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let steps = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(ScriptedSession {
            steps: steps.into(),
            ended: Arc::clone(&self.ended),
        }))
    }
}

struct ScriptedSession {
    steps: VecDeque<ScriptStep>,
    ended: Arc<AtomicUsize>,
}

#[async_trait]
impl CaptureSession for ScriptedSession {
    async fn next_frame(&mut self) -> Result<EncodedFrame, CaptureError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(frame)) => Ok(frame),
            Some(ScriptStep::Fail(msg)) => Err(CaptureError::Encoder(msg)),
            None => std::future::pending().await,
        }
    }

    fn end(&mut self) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}
