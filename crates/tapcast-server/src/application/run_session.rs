//! RunSession use case: one controller connection from handshake to close.
//!
//! The streamer runs on its own task while the dispatcher drives the
//! control channel on the caller's task. When the control channel ends or
//! the caller asks for shutdown, streaming is stopped and awaited before the
//! session returns.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::application::dispatch_input::{ChannelError, ControlSource, InputDispatcher, InputInjector};
use crate::application::screen_geometry::ScreenInfoProvider;
use crate::application::stream_video::{
    stop_channel, CaptureBackend, FrameSink, StreamSettings, VideoStreamer,
};

/// Error that ended a session abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("control channel failed: {0}")]
    Control(#[from] ChannelError),
}

/// The capabilities a session is composed from.
#[derive(Clone)]
pub struct Capabilities {
    pub injector: Arc<dyn InputInjector>,
    pub capture: Arc<dyn CaptureBackend>,
    pub screen: Arc<dyn ScreenInfoProvider>,
}

/// Runs one session over an established connection.
///
/// Returns once the controller closes the control channel or `shutdown`
/// completes, whichever comes first. In both cases the streamer task has
/// finished by the time this returns. Streaming failures are logged and do
/// not end the session.
///
/// # Errors
///
/// Returns [`SessionError::Control`] when the control channel fails rather
/// than closes.
pub async fn run_session<S, F>(
    control: &mut S,
    sink: Arc<dyn FrameSink>,
    caps: Capabilities,
    settings: StreamSettings,
    shutdown: F,
) -> Result<(), SessionError>
where
    S: ControlSource + ?Sized,
    F: Future<Output = ()>,
{
    let (stopper, stop) = stop_channel();
    let streamer = VideoStreamer::new(caps.capture, Arc::clone(&caps.screen), sink, settings, stop);
    let streaming = tokio::spawn(streamer.run());

    info!("session started");
    let mut dispatcher = InputDispatcher::new(caps.injector, caps.screen, stopper.clone());
    let result = tokio::select! {
        result = dispatcher.run(control) => result,
        () = shutdown => {
            info!("session shutdown requested");
            Ok(())
        }
    };

    stopper.stop();
    match streaming.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("video streaming terminated: {e}"),
        Err(e) => error!("video streaming task failed: {e}"),
    }
    info!("session ended");

    result.map_err(SessionError::from)
}
