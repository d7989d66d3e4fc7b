use image::DynamicImage;
use rollcall_core::decode::{self, DecodeError};
use rollcall_core::extractor::{self, ExtractError};
use rollcall_core::{Descriptor, FaceLocator, FaceRect, LocatorError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Locator(#[from] LocatorError),
    #[error("descriptor extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// How many faces a frame may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceMode {
    /// Registration: exactly one face, anything else is rejected.
    Single,
    /// Recognition: the largest face is the subject.
    Largest,
}

/// Snapshot payload handed to the engine.
pub enum Input {
    DataUrl(String),
    Bytes(Vec<u8>),
}

/// Result of analysing one frame.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub descriptor: Descriptor,
    pub rect: FaceRect,
    pub candidates: usize,
    /// JPEG re-encoding of the frame, when requested for archiving.
    pub jpeg: Option<Vec<u8>>,
}

/// Messages sent from request handlers to the engine thread.
struct EngineRequest {
    input: Input,
    mode: FaceMode,
    keep_jpeg: bool,
    reply: oneshot::Sender<Result<Analysis, EngineError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode, locate and describe one frame.
    pub async fn analyze(&self, input: Input, mode: FaceMode, keep_jpeg: bool) -> Result<Analysis, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest {
                input,
                mode,
                keep_jpeg,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Detection and HOG extraction are CPU-bound; running them here keeps the
/// async workers free and serializes access to the detector.
pub fn spawn_engine(locator: FaceLocator) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                let result = run_analyze(&locator, req.input, req.mode, req.keep_jpeg);
                let _ = req.reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn run_analyze(
    locator: &FaceLocator,
    input: Input,
    mode: FaceMode,
    keep_jpeg: bool,
) -> Result<Analysis, EngineError> {
    let image = match input {
        Input::DataUrl(url) => decode::decode_data_url(&url)?,
        Input::Bytes(bytes) => image::load_from_memory(&bytes).map_err(DecodeError::from)?,
    };
    analyze_image(locator, &image, mode, keep_jpeg)
}

/// Locate and describe the subject of an already decoded frame.
pub fn analyze_image(
    locator: &FaceLocator,
    image: &DynamicImage,
    mode: FaceMode,
    keep_jpeg: bool,
) -> Result<Analysis, EngineError> {
    let located = match mode {
        FaceMode::Single => locator.locate_single(image)?,
        FaceMode::Largest => locator.locate(image)?,
    };
    let descriptor = extractor::extract(&located.patch)?;

    tracing::debug!(
        rect = ?located.rect,
        candidates = located.candidates,
        ?mode,
        "frame analysed"
    );

    let jpeg = if keep_jpeg {
        Some(decode::encode_jpeg(image)?)
    } else {
        None
    };

    Ok(Analysis {
        descriptor,
        rect: located.rect,
        candidates: located.candidates,
        jpeg,
    })
}
