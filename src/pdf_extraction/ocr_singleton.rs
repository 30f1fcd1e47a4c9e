// Process-wide OCR engine handle: built lazily once, never rebuilt, never torn down
use once_cell::sync::OnceCell;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info};

use super::ocr_engine::{OcrEngine, PaddleOcrEngine};
use crate::config::OcrConfig;
use crate::types::OcrError;

type EngineFactory = Box<dyn Fn() -> Result<Box<dyn OcrEngine>, OcrError> + Send + Sync>;

/// Owns the single OCR engine for the application.
///
/// The first call to [`OcrEngineHandle::lock`] runs the factory. A failed construction is
/// remembered: the handle stays empty and the factory is never run again. The engine is not
/// reentrant, so every caller goes through one mutex.
pub struct OcrEngineHandle {
    cell: OnceCell<Option<Mutex<Box<dyn OcrEngine>>>>,
    factory: EngineFactory,
}

impl OcrEngineHandle {
    pub fn new<F, E>(factory: F) -> Self
    where
        F: Fn() -> Result<E, OcrError> + Send + Sync + 'static,
        E: OcrEngine + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(move || factory().map(|engine| Box::new(engine) as Box<dyn OcrEngine>)),
        }
    }

    /// Handle backed by the ONNX models named in `config`
    pub fn from_config(config: OcrConfig) -> Self {
        Self::new(move || PaddleOcrEngine::load(&config))
    }

    /// Handle for an engine that is already built
    pub fn with_engine<E: OcrEngine + 'static>(engine: E) -> Self {
        let engine: Box<dyn OcrEngine> = Box::new(engine);
        let handle = Self {
            cell: OnceCell::new(),
            factory: Box::new(|| Err(OcrError::Inference("engine was supplied prebuilt".into()))),
        };
        let _ = handle.cell.set(Some(Mutex::new(engine)));
        handle
    }

    /// Handle whose engine can never be built
    pub fn unavailable() -> Self {
        let handle = Self {
            cell: OnceCell::new(),
            factory: Box::new(|| Err(OcrError::Inference("no OCR engine configured".into()))),
        };
        let _ = handle.cell.set(None);
        handle
    }

    /// Build the engine on first use. Returns false if construction failed, now or earlier.
    pub fn ensure_initialized(&self) -> bool {
        self.slot().is_some()
    }

    /// True once construction has been attempted, whatever the outcome
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Exclusive access to the engine, or `None` when it is unavailable.
    pub fn lock(&self) -> Option<MutexGuard<'_, Box<dyn OcrEngine>>> {
        // a panic mid-recognition leaves the engine state unknown; treat it as gone
        self.slot()?.lock().ok()
    }

    fn slot(&self) -> Option<&Mutex<Box<dyn OcrEngine>>> {
        self.cell
            .get_or_init(|| match (self.factory)() {
                Ok(engine) => {
                    info!("OCR engine initialized");
                    Some(Mutex::new(engine))
                }
                Err(err) => {
                    error!(error = %err, "OCR engine initialization failed; OCR disabled for this process");
                    None
                }
            })
            .as_ref()
    }
}
