//! Background deck export with cooperative cancellation.
//!
//! The exporter polls an abort flag between cards, so a cancelled job stops
//! at the next card boundary and the report says how far it got.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::{
    data::deck::Deck,
    export::deck::{ExportReport, export_deck},
    foundation::error::{CardsmithError, CardsmithResult},
    layout::LayoutDocument,
    render::compositor::Compositor,
};

pub struct RenderJob {
    abort: Arc<AtomicBool>,
    handle: JoinHandle<CardsmithResult<ExportReport>>,
}

impl RenderJob {
    /// Request cancellation. Takes effect at the next card boundary.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> CardsmithResult<ExportReport> {
        self.handle
            .join()
            .map_err(|_| CardsmithError::render("export worker panicked"))?
    }
}

/// Run a deck export on a worker thread. The document and deck are moved
/// in, so the caller can keep editing its own copies while the job runs.
pub fn spawn_export(
    doc: LayoutDocument,
    deck: Deck,
    mut compositor: Compositor,
    export_dir: PathBuf,
) -> RenderJob {
    let abort = Arc::new(AtomicBool::new(false));
    let worker_abort = Arc::clone(&abort);
    let handle = std::thread::spawn(move || {
        export_deck(
            &doc,
            &deck,
            &mut compositor,
            &export_dir,
            &worker_abort,
            |_, _, _| {},
        )
    });
    RenderJob { abort, handle }
}
