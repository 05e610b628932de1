//! Batch card export. One bad card records a failure and the batch keeps
//! going; the report says exactly what was written and what was not.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    data::deck::{Deck, slugify_card_name},
    export::png::write_png_with_dpi,
    foundation::error::{CardsmithError, CardsmithResult},
    layout::LayoutDocument,
    project::project,
    render::compositor::Compositor,
};

#[derive(Clone, Debug)]
pub struct CardFailure {
    pub index: usize,
    pub name: String,
    pub error: String,
}

#[derive(Clone, Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<CardFailure>,
    pub aborted: bool,
}

impl ExportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }
}

/// Render every card in the deck to `export_dir`.
///
/// The abort flag is polled between cards; cards already written stay on
/// disk. `progress` receives (finished, total, path) after each card.
#[tracing::instrument(skip_all, fields(deck = %deck.name, cards = deck.cards.len()))]
pub fn export_deck<F>(
    doc: &LayoutDocument,
    deck: &Deck,
    compositor: &mut Compositor,
    export_dir: &Path,
    abort: &AtomicBool,
    mut progress: F,
) -> CardsmithResult<ExportReport>
where
    F: FnMut(usize, usize, &Path),
{
    std::fs::create_dir_all(export_dir).map_err(|e| {
        CardsmithError::render(format!("create '{}': {e}", export_dir.display()))
    })?;

    let total = deck.cards.len();
    let mut report = ExportReport::default();
    let mut used = std::collections::HashSet::new();

    for (done, row) in deck.cards.iter().enumerate() {
        if abort.load(Ordering::Relaxed) {
            report.aborted = true;
            tracing::info!(finished = done, total, "export aborted");
            break;
        }

        let path = unique_card_path(export_dir, &row.name(), row.index, &mut used);
        let result = project(doc, row)
            .and_then(|proj| {
                let img = compositor.render(&proj)?;
                write_png_with_dpi(&path, &img, proj.dpi)?;
                Ok(())
            });

        match result {
            Ok(()) => {
                report.written.push(path.clone());
                progress(done + 1, total, &path);
            }
            Err(err) => {
                tracing::warn!(card = row.index, %err, "card failed, continuing");
                report.failures.push(CardFailure {
                    index: row.index,
                    name: row.name(),
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// `<slug>-NNN.png`, de-duplicated with a numeric suffix when two cards
/// slugify identically.
fn unique_card_path(
    dir: &Path,
    name: &str,
    index: usize,
    used: &mut std::collections::HashSet<PathBuf>,
) -> PathBuf {
    let slug = slugify_card_name(name);
    let base = format!("{slug}-{:03}", index + 1);
    let mut candidate = dir.join(format!("{base}.png"));
    let mut bump = 2u32;
    while used.contains(&candidate) || candidate.exists() {
        candidate = dir.join(format!("{base}-{bump}.png"));
        bump += 1;
    }
    used.insert(candidate.clone());
    candidate
}
