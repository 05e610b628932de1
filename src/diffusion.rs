//! Diffusion plumbing, not diffusion math. The crate never samples; it
//! builds requests, hands them to an opaque [`ImageGenerator`], and files
//! the resulting raster where the deck loader will find it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{
    data::deck::{Deck, sanitize_art_name},
    export::deck::CardFailure,
    foundation::error::{CardsmithError, CardsmithResult},
};

/// Negative prompt applied when a request does not bring its own.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, jpeg artifacts, blurry, distorted, \
     watermark, text, logo, signature, extra limbs, extra fingers, mutation, disfigured, \
     poorly drawn hands, malformed anatomy, long neck, duplicate body";

/// Default card-art frame, portrait-ish and divisible by 8 as most samplers
/// require.
pub const DEFAULT_ART_WIDTH: u32 = 664;
pub const DEFAULT_ART_HEIGHT: u32 = 1040;
pub const DEFAULT_STEPS: u32 = 25;

#[derive(Clone, Debug, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub seed: Option<u64>,
}

impl GenerateRequest {
    pub fn card_art(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            width: DEFAULT_ART_WIDTH,
            height: DEFAULT_ART_HEIGHT,
            steps: DEFAULT_STEPS,
            seed: None,
        }
    }

    pub fn negative(&self) -> &str {
        self.negative_prompt.as_deref().unwrap_or(DEFAULT_NEGATIVE_PROMPT)
    }
}

/// Something that can turn a request into pixels: a subprocess wrapper, a
/// remote endpoint, a test stub. No retry policy lives at this seam.
pub trait ImageGenerator {
    fn generate(&mut self, request: &GenerateRequest) -> CardsmithResult<image::RgbaImage>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Sdxl,
    Sd15,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub kind: ModelKind,
    pub path: PathBuf,
}

/// Shorthand names resolvable from the CLI.
pub fn builtin_models() -> &'static [(&'static str, ModelKind, &'static str)] {
    &[
        ("sdxl-base", ModelKind::Sdxl, "stabilityai/stable-diffusion-xl-base-1.0"),
        ("dreamshaper", ModelKind::Sd15, "Lykon/dreamshaper-8"),
    ]
}

/// Owns at most one loaded generator and reloads only when the requested
/// key changes. Switching models drops the old generator before the new
/// one loads, so two are never resident at once.
pub struct ModelHandle<G: ImageGenerator> {
    loader: Box<dyn FnMut(&ModelKey) -> CardsmithResult<G> + Send>,
    loaded: Option<(ModelKey, G)>,
}

impl<G: ImageGenerator> ModelHandle<G> {
    pub fn new(loader: impl FnMut(&ModelKey) -> CardsmithResult<G> + Send + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            loaded: None,
        }
    }

    pub fn current(&self) -> Option<&ModelKey> {
        self.loaded.as_ref().map(|(key, _)| key)
    }

    /// Return the generator for `key`, loading or swapping as needed.
    pub fn ensure(&mut self, key: &ModelKey) -> CardsmithResult<&mut G> {
        if self.current() != Some(key) {
            self.loaded = None;
            let generator = (self.loader)(key)?;
            self.loaded = Some((key.clone(), generator));
        }
        match self.loaded.as_mut() {
            Some((_, generator)) => Ok(generator),
            None => Err(CardsmithError::external_tool("model did not load")),
        }
    }

    pub fn unload(&mut self) {
        self.loaded = None;
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Runs an external text-to-image tool per request:
///
/// ```text
/// <program> --model <path> --prompt .. --negative-prompt .. \
///           --width .. --height .. --steps .. [--seed ..] --out <tmp.png>
/// ```
pub struct CommandGenerator {
    program: PathBuf,
    model_path: PathBuf,
    extra_args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            model_path: model_path.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}

impl ImageGenerator for CommandGenerator {
    fn generate(&mut self, request: &GenerateRequest) -> CardsmithResult<image::RgbaImage> {
        let out_path = std::env::temp_dir().join(format!(
            "cardsmith-art-{}-{}.png",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let mut cmd = std::process::Command::new(&self.program);
        cmd.arg("--model")
            .arg(&self.model_path)
            .args(["--prompt", &request.prompt])
            .args(["--negative-prompt", request.negative()])
            .args(["--width", &request.width.to_string()])
            .args(["--height", &request.height.to_string()])
            .args(["--steps", &request.steps.to_string()]);
        if let Some(seed) = request.seed {
            cmd.args(["--seed", &seed.to_string()]);
        }
        cmd.arg("--out").arg(&out_path).args(&self.extra_args);

        let out = cmd.output().map_err(|e| {
            CardsmithError::external_tool(format!(
                "failed to run '{}': {e}",
                self.program.display()
            ))
        })?;
        if !out.status.success() {
            let _ = std::fs::remove_file(&out_path);
            return Err(CardsmithError::external_tool(format!(
                "'{}' failed: {}",
                self.program.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let bytes = std::fs::read(&out_path).map_err(|e| {
            CardsmithError::external_tool(format!(
                "'{}' produced no readable output: {e}",
                self.program.display()
            ))
        })?;
        let _ = std::fs::remove_file(&out_path);
        let img = image::load_from_memory(&bytes).map_err(|e| {
            CardsmithError::external_tool(format!("generated image is not decodable: {e}"))
        })?;
        Ok(img.to_rgba8())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ArtReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<CardFailure>,
    pub aborted: bool,
}

/// Generate art for every card carrying a prompt, into `arts_dir` under the
/// filenames the deck loader autodetects. Existing files are kept unless
/// `overwrite` is set; per-card failures are recorded and the batch goes on.
#[tracing::instrument(skip_all, fields(deck = %deck.name, cards = deck.cards.len()))]
pub fn generate_deck_art<G, F>(
    handle: &mut ModelHandle<G>,
    key: &ModelKey,
    deck: &Deck,
    arts_dir: &Path,
    overwrite: bool,
    abort: &AtomicBool,
    mut progress: F,
) -> CardsmithResult<ArtReport>
where
    G: ImageGenerator,
    F: FnMut(usize, usize, &Path),
{
    std::fs::create_dir_all(arts_dir).map_err(|e| {
        CardsmithError::external_tool(format!("create '{}': {e}", arts_dir.display()))
    })?;

    let total = deck.cards.len();
    let mut report = ArtReport::default();

    for (done, row) in deck.cards.iter().enumerate() {
        if abort.load(Ordering::Relaxed) {
            report.aborted = true;
            tracing::info!(finished = done, total, "art generation aborted");
            break;
        }

        let path = arts_dir.join(format!("{}.png", sanitize_art_name(&row.name())));
        if path.exists() && !overwrite {
            report.skipped.push(path);
            continue;
        }
        let Some(prompt) = row.display("prompt").filter(|p| !p.trim().is_empty()) else {
            report.failures.push(CardFailure {
                index: row.index,
                name: row.name(),
                error: "card has no prompt".into(),
            });
            continue;
        };

        let result = handle.ensure(key).and_then(|generator| {
            let img = generator.generate(&GenerateRequest::card_art(prompt))?;
            img.save(&path)
                .map_err(|e| CardsmithError::render(format!("save '{}': {e}", path.display())))
        });
        match result {
            Ok(()) => {
                report.written.push(path.clone());
                progress(done + 1, total, &path);
            }
            Err(err) => {
                tracing::warn!(card = row.index, %err, "art generation failed, continuing");
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
