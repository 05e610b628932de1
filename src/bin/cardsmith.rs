use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::Context as _;
use cardsmith::{
    Compositor, FontLibrary, LayoutDocument,
    data::loader::load_deck,
    diffusion::{CommandGenerator, ModelKey, ModelKind, builtin_models, generate_deck_art, ModelHandle},
    export::{deck::export_deck, pdf::export_pdf, png::write_png_with_dpi},
    project::project,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cardsmith", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the built-in starter template (or heal a missing one).
    InitTemplate(InitTemplateArgs),
    /// Render one card from a deck as a PNG.
    Card(CardArgs),
    /// Render every card in a deck to a directory of PNGs.
    Render(RenderArgs),
    /// Assemble already-rendered card PNGs into a print-sheet PDF.
    Pdf(PdfArgs),
    /// Generate card art for a deck with an external diffusion tool.
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct InitTemplateArgs {
    /// Template JSON path to create.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct CardArgs {
    /// Template JSON.
    #[arg(long)]
    template: PathBuf,

    /// Deck file (.csv or .json).
    #[arg(long)]
    deck: PathBuf,

    /// Card index within the deck (0-based).
    #[arg(long, default_value_t = 0)]
    index: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Directory of .ttf/.otf fonts.
    #[arg(long)]
    fonts: Option<PathBuf>,

    /// Frame overlay image, stretched to the canvas.
    #[arg(long)]
    frame: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Template JSON.
    #[arg(long)]
    template: PathBuf,

    /// Deck file (.csv or .json).
    #[arg(long)]
    deck: PathBuf,

    /// Output directory for card PNGs.
    #[arg(long)]
    out_dir: PathBuf,

    /// Directory of .ttf/.otf fonts.
    #[arg(long)]
    fonts: Option<PathBuf>,

    /// Frame overlay image, stretched to the canvas.
    #[arg(long)]
    frame: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PdfArgs {
    /// Card PNGs, one page each, in order.
    images: Vec<PathBuf>,

    /// Add every .png from this directory (sorted) to the page list.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Output PDF path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Deck file (.csv or .json).
    #[arg(long)]
    deck: PathBuf,

    /// Built-in model shorthand (see `--list-models`).
    #[arg(long, default_value = "sdxl-base")]
    model: String,

    /// Model path/id override; implies --kind.
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Model family, used with --model-path.
    #[arg(long, value_enum, default_value_t = KindChoice::Sdxl)]
    kind: KindChoice,

    /// External text-to-image executable to drive.
    #[arg(long, default_value = "txt2img")]
    command: PathBuf,

    /// Where to write generated art. Defaults to `<deck dir>/../arts`.
    #[arg(long)]
    arts_dir: Option<PathBuf>,

    /// Regenerate art that already exists.
    #[arg(long)]
    overwrite: bool,

    /// Print the built-in model table and exit.
    #[arg(long)]
    list_models: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindChoice {
    Sdxl,
    Sd15,
}

impl From<KindChoice> for ModelKind {
    fn from(choice: KindChoice) -> Self {
        match choice {
            KindChoice::Sdxl => ModelKind::Sdxl,
            KindChoice::Sd15 => ModelKind::Sd15,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::InitTemplate(args) => cmd_init_template(args),
        Command::Card(args) => cmd_card(args),
        Command::Render(args) => cmd_render(args),
        Command::Pdf(args) => cmd_pdf(args),
        Command::Generate(args) => cmd_generate(args),
    }
}

fn make_compositor(fonts: Option<&Path>, frame: Option<&Path>) -> anyhow::Result<Compositor> {
    let fonts = match fonts {
        Some(dir) => FontLibrary::load_dir(dir)
            .with_context(|| format!("load fonts from '{}'", dir.display()))?,
        None => FontLibrary::empty(),
    };
    let mut compositor = Compositor::new(fonts);
    if let Some(frame) = frame {
        compositor = compositor.with_frame(frame);
    }
    Ok(compositor)
}

fn cmd_init_template(args: InitTemplateArgs) -> anyhow::Result<()> {
    let doc = LayoutDocument::load_or_default(&args.out)
        .with_context(|| format!("write template '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} ({} elements)",
        args.out.display(),
        doc.items.len()
    );
    Ok(())
}

fn cmd_card(args: CardArgs) -> anyhow::Result<()> {
    let doc = LayoutDocument::load(&args.template)
        .with_context(|| format!("load template '{}'", args.template.display()))?;
    let deck =
        load_deck(&args.deck).with_context(|| format!("load deck '{}'", args.deck.display()))?;
    let row = deck
        .card_at(args.index)
        .with_context(|| format!("deck has {} cards, no index {}", deck.len(), args.index))?;

    let mut compositor = make_compositor(args.fonts.as_deref(), args.frame.as_deref())?;
    let projection = project(&doc, row)?;
    let img = compositor.render(&projection)?;
    write_png_with_dpi(&args.out, &img, projection.dpi)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let doc = LayoutDocument::load(&args.template)
        .with_context(|| format!("load template '{}'", args.template.display()))?;
    let deck =
        load_deck(&args.deck).with_context(|| format!("load deck '{}'", args.deck.display()))?;

    let mut compositor = make_compositor(args.fonts.as_deref(), args.frame.as_deref())?;
    let abort = AtomicBool::new(false);
    let report = export_deck(&doc, &deck, &mut compositor, &args.out_dir, &abort, |done, total, path| {
        eprintln!("[{done}/{total}] {}", path.display());
    })?;

    for failure in &report.failures {
        eprintln!(
            "failed card {} ('{}'): {}",
            failure.index, failure.name, failure.error
        );
    }
    eprintln!(
        "wrote {} cards to {} ({} failed)",
        report.written.len(),
        args.out_dir.display(),
        report.failures.len()
    );
    if report.written.is_empty() {
        anyhow::bail!("no cards were written");
    }
    Ok(())
}

fn cmd_pdf(args: PdfArgs) -> anyhow::Result<()> {
    let mut images = args.images.clone();
    if let Some(dir) = &args.dir {
        let mut from_dir: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("read '{}'", dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
            .collect();
        from_dir.sort();
        images.extend(from_dir);
    }

    let pages = export_pdf(&images, &args.out)?;
    eprintln!("wrote {} ({pages} pages)", args.out.display());
    Ok(())
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    if args.list_models {
        for (name, kind, path) in builtin_models() {
            println!("{name}\t{kind:?}\t{path}");
        }
        return Ok(());
    }

    let key = match &args.model_path {
        Some(path) => ModelKey {
            kind: args.kind.into(),
            path: path.clone(),
        },
        None => {
            let (_, kind, path) = builtin_models()
                .iter()
                .find(|(name, _, _)| *name == args.model)
                .with_context(|| format!("unknown model '{}'", args.model))?;
            ModelKey {
                kind: *kind,
                path: PathBuf::from(*path),
            }
        }
    };

    let deck =
        load_deck(&args.deck).with_context(|| format!("load deck '{}'", args.deck.display()))?;
    let arts_dir = match &args.arts_dir {
        Some(dir) => dir.clone(),
        None => args
            .deck
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("..")
            .join("arts"),
    };

    let command = args.command.clone();
    let mut handle = ModelHandle::new(move |key: &ModelKey| {
        Ok(CommandGenerator::new(command.clone(), key.path.clone()))
    });

    let abort = AtomicBool::new(false);
    let report = generate_deck_art(
        &mut handle,
        &key,
        &deck,
        &arts_dir,
        args.overwrite,
        &abort,
        |done, total, path| eprintln!("[{done}/{total}] {}", path.display()),
    )?;

    for failure in &report.failures {
        eprintln!(
            "failed card {} ('{}'): {}",
            failure.index, failure.name, failure.error
        );
    }
    eprintln!(
        "wrote {} art files to {} ({} skipped, {} failed)",
        report.written.len(),
        arts_dir.display(),
        report.skipped.len(),
        report.failures.len()
    );
    Ok(())
}
