//! Headless frame composer: loads a photo, applies edits and writes the export.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use memory_frame::composition;
use memory_frame::config::Configuration;
use memory_frame::events::ExportProgress;
use memory_frame::processing::layout::Offset;
use memory_frame::render::text::SystemFonts;
use memory_frame::session::Session;
use memory_frame::sink::{ArtifactSink, DirectorySink};
use memory_frame::tasks::loader;
use memory_frame::transform::FontStyle;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FontArg {
    Serif,
    Sans,
}

impl From<FontArg> for FontStyle {
    fn from(arg: FontArg) -> Self {
        match arg {
            FontArg::Serif => FontStyle::Serif,
            FontArg::Sans => FontStyle::Sans,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "memory-frame",
    version,
    about = "Compose a photo into the reunion frame and export it"
)]
struct Cli {
    /// Path to YAML config; built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Photo to place in the frame
    #[arg(long, value_name = "FILE")]
    photo: PathBuf,

    /// Annotation text (use \n for line breaks)
    #[arg(long)]
    text: Option<String>,

    #[arg(long, value_enum)]
    font: Option<FontArg>,

    /// Zoom factor applied after auto-fit
    #[arg(long, value_name = "FACTOR")]
    zoom: Option<f32>,

    /// Pan offset in logical pixels
    #[arg(long, value_name = "DX,DY", value_parser = parse_pan)]
    pan: Option<Offset>,

    /// Output directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn parse_pan(raw: &str) -> Result<Offset> {
    let (dx, dy) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected DX,DY"))?;
    Ok(Offset::new(
        dx.trim().parse().context("invalid DX")?,
        dy.trim().parse().context("invalid DY")?,
    ))
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("memory_frame={level}").parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

/// Logs export milestones until every sender is dropped. Resolves to the
/// number of milestones seen.
fn progress_printer() -> (mpsc::Sender<ExportProgress>, JoinHandle<usize>) {
    let (tx, mut rx) = mpsc::channel::<ExportProgress>(8);
    let printer = tokio::spawn(async move {
        let mut seen = 0;
        while let Some(progress) = rx.recv().await {
            info!(percent = progress.percent, milestone = ?progress.milestone, "export progress");
            seen += 1;
        }
        seen
    });
    (tx, printer)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = match &cli.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    }
    .validated()
    .context("validating configuration")?;

    let fonts = Arc::new(SystemFonts::new(cfg.fonts.clone()));
    let mut session = Session::new(&cfg, fonts);
    session.advance();

    let photo = loader::load_photo(cli.photo.clone())
        .await
        .with_context(|| format!("loading photo {}", cli.photo.display()))?;
    if session.accept_photo(photo).is_none() {
        bail!("photo was not accepted");
    }

    {
        let mut comp = composition::lock(session.composition());
        if let Some(text) = &cli.text {
            comp.set_text(text.replace("\\n", "\n"));
        }
        if let Some(font) = cli.font {
            comp.set_font_style(font.into());
        }
        if let Some(zoom) = cli.zoom {
            let fitted = comp.settings().photo_scale();
            comp.set_scale(fitted * zoom);
        }
        if let Some(delta) = cli.pan {
            comp.pan(delta);
        }
        let settings = comp.settings();
        info!(
            scale = settings.photo_scale(),
            x = settings.photo_offset().x,
            y = settings.photo_offset().y,
            "composition ready"
        );
    }
    session.advance();
    session.advance();

    let (tx, printer) = progress_printer();
    let result = session.export(Some(&tx)).await;
    drop(tx);
    if let Err(err) = printer.await {
        warn!(error = %err, "progress printer failed");
    }
    let export = result.context("exporting frame")?;

    let sink = DirectorySink::new(&cli.out);
    let path = sink.deliver(&export.artifact)?;
    println!("{}", path.display());
    if let Some(code) = &export.share_code {
        let name = format!("{}.qr.png", export.artifact.filename);
        match sink.deliver_data_uri(&name, code) {
            Ok(qr_path) => println!("{}", qr_path.display()),
            Err(err) => warn!(error = %err, "failed to save share code"),
        }
    }
    Ok(())
}
