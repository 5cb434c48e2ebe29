//! CLI binary for pdf-convertor.
//!
//! A thin shim over the library crate: `inspect` and `render` drive the local
//! viewer, `convert` drives a session against the conversion service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_convertor::engine::pdfium;
use pdf_convertor::render::{Frame, RenderStatus};
use pdf_convertor::{
    print_document, ClientConfig, ConversionClient, ConversionError, ConversionProgressCallback,
    ConversionResult, EngineConfig, PageRenderer, PreviewClient, ProgressCallback, RenderMode,
    RenderedPage, SelectedFile, Session, SystemPrintSurface, TargetFormat, ViewerAction,
    ViewerController,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while the service converts the upload.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, file_name: &str, bytes: usize, format: TargetFormat) {
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!(
            "{file_name} → {}  {}",
            format.info().label,
            dim(&format!("{:.1} KB", bytes as f64 / 1024.0))
        ));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_conversion_complete(&self, result: &ConversionResult) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} ready  {}",
            green("✔"),
            bold(&result.filename),
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
        );
    }

    fn on_conversion_error(&self, error: &ConversionError) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), error.message);
    }

    fn on_download_complete(&self, path: &Path, bytes: usize) {
        eprintln!(
            "{} saved {}  {}",
            green("✔"),
            bold(&path.display().to_string()),
            dim(&format!("{bytes} bytes"))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Page count and page sizes
  pdfconv inspect invoice.pdf

  # Render page 2 at 150% as PNG
  pdfconv render invoice.pdf --page 2 --scale 1.5 -o page2.png

  # Positioned text runs of page 1 as JSON
  pdfconv render invoice.pdf --mode text

  # Convert to Excel and save the result next to the input
  pdfconv convert invoice.pdf --format xlsx --download .

  # Convert and print the HTML preview to stdout
  pdfconv convert report.pdf --format docx --preview

ENVIRONMENT VARIABLES:
  PDFCONV_ENDPOINT        Conversion service base URL (default http://localhost:5000)
  PDFCONV_TIMEOUT         Conversion budget in seconds (default 60)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory); system library otherwise
"#;

/// Preview PDFs locally and convert them to DOCX, CSV or XLSX.
#[derive(Parser, Debug)]
#[command(
    name = "pdfconv",
    version,
    about = "Preview PDFs locally and convert them to DOCX, CSV or XLSX",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to libpdfium (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFCONV_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page count and page sizes.
    Inspect {
        /// Local PDF file.
        input: PathBuf,
    },

    /// Render one page as PNG (raster) or JSON text runs (text).
    Render {
        /// Local PDF file.
        input: PathBuf,

        /// 1-indexed page number.
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Zoom factor, clamped to 0.5–3.0.
        #[arg(long, default_value_t = 1.0)]
        scale: f32,

        /// Fit the page to this container width (px) instead of --scale.
        #[arg(long, conflicts_with = "scale")]
        fit_width: Option<f32>,

        /// raster or text.
        #[arg(long, value_enum, default_value = "raster")]
        mode: ModeArg,

        /// Output file (PNG for raster, JSON for text). Defaults to stdout for text.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload to the conversion service.
    Convert {
        /// Local PDF file.
        input: PathBuf,

        /// Target format: docx, csv, xlsx.
        #[arg(short, long, env = "PDFCONV_FORMAT")]
        format: TargetFormat,

        /// Conversion service base URL.
        #[arg(long, env = "PDFCONV_ENDPOINT", default_value = pdf_convertor::config::DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Conversion budget in seconds.
        #[arg(long, env = "PDFCONV_TIMEOUT", default_value_t = 60)]
        timeout: u64,

        /// Upload limit reported by the service, in MB.
        #[arg(long, env = "PDFCONV_MAX_UPLOAD_MB", default_value_t = 16)]
        max_upload_mb: u64,

        /// Download the converted file into this directory.
        #[arg(long)]
        download: Option<PathBuf>,

        /// Write the HTML preview to stdout.
        #[arg(long)]
        preview: bool,

        /// Open a printable page of the preview.
        #[arg(long)]
        print: bool,

        /// Output the conversion result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Raster,
    Text,
}

impl From<ModeArg> for RenderMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Raster => RenderMode::Raster,
            ModeArg::Text => RenderMode::Text,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library INFO logs out of the way while the spinner is shown.
    let spinner = !cli.quiet && matches!(cli.command, Command::Convert { json: false, .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let engine_config = EngineConfig {
        library_path: cli.pdfium_lib.clone(),
    };

    match cli.command {
        Command::Inspect { ref input } => inspect(input, &engine_config).await,
        Command::Render {
            ref input,
            page,
            scale,
            fit_width,
            mode,
            ref output,
        } => {
            render(
                input,
                &engine_config,
                page,
                scale,
                fit_width,
                mode.into(),
                output.as_deref(),
                cli.quiet,
            )
            .await
        }
        Command::Convert {
            ref input,
            format,
            ref endpoint,
            timeout,
            max_upload_mb,
            ref download,
            preview,
            print,
            json,
        } => {
            let config = ClientConfig::builder()
                .endpoint(endpoint.as_str())
                .timeout_secs(timeout)
                .max_upload_mb(max_upload_mb)
                .build()
                .context("Invalid configuration")?;
            let progress: Option<ProgressCallback> = if spinner {
                Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
            } else {
                None
            };
            convert(
                input,
                format,
                config,
                progress,
                download.as_deref(),
                preview,
                print,
                json,
            )
            .await
        }
    }
}

fn renderer(engine_config: &EngineConfig) -> Result<PageRenderer> {
    let engine = tokio::task::block_in_place(|| pdfium::init(engine_config))
        .context("Failed to initialise the PDF engine")?;
    Ok(PageRenderer::new(engine))
}

async fn inspect(input: &Path, engine_config: &EngineConfig) -> Result<()> {
    let mut session = Session::new();
    let file = SelectedFile::from_path(input).context("Failed to read input")?;
    let source = session.select_file(file).context("Failed to select input")?;

    let handle = renderer(engine_config)?
        .open(source)
        .await
        .context("Failed to open PDF")?;
    let pages = handle.page_count();

    println!("File:         {}", source.display_name());
    println!("Size:         {} bytes", source.bytes().len());
    println!("Pages:        {}", pages);
    for page in 1..=pages {
        let size = handle.page_size(page)?;
        println!(
            "  {} {:>4}  {:.0} × {:.0} pt",
            dim("page"),
            page,
            size.width,
            size.height
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn render(
    input: &Path,
    engine_config: &EngineConfig,
    page: usize,
    scale: f32,
    fit_width: Option<f32>,
    mode: RenderMode,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let mut session = Session::new();
    let file = SelectedFile::from_path(input).context("Failed to read input")?;
    let source = session.select_file(file).context("Failed to select input")?;

    let mut controller = ViewerController::new(renderer(engine_config)?, 40.0);
    let pages = controller
        .load(source)
        .await
        .context("Failed to open PDF")?;
    if !(1..=pages).contains(&page) {
        anyhow::bail!("Page {} is out of range (document has {} pages)", page, pages);
    }

    controller.dispatch(ViewerAction::JumpTo(page));
    match fit_width {
        Some(width) => {
            controller.set_container_width(width);
            controller.fit_to_width();
        }
        None => {
            controller.dispatch(ViewerAction::SetScale(scale));
        }
    }
    if mode != controller.state().mode {
        controller.dispatch(ViewerAction::ToggleMode);
    }

    let frame = wait_for_frame(&controller).await?;
    match &frame.page {
        RenderedPage::Raster(surface) => {
            let path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(format!("page-{page}.png")));
            let png = surface.to_png().context("Failed to encode PNG")?;
            tokio::fs::write(&path, &png)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} page {}/{} at {}%  {}x{} px  →  {}",
                    green("✔"),
                    page,
                    pages,
                    controller.state().zoom_percent(),
                    surface.width(),
                    surface.height(),
                    bold(&path.display().to_string())
                );
            }
        }
        RenderedPage::Text(layer) => {
            let json = serde_json::to_string_pretty(layer).context("Failed to serialise text layer")?;
            match output {
                Some(path) => tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
            if !quiet {
                eprintln!(
                    "{} page {}/{}  {} text runs",
                    green("✔"),
                    page,
                    pages,
                    layer.runs.len()
                );
            }
        }
    }
    Ok(())
}

/// Wait until the frame for the controller's current state is on display.
async fn wait_for_frame(controller: &ViewerController) -> Result<Arc<Frame>> {
    let wanted = controller.state().render_request();
    let mut status = controller.scheduler().subscribe_status();
    loop {
        if let Some(frame) = controller.scheduler().displayed() {
            if frame.request == wanted {
                return Ok(frame);
            }
        }
        let current = status.borrow_and_update().clone();
        if let RenderStatus::Failed { message, .. } = current {
            anyhow::bail!("Render failed: {message}");
        }
        status
            .changed()
            .await
            .context("Renderer stopped before the page was ready")?;
    }
}

#[allow(clippy::too_many_arguments)]
async fn convert(
    input: &Path,
    format: TargetFormat,
    config: ClientConfig,
    progress: Option<ProgressCallback>,
    download: Option<&Path>,
    preview: bool,
    print: bool,
    json: bool,
) -> Result<()> {
    let mut client = ConversionClient::new(config).context("Failed to build HTTP client")?;
    if let Some(cb) = progress {
        client = client.with_progress(cb);
    }

    let mut session = Session::new();
    let file = SelectedFile::from_path(input).context("Failed to read input")?;
    session.select_file(file).context("Failed to select input")?;
    session.select_format(format);
    session.convert_with(&client).await;

    if let Some(error) = session.error() {
        anyhow::bail!("{} ({})\n{}", error.message, error.kind, cyan(error.hint()));
    }
    let result = session
        .result()
        .cloned()
        .context("Conversion did not produce a result")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    }

    if let Some(dir) = download {
        client
            .download(&result, dir)
            .await
            .context("Failed to download converted file")?;
    }

    if preview || print {
        let fragment = PreviewClient::from_client(&client)
            .load_result(&result)
            .await
            .context("Failed to load preview")?;
        if preview {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(fragment.as_str().as_bytes())
                .context("Failed to write to stdout")?;
            if !fragment.as_str().ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        if print {
            print_document(&fragment, &result.format, &SystemPrintSurface::default())
                .context("Failed to print preview")?;
        }
    }

    if !json && download.is_none() && !preview {
        println!("{}", result.download_url);
    }
    Ok(())
}
