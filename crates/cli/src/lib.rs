//! place-notes - plan margin notes for a document.
//!
//! Reads a JSON job file holding the page text geometry and the annotation
//! list, lays out every note and writes the resulting `DocumentLayout` as
//! JSON.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use marginalia_core::{
    DedupeScope, DiagnosticKind, DocumentLayout, LayoutBuilder, LayoutOverrides, LayoutParams,
    Page, RawAnnotation, SidePreference,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Plan collision-free margin notes for quoted passages.
#[derive(Parser, Debug)]
#[command(name = "place-notes")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON job file: `{ pages, annotations, params?, overrides? }`
    job: PathBuf,

    /// Annotation list replacing the job's `annotations`
    #[arg(short = 'a', long)]
    annotations: Option<PathBuf>,

    /// Layout parameters replacing the job's `params`
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    // === Layout options ===
    /// Preferred margin: left, right or nearest
    #[arg(long)]
    side: Option<SidePreference>,

    /// Duplicate detection range: page or document
    #[arg(long = "dedupe-scope")]
    dedupe_scope: Option<DedupeScope>,

    /// Maximum note width in points
    #[arg(long = "note-width")]
    note_width: Option<f64>,

    /// Minimum note width in points
    #[arg(long = "min-note-width")]
    min_note_width: Option<f64>,

    /// Note font size in points
    #[arg(long = "font-size")]
    font_size: Option<f64>,

    /// Font used to measure note text (helv, courier)
    #[arg(long)]
    font: Option<String>,

    /// Maximum vertical search steps per margin
    #[arg(long = "max-scan")]
    max_scan: Option<usize>,

    /// Do not compute leader lines
    #[arg(long = "no-leader", action = ArgAction::SetTrue)]
    no_leader: bool,

    /// A space-separated list of page numbers to lay out (1-indexed)
    #[arg(long = "page-numbers")]
    page_numbers: Option<String>,

    /// Worker threads (1 = sequential)
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

/// Annotation lists come bare or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnnotationList {
    Bare(Vec<RawAnnotation>),
    Wrapped { annotations: Vec<RawAnnotation> },
}

impl AnnotationList {
    fn into_vec(self) -> Vec<RawAnnotation> {
        match self {
            AnnotationList::Bare(list) | AnnotationList::Wrapped { annotations: list } => list,
        }
    }
}

impl Default for AnnotationList {
    fn default() -> Self {
        AnnotationList::Bare(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct Job {
    pages: Vec<Page>,
    #[serde(default)]
    annotations: AnnotationList,
    #[serde(default)]
    params: Option<LayoutParams>,
    #[serde(default)]
    overrides: LayoutOverrides,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // a subscriber may already be installed when run is called twice
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {what} file {}", path.display()))
}

/// Parses a space-separated list of 1-indexed page numbers into zero-indexed
/// page numbers.
fn parse_page_numbers(s: &str) -> Result<Vec<usize>> {
    s.split_whitespace()
        .map(|tok| match tok.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => bail!("invalid page number {tok:?}"),
        })
        .collect()
}

/// Applies command-line flags on top of the job or config parameters.
fn apply_flags(params: &mut LayoutParams, args: &Args) {
    if let Some(side) = args.side {
        params.side_preference = side;
    }
    if let Some(scope) = args.dedupe_scope {
        params.dedupe_scope = scope;
    }
    if let Some(w) = args.note_width {
        params.note_width = w;
    }
    if let Some(w) = args.min_note_width {
        params.min_note_width = w;
    }
    if let Some(size) = args.font_size {
        params.font_size = size;
    }
    if let Some(font) = &args.font {
        params.font_name = font.clone();
    }
    if let Some(n) = args.max_scan {
        params.max_scan = n;
    }
    if args.no_leader {
        params.draw_leader = false;
    }
}

fn summary(layout: &DocumentLayout) -> String {
    let skipped = layout.count_kind(|k| {
        matches!(
            k,
            DiagnosticKind::QuoteNotFound
                | DiagnosticKind::Duplicate { .. }
                | DiagnosticKind::MalformedAnnotation { .. }
        )
    });
    format!(
        "placed={} unplaceable={} skipped={}",
        layout.placed_count(),
        layout.unplaceable_count(),
        skipped
    )
}

fn write_output(layout: &DocumentLayout, outfile: &str) -> Result<()> {
    let mut output: Box<dyn Write> = if outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(outfile)
            .with_context(|| format!("failed to create output file {outfile}"))?;
        Box::new(BufWriter::new(file))
    };
    serde_json::to_writer_pretty(&mut output, layout).context("failed to serialize layout")?;
    writeln!(output)?;
    output.flush().context("failed to write output")?;
    Ok(())
}

/// Runs the tool with the given command line.
pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = Args::parse_from(args);
    init_logging(args.debug);

    let mut job: Job = read_json(&args.job, "job")?;
    for page in &mut job.pages {
        page.ensure_text();
    }
    let raws = match &args.annotations {
        Some(path) => read_json::<AnnotationList>(path, "annotations")?.into_vec(),
        None => std::mem::take(&mut job.annotations).into_vec(),
    };
    let mut params = match &args.config {
        Some(path) => read_json::<LayoutParams>(path, "config")?,
        None => job.params.take().unwrap_or_default(),
    };
    apply_flags(&mut params, &args);
    tracing::debug!(
        pages = job.pages.len(),
        annotations = raws.len(),
        "loaded job {}",
        args.job.display()
    );

    let mut builder = LayoutBuilder::new()
        .params(params)
        .overrides(std::mem::take(&mut job.overrides));
    if let Some(nums) = &args.page_numbers {
        builder = builder.page_numbers(parse_page_numbers(nums)?);
    }
    if let Some(threads) = args.threads {
        builder = builder.parallel(threads);
    }
    let layout = builder
        .layout_raw(&job.pages, raws)
        .context("layout failed")?;

    write_output(&layout, &args.outfile)?;
    eprintln!("{}", summary(&layout));
    Ok(())
}
