//! CLI tool for generating card insert PDFs from a Word recipient table.

use anyhow::{bail, Context, Result};
use clap::Parser;
use inserts_core::{build_records, InsertLayout};
use inserts_docx::DocxParser;
use inserts_pdf::{render_inserts, Typeface};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Generate a card insert PDF from a Word recipient table and a template.
#[derive(Parser, Debug)]
#[command(name = "insert-gen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input Word document (.docx); when omitted, exactly one .docx must
    /// exist in the current directory
    input: Option<PathBuf>,

    /// Template PDF: page 1 is the static cover, page 2 the reference page
    #[arg(short, long, default_value = "template.pdf")]
    template: PathBuf,

    /// TrueType font file; when omitted, exactly one .ttf must exist in
    /// the current directory
    #[arg(short, long)]
    font: Option<PathBuf>,

    /// Zero-based index of the recipient table in the document
    #[arg(long, default_value = "0")]
    table_index: usize,

    /// Treat the first table row as data instead of a header
    #[arg(long)]
    no_header: bool,

    /// JSON file overriding the default insert layout
    #[arg(short, long)]
    layout: Option<PathBuf>,

    /// Output directory (default: current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    // Resolve all resources up front so configuration problems surface
    // before any parsing starts.
    let input = match &args.input {
        Some(path) => {
            if !path.exists() {
                bail!("Word document not found: {}", path.display());
            }
            path.clone()
        }
        None => find_single_file_in_cwd("docx")?,
    };

    let font_path = match &args.font {
        Some(path) => {
            if !path.exists() {
                bail!("Font file not found: {}", path.display());
            }
            path.clone()
        }
        None => find_single_file_in_cwd("ttf")?,
    };

    if !args.template.exists() {
        bail!("Template PDF not found: {}", args.template.display());
    }

    let layout = match &args.layout {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read layout file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse layout file {}", path.display()))?
        }
        None => InsertLayout::default(),
    };
    log::debug!(
        "salutation at ({}, {}), greeting at ({}, {})",
        layout.salutation.x,
        layout.salutation.y,
        layout.greeting.x,
        layout.greeting.y
    );

    if args.verbose {
        eprintln!("Processing: {}", input.display());
    }

    let file =
        File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
    let rows = DocxParser::new()
        .with_table_index(args.table_index)
        .with_header_row(!args.no_header)
        .parse(BufReader::new(file))?;
    let records = build_records(&rows)?;

    if args.verbose {
        eprintln!("  Found {} record(s)", records.len());
    }

    let template = std::fs::read(&args.template)
        .with_context(|| format!("Failed to read {}", args.template.display()))?;
    let typeface = Typeface::from_file(&font_path)?;

    let pdf = render_inserts(&records, template, &typeface, &layout)?;

    let output_path = get_output_path(args.output_dir.as_deref())?;
    std::fs::write(&output_path, pdf)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!(
        "Wrote {} page(s) to {}",
        records.len() + 1,
        output_path.display()
    );

    Ok(())
}

/// Find exactly one file with the given extension in the current
/// directory; zero or several is an error.
fn find_single_file_in_cwd(extension: &str) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(".")
        .context("Failed to list the current directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    matches.sort();

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => bail!(
            "No .{extension} file found in the current directory; \
             pass one explicitly or place it next to the binary"
        ),
        _ => {
            let listing: Vec<String> = matches
                .iter()
                .map(|path| format!("  - {}", path.display()))
                .collect();
            bail!(
                "Several .{extension} files found in the current directory, \
                 pass one explicitly:\n{}",
                listing.join("\n")
            )
        }
    }
}

/// Determine the output path: local date plus a fixed descriptive suffix.
fn get_output_path(output_dir: Option<&Path>) -> Result<PathBuf> {
    let filename = format!(
        "{}_inserts.pdf",
        chrono::Local::now().format("%Y_%m_%d")
    );

    let output_path = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(filename)
        }
        None => PathBuf::from(filename),
    };

    Ok(output_path)
}
