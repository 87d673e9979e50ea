use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use mxl2ly::{convert_musicxml_to_lilypond, ConversionSettings};

#[derive(Debug, Parser)]
#[command(name = "mxl2ly")]
#[command(about = "Convert partwise MusicXML to LilyPond", long_about = None)]
struct Cli {
    /// Input file (*.musicxml)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file; defaults to the input with a .ly extension
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// YAML preferences file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Arranger credited in the header
    #[arg(long)]
    arranger: Option<String>,

    /// LilyPond version written to \version
    #[arg(long = "ly-version")]
    ly_version: Option<String>,

    /// Leave out parts that fail instead of aborting
    #[arg(long)]
    skip_failed_parts: bool,

    /// Write skipped elements as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log progress per measure
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut settings = match &cli.config {
        Some(path) => ConversionSettings::load(path)
            .with_context(|| format!("failed to load preferences: {}", path.display()))?,
        None => ConversionSettings::default(),
    };
    if let Some(arranger) = cli.arranger {
        settings.arranger = Some(arranger);
    }
    if let Some(version) = cli.ly_version {
        settings.target_lilypond_version = version;
    }
    settings.skip_failed_parts |= cli.skip_failed_parts;

    let musicxml = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read: {}", cli.input.display()))?;
    let result = convert_musicxml_to_lilypond(&musicxml, Some(settings))
        .with_context(|| format!("conversion failed: {}", cli.input.display()))?;

    let out_path = cli.output.unwrap_or_else(|| default_output_path(&cli.input));
    fs::write(&out_path, &result.lilypond_source)
        .with_context(|| format!("failed to write: {}", out_path.display()))?;
    log::info!(
        "Wrote {} ({} instruments, {} skipped elements)",
        out_path.display(),
        result.instruments.len(),
        result.skipped_elements.len()
    );

    if let Some(report_path) = cli.report {
        let json = serde_json::to_string_pretty(&result.skipped_elements)
            .context("failed to serialize report")?;
        fs::write(&report_path, json)
            .with_context(|| format!("failed to write: {}", report_path.display()))?;
    }

    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    let mut out = input.to_path_buf();
    out.set_extension("ly");
    out
}
