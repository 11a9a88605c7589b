use std::fs::File;
use std::io::{stdout, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, TermLogger, TerminalMode};

use bamtrack::region_list::{read_region_list, RegionSelector};
use bamtrack::{DatasetLocator, LocalFileSource, Region, TimedSource, Viewer, ViewerConfig};

/// Show the reads of a SAM or BAM file over one region as a text track
#[derive(Parser)]
#[clap(version)]
struct Cli
{
    #[clap(long, short = 'l', default_value = "info")]
    log_level: LevelFilter,

    /// SAM (optionally gzipped) or BAM file
    #[clap(long, short = 'i')]
    input: PathBuf,

    /// Region to show, e.g. `chr1:10,000-10,400`
    #[clap(long, short = 'r')]
    region: String,

    /// File with one `name:start-end` line per chromosome
    #[clap(long, short = 'c')]
    chromosomes: Option<PathBuf>,

    /// Viewer settings as JSON
    #[clap(long)]
    config: Option<PathBuf>,

    /// Write the effective settings to this file
    #[clap(long)]
    save_config: Option<PathBuf>,

    /// Track width in pixels
    #[clap(long, short = 'w')]
    width: Option<f32>,

    /// After loading, centre the window on this base
    #[clap(long)]
    recenter: Option<u64>,

    #[clap(long)]
    timeout_ms: Option<u64>,

    /// Print the render model as JSON instead of the text track
    #[clap(long)]
    json: bool,
}

fn main() -> Result<()>
{
    let cli = Cli::parse();

    TermLogger::init(
        cli.log_level,
        Default::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("Failed to initialise logging")?;

    let mut config = match &cli.config
    {
        Some(path) => ViewerConfig::load_from_file(&path.to_string_lossy())?,
        None => ViewerConfig::default(),
    };
    if let Some(width) = cli.width
    {
        config.track_width_px = width;
    }
    if let Some(timeout_ms) = cli.timeout_ms
    {
        config.fetch_timeout_ms = timeout_ms;
    }
    if let Some(path) = &cli.save_config
    {
        config.save_to_file(&path.to_string_lossy())?;
        info!("Saved settings to {:?}", path);
    }

    let region: Region = cli.region.parse()?;
    let source = TimedSource::new(LocalFileSource, config.fetch_timeout());
    let mut viewer = Viewer::new(config, DatasetLocator::local(cli.input.to_string_lossy()));

    let mut selector = None;
    if let Some(path) = &cli.chromosomes
    {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let chromosomes = read_region_list(BufReader::new(file))?;
        info!("Read {} chromosomes from {:?}", chromosomes.len(), path);

        selector = chromosomes
            .iter()
            .find(|c| c.chromosome == region.chromosome)
            .cloned()
            .map(RegionSelector::new);
        viewer.set_chromosome_list(chromosomes);
    }

    info!("Loading {} from {:?}", region, cli.input);
    let mut model = viewer.set_visible_region(region, &source)?;

    if let Some(position) = cli.recenter
    {
        model = viewer.recenter(position, &source)?;
    }

    if let Some(selector) = &mut selector
    {
        selector.set_selected_region(&model.visible);
        info!("Centre at {} of {}", selector.value(), selector.range());
    }

    info!(
        "{} reads in {} rows, {} stored",
        model.spans.len(),
        model.rows,
        viewer.store().len()
    );

    let mut out = stdout().lock();
    if cli.json
    {
        serde_json::to_writer_pretty(&mut out, &model)?;
        writeln!(out)?;
    }
    else
    {
        write!(out, "{}", model.to_text())?;
    }

    Ok(())
}
