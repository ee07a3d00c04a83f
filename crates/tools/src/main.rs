use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use compute::{DashboardOutcome, DashboardQuery, Dataset, JoinPredicate, SpeciesFilter};
use formats::{DatasetConfig, export};
use serde::Serialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Species occurrence summaries per country")]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    #[command(subcommand)]
    command: Command,
}

/// Input selection shared by every subcommand; unset flags fall back to the
/// OCCURRENCE_* / COUNTRIES_* environment.
#[derive(Args, Debug)]
struct DataArgs {
    /// Occurrence table (.parquet is columnar, .csv comma separated, anything else tab separated)
    #[arg(long, global = true)]
    occurrences: Option<PathBuf>,

    /// Country boundaries GeoJSON
    #[arg(long, global = true)]
    countries: Option<PathBuf>,

    /// Keep only this species (repeatable); none means all species
    #[arg(long = "species", global = true)]
    species: Vec<String>,

    /// Point-in-country rule
    #[arg(long, global = true, default_value_t = JoinPredicate::Within)]
    predicate: JoinPredicate,

    /// Read at most this many occurrence rows
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Feature property holding the country name
    #[arg(long, global = true)]
    name_field: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Headline metrics for the selection
    Summary {
        #[arg(long, default_value_t = compute::DEFAULT_TOP_N)]
        top_n: usize,
    },

    /// Distinct species per country
    Richness,

    /// Most recorded species
    TopSpecies {
        #[arg(long, default_value_t = compute::DEFAULT_TOP_N)]
        top_n: usize,
    },

    /// Distinct species names
    Species,

    /// Write the selection as CSV, point GeoJSON or a country choropleth
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ExportFormat {
    Csv,
    Geojson,
    Choropleth,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = real_main(Cli::parse()) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<(), String> {
    let config = dataset_config(&cli.data);
    debug!(
        "occurrences={} countries={}",
        config.occurrences_path.display(),
        config.countries_path.display()
    );
    let dataset = Dataset::load(&config).map_err(|e| format!("load: {e}"))?;
    let filter: SpeciesFilter = cli.data.species.iter().map(String::as_str).collect();
    let predicate = cli.data.predicate;
    let json = cli.data.json;

    match cli.command {
        Command::Summary { top_n } => cmd_summary(&dataset, filter, predicate, top_n, json),
        Command::Richness => cmd_richness(&dataset, &filter, predicate, json),
        Command::TopSpecies { top_n } => {
            let rows = dataset.top_species(&filter, top_n);
            if json {
                return print_json(&rows);
            }
            for row in rows {
                println!("{}\t{}", row.occurrences, row.species);
            }
            Ok(())
        }
        Command::Species => {
            if json {
                return print_json(&dataset.species());
            }
            for name in dataset.species() {
                println!("{name}");
            }
            Ok(())
        }
        Command::Export { format, out } => cmd_export(&dataset, &filter, predicate, format, out),
    }
}

fn dataset_config(args: &DataArgs) -> DatasetConfig {
    let mut config = DatasetConfig::from_env();
    if let Some(path) = &args.occurrences {
        config.occurrences_path = path.clone();
    }
    if let Some(path) = &args.countries {
        config.countries_path = path.clone();
    }
    if args.limit.is_some() {
        config.occurrence.limit = args.limit;
    }
    if let Some(field) = &args.name_field {
        config.boundary.name_field = field.clone();
    }
    config
}

fn cmd_summary(
    dataset: &Dataset,
    species: SpeciesFilter,
    predicate: JoinPredicate,
    top_n: usize,
    json: bool,
) -> Result<(), String> {
    let query = DashboardQuery {
        species,
        top_n,
        predicate,
    };
    let outcome = dataset.dashboard(&query).map_err(|e| e.to_string())?;
    if json {
        return print_json(&outcome);
    }

    let report = match outcome {
        DashboardOutcome::Empty { message } => {
            println!("{message}");
            return Ok(());
        }
        DashboardOutcome::Ready(report) => report,
    };
    let m = &report.metrics;
    println!("total records:           {}", m.total_records);
    println!("unique species:          {}", m.unique_species);
    println!("countries with presence: {}", m.countries_with_presence);
    println!("coordinate quality:      {:.1}%", m.coordinate_quality_pct);
    if let Some(center) = m.center {
        println!(
            "map center:              {:.4}, {:.4}",
            center.latitude, center.longitude
        );
    }
    println!(
        "richness range:          {}..{} ({predicate})",
        report.richness.min().unwrap_or(0),
        report.richness.max().unwrap_or(0)
    );
    println!("top species:");
    for row in &report.top_species {
        println!("  {:>6}  {}", row.occurrences, row.species);
    }
    Ok(())
}

fn cmd_richness(
    dataset: &Dataset,
    filter: &SpeciesFilter,
    predicate: JoinPredicate,
    json: bool,
) -> Result<(), String> {
    let richness = dataset
        .richness(filter, predicate)
        .map_err(|e| e.to_string())?;
    if json {
        return print_json(&richness);
    }
    for row in &richness.rows {
        println!("{}\t{}", row.species_count, row.country);
    }
    Ok(())
}

fn cmd_export(
    dataset: &Dataset,
    filter: &SpeciesFilter,
    predicate: JoinPredicate,
    format: ExportFormat,
    out: Option<PathBuf>,
) -> Result<(), String> {
    let bytes = match format {
        ExportFormat::Csv => {
            let mut buf = Vec::new();
            export::write_csv(&dataset.filtered(filter), &mut buf, b',')
                .map_err(|e| format!("csv: {e}"))?;
            buf
        }
        ExportFormat::Geojson => dataset.export_geojson(filter).to_string().into_bytes(),
        ExportFormat::Choropleth => dataset
            .choropleth(filter, predicate)
            .map_err(|e| e.to_string())?
            .to_string()
            .into_bytes(),
    };

    match out {
        Some(path) => {
            fs::write(&path, &bytes).map_err(|e| format!("write {path:?}: {e}"))?;
            eprintln!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => io::stdout()
            .write_all(&bytes)
            .map_err(|e| format!("stdout: {e}"))?,
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let payload = serde_json::to_string_pretty(value).map_err(|e| format!("json: {e}"))?;
    println!("{payload}");
    Ok(())
}
