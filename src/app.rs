use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::config::{DatasetProfile, QueryConfig, RegionPolicy};
use crate::constants::export::{BIRTH_RATE_MULTIPLIER, PREVALENCE_MULTIPLIER};
use crate::export::SummaryDocument;
use crate::locator::{LocalDirectoryLocator, PartitionLocator, PartitionScope};
use crate::orchestrator::{Orchestrator, QueryRequest};
use crate::rates::{PopulationTable, compute_rates};
use crate::source::ParquetPartitionReader;
use crate::types::Year;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SystemArg {
    Sim,
    Sinan,
    Sinasc,
}

impl From<SystemArg> for DatasetProfile {
    fn from(value: SystemArg) -> Self {
        match value {
            SystemArg::Sim => DatasetProfile::sim(),
            SystemArg::Sinan => DatasetProfile::sinan(),
            SystemArg::Sinasc => DatasetProfile::sinasc(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    PerState,
    Nationwide,
}

#[derive(Debug, Parser)]
#[command(
    name = "summarize",
    disable_help_subcommand = true,
    about = "Count registry records per municipality",
    long_about = "Stream local registry partitions and print per-municipality counts, optionally filtered by state and joined with a population table.",
    after_help = "Partitions are resolved under --root using <GROUP><UF><YYYY>.parquet (per-state) or <GROUP>BR<YY>.parquet (nationwide) names."
)]
struct SummarizeCli {
    #[arg(
        long,
        value_enum,
        required_unless_present = "profile",
        help = "Built-in dataset profile"
    )]
    system: Option<SystemArg>,
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "system",
        help = "JSON dataset profile used instead of a built-in one"
    )]
    profile: Option<PathBuf>,
    #[arg(long, help = "Dataset group code, e.g. DO, DN, DENG")]
    group: String,
    #[arg(
        long = "year",
        value_name = "YEAR",
        value_delimiter = ',',
        required = true,
        help = "Years to include, comma-separated or repeated"
    )]
    years: Vec<Year>,
    #[arg(
        long = "region",
        value_name = "UF",
        value_delimiter = ',',
        help = "State abbreviations to keep, comma-separated or repeated"
    )]
    regions: Vec<String>,
    #[arg(long, value_name = "DIR", help = "Directory holding downloaded partitions")]
    root: PathBuf,
    #[arg(
        long,
        value_enum,
        help = "Partition layout; defaults to nationwide for SINAN and per-state otherwise"
    )]
    scope: Option<ScopeArg>,
    #[arg(long, help = "Aggregate partitions in parallel")]
    parallel: bool,
    #[arg(long = "strict-regions", help = "Fail on unrecognized state abbreviations")]
    strict_regions: bool,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        help = "Write an export document here instead of printing the summary"
    )]
    output_dir: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "JSON population table; prints per-municipality rates instead of counts"
    )]
    population: Option<PathBuf>,
    #[arg(long, help = "Rate multiplier; defaults to 1000 for SINASC and 100000 otherwise")]
    multiplier: Option<f64>,
}

/// Run the `summarize` CLI, writing JSON output to `out`.
pub fn run_summarize<I, W>(args_iter: I, out: &mut W) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
    W: Write,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<SummarizeCli, _>(std::iter::once("summarize".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let profile = match (&cli.profile, cli.system) {
        (Some(path), _) => DatasetProfile::from_json_file(path)?,
        (None, Some(system)) => system.into(),
        (None, None) => return Err("either --system or --profile is required".into()),
    };
    let scope = match cli.scope {
        Some(ScopeArg::PerState) => PartitionScope::PerState,
        Some(ScopeArg::Nationwide) => PartitionScope::Nationwide,
        None if profile.system.eq_ignore_ascii_case("SINAN") => PartitionScope::Nationwide,
        None => PartitionScope::PerState,
    };
    let locator = match scope {
        PartitionScope::PerState => LocalDirectoryLocator::per_state(&cli.root),
        PartitionScope::Nationwide => LocalDirectoryLocator::nationwide(&cli.root),
    }
    .with_extension(profile.partition_extension.clone());

    let regions = (!cli.regions.is_empty()).then_some(cli.regions);
    let mut request = QueryRequest::new(cli.group, cli.years);
    if let Some(regions) = regions {
        request = request.with_regions(regions);
    }
    let partitions =
        locator.locate_all(&request.group_code, &request.years, request.regions.as_deref())?;

    let config = QueryConfig::default()
        .with_parallel_partitions(cli.parallel)
        .with_region_policy(if cli.strict_regions {
            RegionPolicy::Strict
        } else {
            RegionPolicy::Lenient
        });
    let reader = ParquetPartitionReader::new().with_extension(profile.partition_extension.clone());
    let orchestrator = Orchestrator::new(reader, profile.clone()).with_config(config);
    let report = orchestrator.execute(&request, &partitions)?;
    let summary = report.outcome.into_summary();

    if let Some(path) = &cli.population {
        let population = PopulationTable::from_json_file(path)?;
        let multiplier = cli.multiplier.unwrap_or(if profile.mother_age_column.is_some() {
            BIRTH_RATE_MULTIPLIER
        } else {
            PREVALENCE_MULTIPLIER
        });
        let rates = compute_rates(&summary, &population, multiplier);
        serde_json::to_writer_pretty(&mut *out, &rates)?;
        writeln!(out)?;
        return Ok(());
    }

    match &cli.output_dir {
        Some(dir) => {
            let document = SummaryDocument::new(
                profile.system.clone(),
                request.group_code.clone(),
                &request.years,
                request.regions.as_deref(),
                summary,
            );
            let path = document.write_to_dir(dir)?;
            writeln!(out, "{}", path.display())?;
        }
        None => {
            serde_json::to_writer_pretty(&mut *out, &summary)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
