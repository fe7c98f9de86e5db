use anyhow::{anyhow, bail, Context, Result};
use crayfish_survey::database::{ListQuery, Table};
use crayfish_survey::survey::Gender;
use crayfish_survey::{Dataset, SurveyConfig, SurveyService};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage: ingest [--source <workbook.xlsx>] [--reingest] [--export <table>=<file.csv>]...";

#[derive(Debug, Default)]
struct Arguments {
    source: Option<PathBuf>,
    reingest: bool,
    exports: Vec<(Table, PathBuf)>,
}

fn parse_arguments() -> Result<Arguments> {
    let mut arguments = Arguments::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--source" => {
                let path = args.next().ok_or_else(|| anyhow!("--source needs a path\n{USAGE}"))?;
                arguments.source = Some(PathBuf::from(path));
            }
            "--reingest" => arguments.reingest = true,
            "--export" => {
                let target = args.next().ok_or_else(|| anyhow!("--export needs <table>=<file>\n{USAGE}"))?;
                let (table, path) = target
                    .split_once('=')
                    .ok_or_else(|| anyhow!("invalid export '{target}'\n{USAGE}"))?;
                let table = table.parse::<Table>().map_err(|e| anyhow!("{e}"))?;
                arguments.exports.push((table, PathBuf::from(path)));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unexpected argument '{other}'\n{USAGE}"),
        }
    }
    Ok(arguments)
}

fn summarize(service: &SurveyService, dataset: &Dataset) -> Result<()> {
    for (sheet, report) in [
        ("by_method", &dataset.by_method_report),
        ("by_site", &dataset.by_site_report),
    ] {
        tracing::info!(
            sheet,
            fragments = report.fragments,
            missing_fragments = report.missing_fragments,
            empty_rows = report.empty_rows,
            invalid_genders = report.invalid_genders,
            invalid_measurements = report.invalid_measurements,
            output_rows = report.output_rows,
            genders = ?report.raw_genders,
            "data quality"
        );
    }
    let engine = service.engine();
    for site in engine.sites()? {
        let counts = engine.sex_counts(&site)?;
        tracing::info!(site = %site, female = counts.female, male = counts.male, "site summary");
    }
    for (site, weight) in engine.mean_weight_by_site()? {
        tracing::info!(site = %site, mean_weight = weight, "mean weight");
    }
    for point in engine.population_trend(&Gender::ALL)? {
        tracing::info!(year = point.year, site = %point.site, count = point.count, "population trend");
    }
    Ok(())
}

fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,crayfish_survey=debug"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let arguments = parse_arguments()?;
    let mut config = SurveyConfig::from_env().context("Failed to load configuration")?;
    if let Some(source) = arguments.source {
        config.source = source;
    }
    let source = config.source.clone();

    let service = SurveyService::open(config).context("Failed to open survey store")?;
    let dataset = if arguments.reingest {
        service
            .reingest(&source)
            .with_context(|| format!("Failed to re-ingest {}", source.display()))?
    } else {
        service.dataset()
    };
    summarize(&service, &dataset)?;

    for (table, path) in arguments.exports {
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let rows = service
            .repository()
            .export_csv(table, &ListQuery::new(), BufWriter::new(file))
            .with_context(|| format!("Failed to export {table}"))?;
        tracing::info!(table = %table, path = %path.display(), rows, "exported table");
    }
    Ok(())
}
