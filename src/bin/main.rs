//! ledgerview CLI - run reports over a directory of entity JSON files
//!
//! Usage:
//!   ledgerview entities [--data <dir>]
//!   ledgerview table <report.toml> [--data <dir>] [--page <n>]
//!   ledgerview metric <report.toml> [--data <dir>] [--grain <grain>]
//!   ledgerview validate <report.toml>
//!
//! Examples:
//!   ledgerview entities --data ./export
//!   ledgerview table reports/failed_charges.toml --page 2
//!   ledgerview metric reports/average_charge.toml --grain week

use clap::{Parser, Subcommand, ValueEnum};
use ledgerview::config::Settings;
use ledgerview::metric::{block_unit, CalculationOutcome};
use ledgerview::model::{FieldRef, FieldType, ReportConfig, Schema, TimeGrain, Value};
use ledgerview::report::{load_report_config, load_required, ReportEngine};
use ledgerview::units::{format_value_by_unit, resolve_result_unit, unit_label};
use ledgerview::view::{paginate, TableView};
use ledgerview::warehouse::{EntityLoader, JsonDirLoader, Warehouse};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledgerview")]
#[command(about = "ledgerview - tables and unit-checked metrics over ledger data")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $LEDGERVIEW_CONFIG, ./ledgerview.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entities available in the data directory
    Entities {
        /// Directory of <entity>.json files
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Print the rows of a report
    Table {
        /// Path to the report (.toml or .json)
        report: PathBuf,

        /// Directory of <entity>.json files
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Page to print (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Evaluate the metric formula of a report
    Metric {
        /// Path to the report (.toml or .json)
        report: PathBuf,

        /// Directory of <entity>.json files
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Also print one value per bucket of this grain
        #[arg(short, long)]
        grain: Option<GrainArg>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Check a report's fields and formula units without loading data
    Validate {
        /// Path to the report (.toml or .json)
        report: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GrainArg {
    Day,
    Week,
    Month,
}

impl From<GrainArg> for TimeGrain {
    fn from(arg: GrainArg) -> Self {
        match arg {
            GrainArg::Day => TimeGrain::Day,
            GrainArg::Week => TimeGrain::Week,
            GrainArg::Month => TimeGrain::Month,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Aligned plain text
    Text,
    /// JSON
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings);

    match cli.command {
        Commands::Entities { data } => cmd_entities(&settings, data).await,
        Commands::Table {
            report,
            data,
            page,
            output,
        } => cmd_table(&settings, report, data, page, output).await,
        Commands::Metric {
            report,
            data,
            grain,
            output,
        } => cmd_metric(&settings, report, data, grain, output).await,
        Commands::Validate { report } => cmd_validate(&settings, report),
    }
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_warehouse(settings: &Settings, data: Option<PathBuf>) -> Result<Warehouse<JsonDirLoader>, ExitCode> {
    let dir = match data {
        Some(dir) => dir,
        None => match settings.warehouse.resolved_data_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Error resolving data directory: {}", e);
                return Err(ExitCode::FAILURE);
            }
        },
    };
    Ok(Warehouse::new(JsonDirLoader::new(dir)))
}

fn read_report(path: &PathBuf) -> Result<ReportConfig, ExitCode> {
    load_report_config(path).map_err(|e| {
        eprintln!("Error reading report '{}': {}", path.display(), e);
        ExitCode::FAILURE
    })
}

/// Load what the report needs; failures are reported, not fatal.
async fn prepare(
    settings: &Settings,
    warehouse: &Warehouse<JsonDirLoader>,
    config: &ReportConfig,
) {
    warehouse.preload(&settings.warehouse.preload).await;
    for error in load_required(warehouse, config).await {
        eprintln!("Warning: {} (showing it as empty)", error);
    }
}

async fn cmd_entities(settings: &Settings, data: Option<PathBuf>) -> ExitCode {
    let warehouse = match open_warehouse(settings, data) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let names = match warehouse.loader().list_entities().await {
        Ok(names) => names,
        Err(e) => {
            eprintln!("Error listing entities: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if names.is_empty() {
        println!("No entities found in {}", warehouse.loader().dir().display());
        return ExitCode::SUCCESS;
    }

    let schema = settings.effective_schema();
    println!("Entities:");
    for (name, result) in warehouse.preload(&names).await {
        let described = if schema.entity(&name).is_some() { "" } else { " (no schema)" };
        match result {
            Ok(_) => {
                let rows = warehouse.get_entity(&name).map_or(0, |e| e.records.len());
                println!("  - {} ({} rows){}", name, rows, described);
            }
            Err(e) => println!("  - {} (failed: {})", name, e),
        }
    }

    ExitCode::SUCCESS
}

async fn cmd_table(
    settings: &Settings,
    report: PathBuf,
    data: Option<PathBuf>,
    page: usize,
    output: OutputFormat,
) -> ExitCode {
    let config = match read_report(&report) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let warehouse = match open_warehouse(settings, data) {
        Ok(w) => w,
        Err(code) => return code,
    };
    prepare(settings, &warehouse, &config).await;

    let engine = ReportEngine::from_settings(settings);
    let table = match engine.table(&warehouse.snapshot(), &config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Report error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let page = paginate(&table.rows, page, settings.report.page_size);
    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&page) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing rows: {}", e);
                return ExitCode::FAILURE;
            }
        },
        OutputFormat::Text => {
            let shown = TableView {
                rows: page.items,
                ..table
            };
            print_table(&shown, engine.schema());
            println!();
            println!(
                "Page {} of {} ({} rows)",
                page.page, page.total_pages, page.total_items
            );
        }
    }

    ExitCode::SUCCESS
}

async fn cmd_metric(
    settings: &Settings,
    report: PathBuf,
    data: Option<PathBuf>,
    grain: Option<GrainArg>,
    output: OutputFormat,
) -> ExitCode {
    let mut config = match read_report(&report) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Some(grain) = grain {
        config.grain = Some(grain.into());
    }
    if config.formula.is_none() {
        eprintln!("Report '{}' has no formula", report.display());
        return ExitCode::FAILURE;
    }
    let warehouse = match open_warehouse(settings, data) {
        Ok(w) => w,
        Err(code) => return code,
    };
    prepare(settings, &warehouse, &config).await;

    let engine = ReportEngine::from_settings(settings);
    let snapshot = warehouse.snapshot();
    let result = engine.metrics(&snapshot, &config).and_then(|formula| {
        let series = match grain {
            Some(_) => engine.series(&snapshot, &config)?,
            None => Vec::new(),
        };
        Ok((formula, series))
    });
    let (formula, series) = match result {
        Ok((Some(formula), series)) => (formula, series),
        Ok((None, _)) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Report error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let OutputFormat::Json = output {
        let payload = serde_json::json!({ "formula": formula, "series": series });
        return match serde_json::to_string_pretty(&payload) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing result: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    println!("Blocks:");
    for block in &formula.blocks {
        println!(
            "  {} = {} ({})",
            block.block_id,
            format_value_by_unit(block.value, block.unit),
            unit_label(block.unit)
        );
    }

    match &formula.calculation {
        Some(CalculationOutcome::Value { value, unit }) => {
            println!();
            println!("Result: {} ({})", format_value_by_unit(*value, *unit), unit_label(*unit));
        }
        Some(CalculationOutcome::Invalid { error }) => {
            println!();
            println!("Result: not computed: {}", error);
        }
        None => {}
    }

    for block in &series {
        println!();
        println!("Series {}:", block.block_id);
        for point in &block.points {
            println!(
                "  {}  {}",
                point.bucket.start.format("%Y-%m-%d"),
                format_value_by_unit(point.value, block.unit)
            );
        }
        println!(
            "  average per bucket  {}",
            format_value_by_unit(block.average_per_bucket(), block.unit)
        );
    }

    ExitCode::SUCCESS
}

fn cmd_validate(settings: &Settings, report: PathBuf) -> ExitCode {
    let config = match read_report(&report) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let schema = settings.effective_schema();

    let mut problems = Vec::new();
    let mut check_field = |field: &FieldRef, context: &str| {
        if schema.field(field).is_none() {
            problems.push(format!("{}: unknown field '{}'", context, field));
        }
    };

    for field in &config.fields {
        check_field(field, "fields");
    }
    for condition in &config.filters.conditions {
        check_field(&condition.field, "filters");
    }

    if let Some(formula) = &config.formula {
        for block in &formula.blocks {
            if let Some(source) = &block.source {
                check_field(source, &format!("block '{}'", block.id));
            }
        }

        if let Some(calc) = &formula.calculation {
            let unit_of = |id: &str| formula.block(id).map(|b| block_unit(b, &schema));
            match (unit_of(&calc.left), unit_of(&calc.right)) {
                (Some(left), Some(right)) => {
                    match resolve_result_unit(calc.operator, left, right, calc.result_unit) {
                        Ok(unit) => println!(
                            "Formula: {} {} {} -> {}",
                            left,
                            calc.operator.symbol(),
                            right,
                            unit
                        ),
                        Err(e) => problems.push(format!("formula: {}", e)),
                    }
                }
                (left, _) => {
                    let missing = if left.is_none() { &calc.left } else { &calc.right };
                    problems.push(format!("formula: unknown block '{}'", missing));
                }
            }
        }
    }

    if !problems.is_empty() {
        eprintln!("Validation errors:");
        for problem in &problems {
            eprintln!("  {}", problem);
        }
        return ExitCode::FAILURE;
    }

    println!("OK: {} is valid", report.display());
    ExitCode::SUCCESS
}

fn print_table(table: &TableView, schema: &Schema) {
    let header: Vec<String> = table.columns.clone();
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .map(|column| format_cell(schema, column, row.get(column)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .max()
                .unwrap_or(0)
                .max(h.chars().count())
        })
        .collect();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(&header));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in &cells {
        println!("{}", line(row));
    }
}

/// Numbers are shown in their unit; everything else as text.
fn format_cell(schema: &Schema, column: &str, value: &Value) -> String {
    if value.is_null() {
        return "-".to_string();
    }
    let Ok(field) = column.parse::<FieldRef>() else {
        return value.to_string();
    };
    match schema.field_type(&field) {
        Some(FieldType::Number) => format_value_by_unit(value.as_f64(), schema.unit_of(&field)),
        _ => value.to_string(),
    }
}
