// ==========================================
// FieldOps stock engine - command line entry
// ==========================================
// fieldops-stock [--db PATH] allocate [--out FILE] [--desc] ...
// fieldops-stock [--db PATH] import <FILE>
// fieldops-stock [--db PATH] relocate <SERIAL> <LOCATION>
// Without --db the database comes from FIELDOPS_STOCK_DB_PATH
// or the user data directory.
// ==========================================

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use fieldops_stock::api::{export_file_name, export_rows, write_export_csv, SortOrder, SupplyRequest};
use fieldops_stock::app::{get_default_db_path, AppState};
use fieldops_stock::i18n::t_with_args;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fieldops-stock",
    about = "Crew resupply and material liquidation over the stock database",
    version
)]
struct Cli {
    #[arg(long, global = true, help = "SQLite database path (default: FIELDOPS_STOCK_DB_PATH or the user data dir)")]
    db: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the resupply dispatch and write it as CSV
    Allocate(AllocateArgs),
    /// Import an equipment inventory file (.csv / .xlsx / .xls)
    Import {
        #[arg(help = "Inventory file with SN, equipo, descripcion, ubicacion, f_ingreso")]
        file: PathBuf,
    },
    /// Move one unit to a crew, almacen, instalado or an exclusion location
    Relocate {
        #[arg(help = "Equipment serial number")]
        serial: String,
        #[arg(help = "Crew name, almacen, instalado, robo, garantía, avería or pérdida")]
        location: String,
    },
}

#[derive(Args)]
struct AllocateArgs {
    #[arg(long, help = "Output file (default: DESPACHO-YYYYMMDD.csv in the working directory)")]
    out: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue, help = "Sort coordinators in descending order")]
    desc: bool,
    #[arg(long, help = "Date inside the consumption cycle, YYYY-MM-DD (default: today)")]
    anchor: Option<NaiveDate>,
    #[arg(long = "coordinator", help = "Only crews of this coordinator (repeatable)")]
    coordinators: Vec<String>,
    #[arg(long, help = "Crew name search, applied from 2 characters")]
    search: Option<String>,
    #[arg(long = "omit", help = "Crew id left out of this dispatch (repeatable)")]
    omitted: Vec<String>,
    #[arg(long = "reels", value_parser = parse_reels, help = "Residential reels for a crew, CREW_ID=N (repeatable)")]
    reels: Vec<(String, u32)>,
    #[arg(long = "condo-roll", help = "Crew id receiving a condominium roll (repeatable)")]
    condo_rolls: Vec<String>,
}

impl AllocateArgs {
    fn into_request(self) -> (SupplyRequest, SortOrder, Option<PathBuf>) {
        let mut request = SupplyRequest::default();
        request.filter.coordinators = self.coordinators.into_iter().collect();
        request.filter.name_query = self.search;
        request.omitted_crews = self.omitted.into_iter().collect();
        request.residential_reels = self.reels.into_iter().collect();
        request.condo_rolls = self.condo_rolls.into_iter().collect();
        request.anchor = self.anchor;
        let order = if self.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        (request, order, self.out)
    }
}

fn parse_reels(raw: &str) -> Result<(String, u32), String> {
    let (crew, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CREW_ID=N, got '{}'", raw))?;
    let count = count
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid reel count '{}': {}", count, e))?;
    Ok((crew.trim().to_string(), count))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    fieldops_stock::logging::init();
    tracing::info!(version = fieldops_stock::VERSION, "fieldops-stock starting");

    let state = AppState::new(cli.db.unwrap_or_else(get_default_db_path))?;

    match cli.command {
        Commands::Allocate(args) => {
            let (request, order, out) = args.into_request();
            let response = state
                .supply_api
                .compute_resupply(&request)
                .await
                .inspect_err(|e| eprintln!("{}", e.user_message()))?;
            let out =
                out.unwrap_or_else(|| PathBuf::from(export_file_name(response.generated_at.date())));

            let file = std::fs::File::create(&out)?;
            write_export_csv(&export_rows(&response, order), file)?;
            let shown = out.display().to_string();
            println!("{}", t_with_args("cli.export_written", &[("path", shown.as_str())]));
        }
        Commands::Import { file } => {
            let report = state
                .import_api
                .import_equipment(&file)
                .await
                .inspect_err(|e| eprintln!("{}", e.user_message()))?;

            let imported = report.imported.to_string();
            let total = report.total_rows.to_string();
            let skipped = report.skipped.len().to_string();
            let invalid = report.invalid_locations.len().to_string();
            println!(
                "{}",
                t_with_args(
                    "cli.import_summary",
                    &[
                        ("imported", imported.as_str()),
                        ("total", total.as_str()),
                        ("skipped", skipped.as_str()),
                        ("invalid", invalid.as_str()),
                    ]
                )
            );
        }
        Commands::Relocate { serial, location } => {
            let item = state
                .equipment_api
                .relocate(&serial, &location)
                .await
                .inspect_err(|e| eprintln!("{}", e.user_message()))?;
            let status = item.status.to_string();
            println!(
                "{}",
                t_with_args(
                    "cli.relocated",
                    &[
                        ("serial", item.serial.as_str()),
                        ("location", item.location.as_str()),
                        ("status", status.as_str()),
                    ]
                )
            );
        }
    }
    Ok(())
}
