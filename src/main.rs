use std::env;
use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};

use vnghub::analysis::AnalysisService;
use vnghub::config::{AppConfig, ConfigManager};
use vnghub::logger;
use vnghub::recording::RecordingCatalog;
use vnghub::types::Axis;
use vnghub::utils::format_elapsed;

#[derive(Parser, Debug)]
#[command(name = "vnghub", version, about = "Nystagmus recording analysis")]
struct Cli {
    /// Configuration file (TOML). Defaults to $VNGHUB_CONFIG, then built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse a recorded CSV and print the nystagmus summary
    Analyze {
        csv: PathBuf,

        /// horizontal (yaw) or vertical (pitch)
        #[arg(long, default_value = "horizontal")]
        axis: Axis,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the recordings of a patient, newest first
    Records {
        #[arg(long)]
        patient_id: String,

        #[arg(long)]
        name: String,
    },
    /// Delete a recording CSV and its video
    Delete { csv: PathBuf },
    /// Write the default configuration to a file
    InitConfig { path: PathBuf },
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, Box<dyn Error>> {
    let path = path.or_else(|| env::var("VNGHUB_CONFIG").ok().map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ConfigManager::load_from_file(&path)?.get_config().clone()
        }
        None => AppConfig::default(),
    };

    if let Ok(root) = env::var("VNGHUB_DATA_ROOT") {
        config.recording.data_root = root;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::InitConfig { path } => {
            ConfigManager::new().save_to_file(&path)?;
            println!("Default configuration written to {}", path.display());
        }
        Command::Analyze { csv, axis, json } => {
            let config = load_config(cli.config)?;
            let service = AnalysisService::start(config.analysis(), config.channels.analysis_task_capacity);
            let response = service.submit(&csv, axis)?;
            let report = response.recv()??;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let duration = match (report.timestamps.first(), report.timestamps.last()) {
                    (Some(first), Some(last)) => last - first,
                    _ => 0.0,
                };
                println!("{}", csv.display());
                println!(
                    "{} samples over {}, {} turning points",
                    report.timestamps.len(),
                    format_elapsed(duration),
                    report.turning_points.len()
                );
                println!("{}", report.summary.describe());
            }
        }
        Command::Records { patient_id, name } => {
            let catalog = RecordingCatalog::from_config(&load_config(cli.config)?.recording);
            let records = catalog.list_records(&patient_id, &name)?;
            if records.is_empty() {
                println!("No recordings under {}", catalog.patient_dir(&patient_id, &name).display());
            }
            for record in records {
                println!("{:<14} {:<16} {}", record.test_type, record.stem, record.csv_path.display());
            }
        }
        Command::Delete { csv } => {
            let catalog = RecordingCatalog::from_config(&load_config(cli.config)?.recording);
            let video_removed = catalog.delete_record(&csv)?;
            println!(
                "Deleted {}{}",
                csv.display(),
                if video_removed { " and its video" } else { "" }
            );
        }
    }

    Ok(())
}

fn main() {
    dotenv().ok(); // 加载 .env 文件
    logger::init_logger();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
