//! JSON front end for the web upload flow: analyze one uploaded file, or
//! report the status of an earlier analysis.

use clap::{Parser, Subcommand};
use schemalens_lib::commands::{self, DEFAULT_UPLOAD_ROOT};
use schemalens_lib::{logging, Settings};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "schemalens-upload")]
#[command(about = "Analyze uploaded database files and report their status as JSON", long_about = None)]
#[command(version)]
struct Cli {
    /// Root folder holding `<user>/<analysis>/` result directories
    #[arg(long, global = true, default_value = DEFAULT_UPLOAD_ROOT)]
    root: PathBuf,

    #[arg(short, long, global = true, env = "SCHEMALENS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze an uploaded file
    Analyze {
        file: PathBuf,

        #[arg(long)]
        user_id: String,

        /// Generated when omitted
        #[arg(long)]
        analysis_id: Option<String>,
    },
    /// Report the status of an analysis
    Status {
        analysis_id: String,

        #[arg(long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = match logging::init(cli.verbose, None) {
        Ok(guard) => guard,
        Err(e) => return emit(&json!({"status": "error", "message": format!("{:#}", e)})),
    };

    let response = match cli.command {
        Command::Analyze {
            file,
            user_id,
            analysis_id,
        } => match Settings::load(cli.config.as_deref()) {
            Ok(mut settings) => {
                settings.output.cleanup = false;
                commands::analyze_upload(&settings, &file, analysis_id.as_deref(), &user_id, &cli.root).await
            }
            Err(e) => json!({"status": "error", "message": format!("Configuration error: {}", e)}),
        },
        Command::Status {
            analysis_id,
            user_id,
        } => commands::analysis_status(&analysis_id, &user_id, &cli.root),
    };
    emit(&response)
}

fn emit(response: &Value) -> ExitCode {
    match serde_json::to_string_pretty(response) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", response),
    }
    if response["status"] == "error" {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
