use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use certbot_exporter::config::{Config, OutputFormat, Settings};
use certbot_exporter::logging::init_logging;
use certbot_exporter::server::{self, ServerState};
use certbot_exporter::{CertificateMetrics, CertificateStore, CycleReport, Scanner};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "certbot-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Certbot live directory to scan
    #[arg(long, global = true, env = "CERTBOT_EXPORTER_CERT_DIR")]
    cert_dir: Option<String>,

    /// Log filter, e.g. "info" or "certbot_exporter=debug"
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the store once and print the result
    Scan {
        #[arg(short, long, value_enum)]
        output: Option<OutputFormat>,

        /// Push the gauges to a Prometheus Push Gateway after the scan
        #[arg(long)]
        push: bool,

        /// Push Gateway address
        #[arg(long)]
        push_address: Option<String>,
    },
    /// Serve the gauges over HTTP
    Serve {
        /// Listen address, e.g. 0.0.0.0:9866
        #[arg(short, long)]
        address: Option<String>,
    },
    /// Print an example configuration file
    ExampleConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::ExampleConfig = cli.command {
        print!("{}", Config::example_toml());
        return ExitCode::SUCCESS;
    }

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings.log_level, settings.log_json) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, &settings) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "certbot-exporter failed");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let file_config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let (output, push, push_address, address) = match &cli.command {
        Command::Scan {
            output,
            push,
            push_address,
        } => (*output, push.then_some(true), push_address.clone(), None),
        Command::Serve { address } => (None, None, None, address.clone()),
        Command::ExampleConfig => (None, None, None, None),
    };

    let cli_config = Config::from_cli_args(
        cli.cert_dir.clone(),
        output,
        address,
        cli.log_level.clone(),
        cli.log_json.then_some(true),
        push,
        push_address,
    );

    Ok(Config::defaults()
        .merge_with(file_config)
        .merge_with(cli_config)
        .validate()?)
}

fn run(command: Command, settings: &Settings) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let store = CertificateStore::open(&settings.cert_dir)?;
    let metrics = Arc::new(CertificateMetrics::with_process_metrics()?);
    let scanner = Scanner::new(store, Arc::clone(&metrics));

    match command {
        Command::Scan { .. } => {
            let report = scanner.run_cycle()?;
            match settings.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => print_report(&report),
            }

            if let Some(target) = &settings.push {
                if let Err(e) = metrics.push(&target.address, &target.job) {
                    error!(address = %target.address, error = %e, "Failed to push metrics");
                    return Ok(ExitCode::FAILURE);
                }
                info!(address = %target.address, "Pushed certificate metrics");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { .. } => {
            let state = Arc::new(ServerState::new(scanner, settings.scan_on_scrape));
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(
                state,
                settings.address,
                Duration::from_secs(settings.interval_secs),
            ))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ExampleConfig => Ok(ExitCode::SUCCESS),
    }
}

fn print_report(report: &CycleReport) {
    if report.certificates.is_empty() && report.errors.is_empty() {
        println!("No certificates found");
        return;
    }

    if !report.certificates.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Certificate", "Days left", "Expires (UTC)"]);
        for cert in &report.certificates {
            table.add_row(vec![
                cert.subject.clone(),
                cert.days_remaining.to_string(),
                cert.expiration.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]);
        }
        println!("{table}");
    }

    if !report.errors.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Path", "Kind", "Cause"]);
        for failure in &report.errors {
            table.add_row(vec![
                failure.source_path.display().to_string(),
                failure.kind.to_string(),
                failure.cause.clone(),
            ]);
        }
        println!("{table}");
    }

    println!(
        "Processed: {}  Skipped: {}",
        report.processed, report.skipped
    );
}
