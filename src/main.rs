use clap::Parser;
use posture_monitor::adapters::serial::available_ports;
use posture_monitor::core::monitor::PostureMonitor;
use posture_monitor::domain::ports::SignalSink;
use posture_monitor::utils::error::{ErrorSeverity, PostureError};
use posture_monitor::utils::{logger, validation::Validate};
use posture_monitor::{CaptureService, CliConfig, CsvSessionStore, LocalStorage, ReplaySource, SerialSignal};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if cli.list_ports {
        let ports = available_ports(Path::new("/dev"));
        if ports.is_empty() {
            println!("No serial ports found.");
        }
        for (i, port) in ports.iter().enumerate() {
            println!("{}: {}", i, port.display());
        }
        return Ok(());
    }

    tracing::info!("Starting posture monitor");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Posture monitor failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig) -> Result<(), PostureError> {
    let config = cli.resolve()?;
    config.validate()?;

    let username = config.username()?.to_string();
    let storage = LocalStorage::new(config.data_dir());
    let store = CsvSessionStore::new(storage, config.log_file_name());

    let mut monitor = PostureMonitor::new(username, config.settings(), store);
    match config.serial_port() {
        Some(port) => match SerialSignal::open(port) {
            Ok(signal) => monitor = monitor.with_signal(Box::new(signal) as Box<dyn SignalSink>),
            Err(e) => tracing::warn!("{}; serial integration disabled", e),
        },
        None => tracing::info!("No serial port configured. Serial integration disabled."),
    }
    monitor.start().await?;

    let source = ReplaySource::from_path(config.landmarks_path()?, config.frame_interval())?;
    let mut capture = CaptureService::start(source, CaptureService::DEFAULT_RETRY_DELAY)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    monitor.run(&mut capture, config.interval(), shutdown).await;

    let totals = monitor.session_totals();
    println!(
        "✅ Session finished: good {:.1}s, slouch {:.1}s, ratio {:.1}%",
        totals.good.as_secs_f64(),
        totals.slouch.as_secs_f64(),
        totals.good_ratio()
    );

    if cli.report {
        let report = monitor.report().await?;
        println!("{}", report);
    }

    Ok(())
}
