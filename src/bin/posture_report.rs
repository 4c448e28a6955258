use clap::Parser;
use posture_monitor::core::report::build_report;
use posture_monitor::core::session::SessionTotals;
use posture_monitor::domain::ports::SessionStore;
use posture_monitor::utils::logger;
use posture_monitor::{CsvSessionStore, LocalStorage, MonitorConfig};

#[derive(Parser)]
#[command(name = "posture-report")]
#[command(about = "Leaderboard report from the posture session log")]
struct Args {
    /// User to report on
    #[arg(short, long)]
    username: String,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Directory holding the session log (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }

    let store = CsvSessionStore::new(LocalStorage::new(config.data_dir()), config.log_file_name());
    let totals = store.user_totals().await?;
    tracing::debug!("Loaded totals for {} users", totals.len());

    let report = match build_report(&args.username, &totals, &SessionTotals::default()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    Ok(())
}
