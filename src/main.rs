mod cadence;
mod config;
mod logger;
mod provider;
mod screen;
mod session;
mod snapshot;

use cadence::Cadence;
use clap::Parser;
use config::{Config, DisplayMode};
use logger::BatchLogger;
use provider::SysinfoProvider;
use screen::{ChartScreen, Dashboard, Quiet, Screen};
use session::Session;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostlog")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long, conflicts_with = "no_display")]
    charts: bool,
    #[arg(long, conflicts_with = "charts")]
    no_display: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "не удалось загрузить конфигурацию");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(dir) = cli.log_dir {
        cfg.log_dir = dir;
    }
    if cli.charts {
        cfg.display = DisplayMode::Charts;
    } else if cli.no_display {
        cfg.display = DisplayMode::Off;
    }

    let provider = SysinfoProvider::new();
    info!(
        host = provider.host(),
        log_dir = %cfg.log_dir.display(),
        interval_ms = cfg.interval_ms,
        display = ?cfg.display,
        "запуск hostlog"
    );

    let screen: Box<dyn Screen + Send> = match cfg.display {
        DisplayMode::Dashboard => Box::new(Dashboard::stdout()),
        DisplayMode::Charts => Box::new(ChartScreen::stdout(cfg.chart_history, cfg.chart_height)),
        DisplayMode::Off => Box::new(Quiet),
    };
    let logger = BatchLogger::new(&cfg.log_dir, cfg.flush_threshold);
    let cadence = Cadence::new(cfg.interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let session_task = tokio::spawn(async move {
        let mut session = Session::new(provider, screen, logger, cadence);
        session.run(shutdown_rx).await
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "не удалось дождаться Ctrl+C");
    }
    info!("получен Ctrl+C, выполняется остановка");

    let _ = shutdown_tx.send(true);

    match session_task.await {
        Ok(Some(Err(_))) => error!("часть данных не сохранена, см. сообщения выше"),
        Ok(_) => {}
        Err(err) => error!(error = %err, "задача сбора завершилась аварийно"),
    }

    tokio::time::sleep(cfg.shutdown_grace()).await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
