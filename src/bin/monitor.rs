use std::fs::OpenOptions;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use service_monitor::{
    MonitorEngine,
    logging::{self, MessageFilter},
    read_config_file, util,
};
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Watches OS services and alerts when they go down")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "configs/default.json")]
    config: String,

    /// Dashboard bind address [default: MONITOR_HOST or 127.0.0.1]
    #[arg(long)]
    host: Option<IpAddr>,

    /// Dashboard port [default: MONITOR_PORT or 8080]
    #[arg(long)]
    port: Option<u16>,

    /// Log file [default: logs/service-monitor-<date>.log]
    #[arg(long)]
    log: Option<PathBuf>,

    /// Only log to stderr
    #[arg(long)]
    no_file_log: bool,

    /// Only write log lines containing this text to the log file
    #[arg(long)]
    log_filter: Option<String>,

    /// Do not serve the dashboard
    #[arg(long)]
    no_dashboard: bool,

    /// Stop after this many seconds, 0 runs forever
    #[arg(long, default_value_t = 0)]
    run_for: u64,

    /// Log everything down to TRACE
    #[arg(short, long)]
    verbose: bool,
}

fn init(args: &Args) -> anyhow::Result<()> {
    let level = if args.verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![("service_monitor", level)]);

    let file_layer = if args.no_file_log {
        None
    } else {
        let path = args
            .log
            .clone()
            .unwrap_or_else(|| logging::default_log_path(Local::now().date_naive()));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(MessageFilter::new(args.log_filter.clone())),
        )
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(&args)?;
    trace!("started with args: {args:?}");

    match util::privilege_warning(nix::unistd::geteuid()) {
        Some(warning) => warn!("{warning}"),
        None => debug!("running as root"),
    }

    let config = read_config_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    let mut engine = MonitorEngine::from_config(config);
    engine.initialize().await?;

    if !args.no_dashboard {
        serve_dashboard(&args, &engine).await?;
    }

    engine.start()?;

    let stop = engine.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received ctrl-c, stopping"),
            Err(e) => warn!("failed to listen for ctrl-c: {e}"),
        }
        stop.stop();
    });

    if args.run_for > 0 {
        engine.run_for(Duration::from_secs(args.run_for));
    }

    engine.run_until_stopped().await;
    Ok(())
}

#[cfg(feature = "api")]
async fn serve_dashboard(args: &Args, engine: &MonitorEngine) -> anyhow::Result<()> {
    use service_monitor::api::{ApiConfig, ApiState, spawn_api_server};

    let bind_addr = SocketAddr::new(
        args.host.unwrap_or_else(util::get_host),
        args.port.unwrap_or_else(util::get_port),
    );
    let config = ApiConfig {
        bind_addr,
        enable_cors: false,
    };

    spawn_api_server(config, ApiState::from_engine(engine)).await?;
    Ok(())
}

#[cfg(not(feature = "api"))]
async fn serve_dashboard(args: &Args, _engine: &MonitorEngine) -> anyhow::Result<()> {
    let bind_addr = SocketAddr::new(
        args.host.unwrap_or_else(util::get_host),
        args.port.unwrap_or_else(util::get_port),
    );
    warn!("built without the api feature, not serving a dashboard on {bind_addr}");
    Ok(())
}
