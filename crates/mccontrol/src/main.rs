use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use mccontrol::console::ConsoleMakeWriter;
use mccontrol::{build_router, initialize_control, ControlConfig, RootError, RootResult};
use mccontrol_host::{run_sampler, HostCommand, LogHub};
use mccontrol_vault::CredentialStore;

/// MCControl: remote administration API for a Minecraft server.
#[derive(Parser, Debug)]
#[command(name = "mccontrol", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory, credentials and a default config
    Init {
        /// Directory for credentials and state
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Run the HTTP control API
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Directory file operations are confined to (overrides config)
        #[arg(long)]
        server_root: Option<PathBuf>,
    },

    /// Print the API key and the public key for configuring a backend
    ShowKey,
}

fn init_tracing(verbose: bool, logs: &Arc<LogHub>) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("mccontrol=debug,mccontrol_vault=debug,mccontrol_files=debug,mccontrol_host=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let console_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(ConsoleMakeWriter::new(logs));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(console_layer)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> RootResult<ControlConfig> {
    match path {
        Some(p) => ControlConfig::load(p),
        None => ControlConfig::load(&ControlConfig::default_config_path()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let logs = Arc::new(LogHub::open(&config.data_dir));
    init_tracing(cli.verbose, &logs);

    if let Err(e) = run(cli, config, logs).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ControlConfig, logs: Arc<LogHub>) -> RootResult<()> {
    match cli.command {
        Commands::Init { data_dir } => cmd_init(cli.config.as_ref(), config, data_dir),
        Commands::Serve {
            bind,
            port,
            server_root,
        } => cmd_serve(config, logs, bind, port, server_root).await,
        Commands::ShowKey => cmd_show_key(config),
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    mut config: ControlConfig,
    data_dir: Option<PathBuf>,
) -> RootResult<()> {
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config.validate()?;

    info!("initializing mccontrol");
    let credentials = CredentialStore::open(&config.data_dir)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(ControlConfig::default_config_path);
    config.save(&save_path)?;

    println!("MCControl initialized.");
    println!("  Data dir:    {}", config.data_dir.display());
    println!("  Config:      {}", save_path.display());
    println!("  API key:     {}", credentials.api_key());
    println!("  Fingerprint: {}", credentials.fingerprint());
    println!();
    println!("Keep the API key secret; the backend sends it as `Authorization: Bearer <key>`.");
    Ok(())
}

fn cmd_show_key(config: ControlConfig) -> RootResult<()> {
    let credentials = CredentialStore::open(&config.data_dir)?;
    println!("API key:    {}", credentials.api_key());
    println!("Public key: {}", credentials.public_key_base64());
    Ok(())
}

async fn cmd_serve(
    mut config: ControlConfig,
    logs: Arc<LogHub>,
    bind: Option<String>,
    port: Option<u16>,
    server_root: Option<PathBuf>,
) -> RootResult<()> {
    if let Some(bind) = bind {
        config.http.bind = bind;
    }
    if let Some(port) = port {
        config.http.port = port;
    }
    if let Some(root) = server_root {
        config.server_root = Some(root);
    }

    let addr: SocketAddr = format!("{}:{}", config.http.bind, config.http.port)
        .parse()
        .map_err(|e| RootError::Config(format!("invalid listen address: {}", e)))?;

    let runtime = initialize_control(config, Arc::clone(&logs))?;
    let state = runtime.state;
    let host_task = tokio::spawn(runtime.host_loop.run());

    let (stop_tx, stop_rx) = watch::channel(false);
    let sampler = tokio::spawn(run_sampler(
        Arc::clone(&state.metrics),
        Arc::clone(&state.host),
        Duration::from_secs(state.config.host.metrics_interval_secs),
        stop_rx.clone(),
    ));
    let flusher = tokio::spawn(flush_logs(
        Arc::clone(&logs),
        Duration::from_secs(state.config.host.log_flush_interval_secs),
        stop_rx,
    ));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "control API listening");

    let world = state.world.clone();
    let queue = state.queue.clone();
    axum::serve(listener, build_router(Arc::clone(&state)))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = world.wait_stopping() => info!("host stopped; shutting down"),
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("interrupt received; shutting down");
                        if let Err(e) = queue.submit(HostCommand::Shutdown).await {
                            warn!(error = %e, "host loop already stopped");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to listen for ctrl-c; waiting for the host to stop");
                        world.wait_stopping().await;
                    }
                },
            }
        })
        .await?;

    let _ = stop_tx.send(true);
    if let Err(e) = host_task.await {
        error!(error = %e, "host loop task failed");
    }
    let _ = tokio::join!(sampler, flusher);
    logs.flush_or_log();
    info!("mccontrol stopped");
    Ok(())
}

/// Persist the combined log every `interval` until `stop` turns true.
async fn flush_logs(logs: Arc<LogHub>, interval: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => logs.flush_or_log(),
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}
