//! MCControl root library.
//!
//! Wires the credential store, session registry, path sandbox and host
//! collaborator into one [`ControlState`], and exposes the HTTP router built
//! on top of it.
//!
//! # Architecture
//!
//! Every dependency is constructed here and passed down explicitly; nothing
//! is reachable through global state. Host mutations leave the request path
//! as [`HostCommand`](mccontrol_host::HostCommand)s and are applied by the
//! single [`HostLoop`] returned from [`initialize_control`]. The caller owns
//! that loop and decides where it runs.

pub mod config;
pub mod console;
pub mod error;
pub mod handlers;
pub mod http;

pub use config::{ControlConfig, HostConfig, HttpConfig, SessionConfig};
pub use error::{RootError, RootResult};
pub use http::{build_router, ApiError};

use mccontrol_core::HostView;
use mccontrol_files::{FileChangeLog, PathSandbox};
use mccontrol_host::{
    host_channel, HostLoop, HostModel, HostQueue, LogHub, MetricsCollector, ProcfsProbe,
    WorldView, STATE_FILE,
};
use mccontrol_vault::{CredentialStore, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything a request handler may touch.
pub struct ControlState {
    pub config: ControlConfig,
    pub credentials: CredentialStore,
    pub sessions: SessionRegistry,
    pub sandbox: PathSandbox,
    pub changelog: FileChangeLog,
    /// Read side of the host.
    pub host: Arc<dyn HostView>,
    /// Write side of the host.
    pub queue: HostQueue,
    pub world: WorldView,
    pub metrics: Arc<MetricsCollector>,
    pub logs: Arc<LogHub>,
}

impl ControlState {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.config.host.restart_delay_ms)
    }
}

/// Initialized state plus the host loop that must be spawned for queued
/// commands to take effect.
pub struct ControlRuntime {
    pub state: Arc<ControlState>,
    pub host_loop: HostLoop,
}

/// Load or create credentials under `config.data_dir` and build the runtime.
pub fn initialize_control(config: ControlConfig, logs: Arc<LogHub>) -> RootResult<ControlRuntime> {
    config.validate()?;
    let credentials = CredentialStore::open(&config.data_dir)?;
    info!(
        fingerprint = %credentials.fingerprint(),
        api_key = ?credentials.api_key_origin(),
        key_pair = ?credentials.key_pair_origin(),
        "credentials ready"
    );
    initialize_with_credentials(config, credentials, logs)
}

/// Build the runtime around an existing credential store.
pub fn initialize_with_credentials(
    config: ControlConfig,
    credentials: CredentialStore,
    logs: Arc<LogHub>,
) -> RootResult<ControlRuntime> {
    config.validate()?;
    std::fs::create_dir_all(&config.data_dir)?;

    let sandbox = PathSandbox::new(config.resolved_server_root()?)?;
    let changelog = FileChangeLog::open(&config.data_dir);
    let sessions = SessionRegistry::new(config.sessions.policy());

    let state_path = config.data_dir.join(STATE_FILE);
    let model = HostModel::load(&state_path);
    let (queue, world, host_loop) = host_channel(
        model,
        Arc::clone(&logs),
        Some(state_path),
        config.host.command_queue_capacity,
    );

    let metrics = Arc::new(MetricsCollector::new(
        Arc::new(ProcfsProbe::new()),
        config.host.metrics_capacity,
    ));

    info!(
        data_dir = %config.data_dir.display(),
        server_root = %sandbox.root().display(),
        "control plane initialized"
    );

    let state = ControlState {
        config,
        credentials,
        sessions,
        sandbox,
        changelog,
        host: Arc::new(world.clone()),
        queue,
        world,
        metrics,
        logs,
    };
    Ok(ControlRuntime {
        state: Arc::new(state),
        host_loop,
    })
}
