use crate::types::{ListEntry, PlayerRecord, PluginInfo, ServerInfo, Settings};

// ---------------------------------------------------------------------------
// HostView: read-only window onto the embedding host
//
// Implementations hand out owned plain data. Mutations never go through this
// trait; they are queued as commands for the host's own update loop.
// ---------------------------------------------------------------------------

pub trait HostView: Send + Sync {
    /// All known players, sorted case-insensitively by name.
    fn players(&self) -> Vec<PlayerRecord>;
    fn player(&self, uuid: &str) -> Option<PlayerRecord>;
    fn online_count(&self) -> usize;

    fn whitelist(&self) -> Vec<ListEntry>;
    fn whitelist_enabled(&self) -> bool;
    fn banned(&self) -> Vec<ListEntry>;
    fn operators(&self) -> Vec<ListEntry>;

    fn plugins(&self) -> Vec<PluginInfo>;
    fn server_info(&self) -> ServerInfo;
    fn settings(&self) -> Settings;
}

// ---------------------------------------------------------------------------
// MetricsProbe: pluggable source of host performance figures
//
// Every method may return None when the figure is unavailable; the metrics
// collector substitutes a nominal value.
// ---------------------------------------------------------------------------

pub trait MetricsProbe: Send + Sync {
    /// Ticks per second over the most recent window.
    fn tick_rate(&self) -> Option<f64> {
        None
    }

    /// Memory in use as a percentage of the available maximum.
    fn memory_percent(&self) -> Option<f64> {
        None
    }

    /// Process CPU load as a percentage.
    fn cpu_percent(&self) -> Option<f64> {
        None
    }
}

/// Probe with no data source at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NominalProbe;

impl MetricsProbe for NominalProbe {}
