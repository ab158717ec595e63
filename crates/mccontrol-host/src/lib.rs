pub mod command;
pub mod error;
pub mod logs;
pub mod metrics;
pub mod model;
pub mod view;

pub use command::{host_channel, HostCommand, HostLoop, HostQueue, DEFAULT_QUEUE_CAPACITY};
pub use error::*;
pub use logs::{LogBuffer, LogHub, COMBINED_LOG_FILE};
pub use metrics::{run_sampler, MetricsCollector, ProcfsProbe, NOMINAL_TPS};
pub use model::{GameRuleValue, HostModel, PlayerState, STATE_FILE};
pub use view::{HostSnapshot, WorldView};
