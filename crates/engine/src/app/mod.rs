mod loop_runner;
mod metrics;

pub use loop_runner::{
    env_override, run_headless, run_headless_with_metrics, AppError, GameHost, HostControl,
    HostError, LoopConfig, LoopSummary, Pacing, ShutdownReason, MAX_TICKS_ENV_VAR,
    WORKERS_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
