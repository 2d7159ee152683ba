use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::ecs::{EcsError, World, WorldConfig};

use super::metrics::{MetricsAccumulator, MetricsHandle};

pub const WORKERS_ENV_VAR: &str = "STRATEGOS_WORKERS";
pub const MAX_TICKS_ENV_VAR: &str = "STRATEGOS_MAX_TICKS";

/// How wall time feeds the fixed-step accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Frame deltas come from the wall clock; the loop sleeps between ticks.
    #[default]
    RealTime,
    /// Every frame feeds exactly one fixed step. Used for batch runs and tests.
    Unpaced,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many ticks. `None` runs until the host quits.
    pub max_ticks: Option<u64>,
    pub worker_count: usize,
    pub pacing: Pacing,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
            worker_count: 1,
            pacing: Pacing::RealTime,
        }
    }
}

impl LoopConfig {
    /// Applies `STRATEGOS_WORKERS` and `STRATEGOS_MAX_TICKS` (0 means unlimited).
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        self.worker_count =
            env_override(WORKERS_ENV_VAR, env::var(WORKERS_ENV_VAR), self.worker_count);
        let max_ticks = env_override(
            MAX_TICKS_ENV_VAR,
            env::var(MAX_TICKS_ENV_VAR),
            self.max_ticks.unwrap_or(0),
        );
        self.max_ticks = (max_ticks > 0).then_some(max_ticks);
        self
    }

    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps.max(1) as f64)
    }
}

pub type HostError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostControl {
    Continue,
    Quit,
}

/// Game-side hooks driven by the loop runner.
pub trait GameHost {
    /// Register systems and world singletons.
    fn on_systems_init(&mut self, world: &mut World) -> Result<(), HostError>;

    /// Create the initial entities and load content.
    fn on_game_init(&mut self, world: &mut World) -> Result<(), HostError>;

    /// Called once per tick before `World::update`.
    fn on_update(&mut self, world: &mut World, dt: f32) -> Result<HostControl, HostError>;

    fn on_shutdown(&mut self, _world: &mut World) {}
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create world: {0}")]
    World(#[from] EcsError),
    #[error("host {stage} hook failed: {source}")]
    HostInit {
        stage: &'static str,
        #[source]
        source: HostError,
    },
    #[error("host update failed on tick {tick}: {source}")]
    HostUpdate {
        tick: u64,
        #[source]
        source: HostError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    MaxTicks,
    HostQuit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub system_failures: u64,
    pub dropped_backlog: Duration,
    pub reason: ShutdownReason,
}

pub fn run_headless(config: LoopConfig, host: &mut dyn GameHost) -> Result<LoopSummary, AppError> {
    run_headless_with_metrics(config, host, MetricsHandle::default())
}

pub fn run_headless_with_metrics(
    config: LoopConfig,
    host: &mut dyn GameHost,
    metrics_handle: MetricsHandle,
) -> Result<LoopSummary, AppError> {
    let mut world = World::with_config(&WorldConfig {
        worker_count: config.worker_count,
    })?;
    host.on_systems_init(&mut world)
        .map_err(|source| AppError::HostInit {
            stage: "systems_init",
            source,
        })?;
    host.on_game_init(&mut world)
        .map_err(|source| AppError::HostInit {
            stage: "game_init",
            source,
        })?;

    let fixed_dt = config.fixed_dt();
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));

    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        max_ticks = ?config.max_ticks,
        worker_count = world.worker_count(),
        pacing = ?config.pacing,
        systems = world.system_count(),
        entity_count = world.entity_count(),
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, last_frame_instant);
    let mut ticks = 0u64;
    let mut system_failures = 0u64;
    let mut dropped_total = Duration::ZERO;

    let reason = 'frames: loop {
        let frame_dt = match config.pacing {
            Pacing::RealTime => {
                let now = Instant::now();
                let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                last_frame_instant = now;
                clamp_frame_delta(raw_frame_dt, max_frame_delta)
            }
            Pacing::Unpaced => fixed_dt,
        };
        accumulator = accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if config.max_ticks.is_some_and(|max| ticks >= max) {
                break 'frames ShutdownReason::MaxTicks;
            }
            let control = host
                .on_update(&mut world, fixed_dt_seconds)
                .map_err(|source| AppError::HostUpdate { tick: ticks, source })?;
            if control == HostControl::Quit {
                break 'frames ShutdownReason::HostQuit;
            }

            let tick_started = Instant::now();
            let report = world.update(fixed_dt_seconds);
            metrics_accumulator.record_tick(tick_started.elapsed(), &report);
            ticks += 1;
            system_failures += report.failures.len() as u64;
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            dropped_total = dropped_total.saturating_add(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                parallel_dispatches = snapshot.parallel_dispatches,
                system_failures = snapshot.system_failures,
                entity_count = world.entity_count(),
                context = %world.context(),
                "loop_metrics"
            );
        }

        if config.pacing == Pacing::RealTime {
            thread::sleep(fixed_dt.saturating_sub(accumulator));
        }
    };

    host.on_shutdown(&mut world);
    info!(ticks, system_failures, reason = ?reason, "shutdown");
    Ok(LoopSummary {
        ticks,
        system_failures,
        dropped_backlog: dropped_total,
        reason,
    })
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

/// Parses an environment override, falling back to `fallback` when the
/// variable is unset, unreadable, or invalid.
pub fn env_override<T>(var: &'static str, raw: Result<String, env::VarError>, fallback: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(
                    env_var = var,
                    value = value.as_str(),
                    error = %error,
                    "invalid env var value; falling back to config"
                );
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(error) => {
            warn!(
                env_var = var,
                error = %error,
                "unable to read env var; falling back to config"
            );
            fallback
        }
    }
}
