use std::env;

use strategos_engine::app::env_override;
use strategos_engine::LoopConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{GameConfig, StrategosHost};

const ENABLED_MODS_ENV_VAR: &str = "STRATEGOS_ENABLED_MODS";
const SEED_ENV_VAR: &str = "STRATEGOS_SEED";
const AGENTS_ENV_VAR: &str = "STRATEGOS_AGENTS";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) host: StrategosHost,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Strategos Startup ===");

    let defaults = GameConfig::default();
    let game = GameConfig {
        enabled_mods: parse_enabled_mods(env::var(ENABLED_MODS_ENV_VAR).ok()),
        seed: env_override(SEED_ENV_VAR, env::var(SEED_ENV_VAR), defaults.seed),
        agent_count: env_override(AGENTS_ENV_VAR, env::var(AGENTS_ENV_VAR), defaults.agent_count),
        ..defaults
    };
    info!(
        seed = game.seed,
        agents = game.agent_count,
        enabled_mods = ?game.enabled_mods,
        "game_config"
    );

    AppWiring {
        config: LoopConfig::default().with_env_overrides(),
        host: StrategosHost::new(game),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_enabled_mods(raw: Option<String>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    })
    .unwrap_or_default()
}
