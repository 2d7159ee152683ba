pub mod animation;
pub mod app;
pub mod assets;
mod atomic_io;
pub mod content;
pub mod ecs;
mod paths;
pub mod spatial;
pub mod time;

pub use app::{
    run_headless, run_headless_with_metrics, AppError, GameHost, HostControl, HostError,
    LoopConfig, LoopMetricsSnapshot, LoopSummary, MetricsHandle, Pacing, ShutdownReason,
};
pub use assets::{AssetCache, AssetError, InMemoryModelLoader, ModelLoader};
pub use atomic_io::write_text_atomic;
pub use content::{
    compile_def_database, load_def_database, CityStateDef, CityStateDefId, ContentCompileError,
    ContentErrorCode, ContentPipelineError, ContentRequest, DefDatabase, SourceLocation, UnitDef,
    UnitDefId,
};
pub use paths::{resolve_app_paths, AppPaths, StartupError, ROOT_ENV_VAR};
