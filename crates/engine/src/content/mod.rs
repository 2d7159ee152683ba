mod compiler;
mod database;
mod discovery;
mod pipeline;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{CityStateDef, CityStateDefId, DefDatabase, UnitDef, UnitDefId};
pub use discovery::{ContentDiscoveryError, ContentRequest};
pub use pipeline::{load_def_database, ContentPipelineError};
