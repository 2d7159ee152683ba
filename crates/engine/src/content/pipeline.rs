use thiserror::Error;
use tracing::info;

use crate::AppPaths;

use super::compiler::{compile_def_database, ContentCompileError};
use super::database::DefDatabase;
use super::discovery::ContentRequest;

#[derive(Debug, Error)]
pub enum ContentPipelineError {
    #[error(transparent)]
    Compile(#[from] ContentCompileError),
    #[error("content defines no UnitDef; at least one unit type is required")]
    NoUnitDefs,
}

pub fn load_def_database(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<DefDatabase, ContentPipelineError> {
    let database = compile_def_database(app_paths, request)?;
    if database.unit_defs().is_empty() {
        return Err(ContentPipelineError::NoUnitDefs);
    }

    info!(
        enabled_mods = request.enabled_mods.len(),
        unit_defs = database.unit_defs().len(),
        city_state_defs = database.city_state_defs().len(),
        names = database.names().len(),
        "content_loaded"
    );
    Ok(database)
}
