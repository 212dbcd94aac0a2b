//! Host platform utility functions

use std::env::VarError;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "HERMES_SW_ROOT";

/// Get the path to the software root directory.
///
/// The root is read from the `HERMES_SW_ROOT` environment variable, and is
/// the directory containing the `params` and `sessions` directories.
pub fn get_hermes_sw_root() -> Result<PathBuf, VarError> {
    let root = std::env::var(SW_ROOT_ENV_VAR)?;
    Ok(PathBuf::from(root))
}
