//! Host platform (linux for example) utility functions

use std::path::PathBuf;

/// Environment variable pointing at the root of the software checkout.
///
/// The `params` and `sessions` directories are resolved relative to it.
pub const SW_ROOT_ENV_VAR: &str = "NAV_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
