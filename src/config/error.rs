//! Errors raised while loading and checking `folio.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read site config `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("`{0}` is not a valid site config")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("no site config at `{0}`, run `folio init` to create one")]
    NotFound(PathBuf),

    #[error("`[{key}]` {reason}")]
    Invalid {
        key: &'static str,
        reason: &'static str,
    },
}
