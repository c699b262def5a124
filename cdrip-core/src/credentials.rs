//! API tokens kept in single-line dotfiles (`~/.discogs_token`, `~/.lastfm_token`)
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DISCOGS_TOKEN_FILE: &str = ".discogs_token";
pub const LASTFM_TOKEN_FILE: &str = ".lastfm_token";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read token file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Token file {0} is empty")]
    Empty(PathBuf),
    #[error("Could not determine home directory")]
    NoHome,
}

/// `~/<file_name>`
pub fn default_token_path(file_name: &str) -> Result<PathBuf, CredentialError> {
    dirs::home_dir()
        .map(|home| home.join(file_name))
        .ok_or(CredentialError::NoHome)
}

/// Read a token file, trimming surrounding whitespace
pub fn read_token(path: &Path) -> Result<String, CredentialError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let token = contents.trim();
    if token.is_empty() {
        return Err(CredentialError::Empty(path.to_path_buf()));
    }
    Ok(token.to_string())
}
