use std::path::{Path, PathBuf};

use crate::error::TokenStoreError;

pub const TOKEN_DIR: &str = ".acaceta";
pub const TOKEN_FILE_NAME: &str = "tokens.json";

#[must_use]
pub fn token_file(home: &Path) -> PathBuf {
    home.join(TOKEN_DIR).join(TOKEN_FILE_NAME)
}

/// `<home>/.acaceta/tokens.json`, with home taken from `HOME` or `USERPROFILE`.
pub fn default_token_file() -> Result<PathBuf, TokenStoreError> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|key| std::env::var_os(key))
        .find(|value| !value.is_empty())
        .map(|home| token_file(Path::new(&home)))
        .ok_or(TokenStoreError::NoHomeDirectory)
}
