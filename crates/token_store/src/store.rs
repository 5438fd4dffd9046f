use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::TokenStoreError;
use crate::jwt::token_expiry;
use crate::paths::default_token_file;
use crate::schema::TokenRecord;

/// Auth tokens persisted as a small JSON object on disk.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    record: TokenRecord,
}

impl TokenStore {
    /// Load tokens from `path`. A missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self, TokenStoreError> {
        let path = path.to_path_buf();
        let record = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => TokenRecord::default(),
            Ok(contents) => serde_json::from_str::<TokenRecord>(&contents)
                .map_err(|source| TokenStoreError::json_parse(&path, source))?,
            Err(source) if source.kind() == ErrorKind::NotFound => TokenRecord::default(),
            Err(source) => return Err(TokenStoreError::io("reading token file", &path, source)),
        };

        Ok(Self { path, record })
    }

    pub fn open_default() -> Result<Self, TokenStoreError> {
        Self::open(&default_token_file()?)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn record(&self) -> &TokenRecord {
        &self.record
    }

    /// Token to send as the bearer credential right now.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token_at(OffsetDateTime::now_utc())
    }

    /// Prefers the signed-in `token` unless its `exp` is at or before `now`,
    /// then falls back to `guest_token`.
    #[must_use]
    pub fn bearer_token_at(&self, now: OffsetDateTime) -> Option<&str> {
        let signed_in = non_empty(self.record.token.as_deref()).filter(|token| {
            let expired = token_expiry(token).is_some_and(|expiry| expiry <= now);
            if expired {
                debug!("stored token has expired, falling back to guest token");
            }
            !expired
        });

        signed_in.or_else(|| non_empty(self.record.guest_token.as_deref()))
    }

    /// Stores trimmed values, replacing any previous signed-in pair.
    pub fn set_tokens(
        &mut self,
        token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Result<(), TokenStoreError> {
        let token: String = token.into();
        self.record.token = Some(token.trim().to_string());
        self.record.refresh_token = refresh_token.map(|value| value.trim().to_string());
        self.persist()
    }

    pub fn set_guest_token(&mut self, guest_token: impl Into<String>) -> Result<(), TokenStoreError> {
        let guest_token: String = guest_token.into();
        self.record.guest_token = Some(guest_token.trim().to_string());
        self.persist()
    }

    /// Forget every entry, removing the file.
    pub fn clear(&mut self) -> Result<(), TokenStoreError> {
        self.record = TokenRecord::default();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TokenStoreError::io("removing token file", &self.path, source)),
        }
    }

    // Written to a sibling temp file then renamed, so readers never observe a
    // partially written file.
    fn persist(&self) -> Result<(), TokenStoreError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| TokenStoreError::NoParentDirectory {
                path: self.path.clone(),
            })?;
        fs::create_dir_all(parent)
            .map_err(|source| TokenStoreError::io("creating token directory", parent, source))?;

        let serialized = serde_json::to_vec_pretty(&self.record)
            .map_err(|source| TokenStoreError::json_serialize(&self.path, source))?;

        let temp_path = parent.join(format!(".tokens-{}.tmp", Uuid::new_v4()));
        let write_result = fs::File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(&serialized)?;
                file.sync_all()
            })
            .map_err(|source| TokenStoreError::io("writing token file", &temp_path, source));

        if let Err(error) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }

        fs::rename(&temp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            TokenStoreError::io("replacing token file", &self.path, source)
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
