use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use woven_custody::access::{StaticDirectory, UserId, VaultMembership};

use crate::auth::TokenDirectory;

/// Identity and membership data handed to the relay by the account and
/// vault services.
///
/// ```json
/// {
///   "tokens": { "token-alice": 1, "token-bob": 2 },
///   "vaults": [{ "id": "…", "mode": "strict", "members": [1, 2] }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFile {
    #[serde(default)]
    pub tokens: HashMap<String, UserId>,
    #[serde(default)]
    pub vaults: Vec<VaultMembership>,
}

impl DirectoryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read directory file {:?}", path))?;
        let file: DirectoryFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse directory file {:?}", path))?;

        info!(
            "Loaded {} token(s) and {} vault(s) from {:?}",
            file.tokens.len(),
            file.vaults.len(),
            path
        );
        Ok(file)
    }

    pub fn into_parts(self) -> (TokenDirectory, StaticDirectory) {
        (
            TokenDirectory::new(self.tokens),
            StaticDirectory::new(self.vaults),
        )
    }
}
