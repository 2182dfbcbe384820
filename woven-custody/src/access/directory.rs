use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RequestResult;
use super::model::UserId;

/// Custody mode of a vault.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultMode {
    /// The key is available to members without per-unlock consent.
    #[default]
    Normal,
    /// Every unlock needs the other member's approval.
    Strict,
}

/// Accepted members of one vault as seen by the membership service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMembership {
    pub id: Uuid,
    #[serde(default)]
    pub mode: VaultMode,
    pub members: Vec<UserId>,
}

impl VaultMembership {
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// The other member of a pair vault.
    pub fn partner_of(&self, user_id: UserId) -> Option<UserId> {
        self.members.iter().copied().find(|&m| m != user_id)
    }
}

/// Vault membership lookup, owned by the vault service.
#[async_trait]
pub trait VaultDirectory: Send + Sync {
    async fn membership(&self, vault_id: Uuid) -> RequestResult<Option<VaultMembership>>;
}

/// Fixed membership table, loaded once.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    vaults: HashMap<Uuid, VaultMembership>,
}

impl StaticDirectory {
    pub fn new(vaults: impl IntoIterator<Item = VaultMembership>) -> Self {
        Self {
            vaults: vaults.into_iter().map(|v| (v.id, v)).collect(),
        }
    }

    pub fn insert(&mut self, vault: VaultMembership) {
        self.vaults.insert(vault.id, vault);
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }
}

#[async_trait]
impl VaultDirectory for StaticDirectory {
    async fn membership(&self, vault_id: Uuid) -> RequestResult<Option<VaultMembership>> {
        Ok(self.vaults.get(&vault_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_of_pair_vault() {
        let vault = VaultMembership {
            id: Uuid::new_v4(),
            mode: VaultMode::Strict,
            members: vec![1, 2],
        };
        assert_eq!(vault.partner_of(1), Some(2));
        assert_eq!(vault.partner_of(2), Some(1));
        assert!(!vault.is_member(3));
    }

    #[test]
    fn test_solo_vault_has_no_partner() {
        let vault = VaultMembership {
            id: Uuid::new_v4(),
            mode: VaultMode::Strict,
            members: vec![1],
        };
        assert_eq!(vault.partner_of(1), None);
    }

    #[test]
    fn test_mode_defaults_to_normal() {
        let vault: VaultMembership =
            serde_json::from_str(&format!(r#"{{"id": "{}", "members": [1]}}"#, Uuid::new_v4()))
                .unwrap();
        assert_eq!(vault.mode, VaultMode::Normal);
    }
}
