//! Import type selector

use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which record schema a workbook holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// Identity/group membership assignments
    IdentityGroup,
    /// Personnel records
    Personnel,
    /// Application packaging status
    Packaging,
    /// Application testing status
    Testing,
    /// Application migration plan
    Migration,
    /// Department to organizational cluster mapping
    Cluster,
}

impl ImportKind {
    pub const ALL: [ImportKind; 6] = [
        ImportKind::IdentityGroup,
        ImportKind::Personnel,
        ImportKind::Packaging,
        ImportKind::Testing,
        ImportKind::Migration,
        ImportKind::Cluster,
    ];

    /// Token used on the command line and as the storage discriminator
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::IdentityGroup => "identity-group",
            ImportKind::Personnel => "personnel",
            ImportKind::Packaging => "packaging",
            ImportKind::Testing => "testing",
            ImportKind::Migration => "migration",
            ImportKind::Cluster => "cluster",
        }
    }

    /// Human-readable name for progress messages
    pub fn label(self) -> &'static str {
        match self {
            ImportKind::IdentityGroup => "identity-group memberships",
            ImportKind::Personnel => "personnel records",
            ImportKind::Packaging => "packaging statuses",
            ImportKind::Testing => "testing statuses",
            ImportKind::Migration => "migration plans",
            ImportKind::Cluster => "organizational clusters",
        }
    }
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase().replace('_', "-");
        ImportKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == token)
            .ok_or_else(|| {
                format!(
                    "unknown import type '{}' (expected one of: {})",
                    s,
                    ImportKind::ALL.map(|k| k.as_str()).join(", ")
                )
            })
    }
}
