// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles and the capabilities they grant.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Role Hierarchy
///
/// - `Institution` - Registers documents and browses its own folders
/// - `Regular` - Signed in, but may only use the public endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Issuing institution
    Institution,
    /// Ordinary signed-in user
    #[serde(rename = "USER_REGULAR")]
    Regular,
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Upload documents and create certificate records
    RegisterCertificates,
    /// List own folders, files and certificate records
    BrowseFolders,
}

impl Role {
    /// Check if this role grants the capability.
    pub fn can(&self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Institution, _) => true,
            (Role::Regular, Capability::RegisterCertificates) => false,
            (Role::Regular, Capability::BrowseFolders) => false,
        }
    }

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Institution => "INSTITUTION",
            Role::Regular => "USER_REGULAR",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::RegisterCertificates => write!(f, "register certificates"),
            Capability::BrowseFolders => write!(f, "browse folders"),
        }
    }
}
