//! Mutation commands delivered by the ingestion transport.
//!
//! A command describes one change to one entry. The transport guarantees
//! that commands for the same resource id arrive in order and are never
//! processed concurrently; commands for different ids carry no ordering.
//!
//! Rights travel in their single-character string form here because this
//! is the wire boundary. They are parsed when the command is applied.

use crate::{Document, Principal, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Creates a new time-ordered command ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommandId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The operation a command performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum CommandPayload {
    /// Replace the entry's features, creating the entry if it is unseen.
    FeaturesReplaced { features: Document },

    /// Replace the entry's annotations. The entry must exist.
    AnnotationsReplaced { annotations: Document },

    /// Grant a principal the rights named by `rights` (e.g. `"rw"`).
    RightsGranted { principal: Principal, rights: String },

    /// Revoke rights from a principal. `None` revokes everything the
    /// principal holds on the entry.
    RightsRevoked {
        principal: Principal,
        #[serde(default)]
        rights: Option<String>,
    },

    /// Delete the entry.
    Deleted,
}

/// A mutation addressed to one entry of one resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Unique identifier for this command.
    pub id: CommandId,

    /// The resource kind (e.g. `"widgets"`).
    pub kind: String,

    /// The entry this command applies to.
    pub resource_id: ResourceId,

    /// The principal that issued the command. Becomes the creator when a
    /// feature update creates the entry.
    pub issuer: String,

    /// When the command was issued upstream.
    pub issued_at: DateTime<Utc>,

    /// The operation to perform.
    pub payload: CommandPayload,
}

impl Command {
    /// Creates a new command issued now.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        resource_id: ResourceId,
        issuer: impl Into<String>,
        payload: CommandPayload,
    ) -> Self {
        Self {
            id: CommandId::new(),
            kind: kind.into(),
            resource_id,
            issuer: issuer.into(),
            issued_at: Utc::now(),
            payload,
        }
    }

    /// Creates a features-replaced command.
    #[must_use]
    pub fn features_replaced(
        kind: impl Into<String>,
        resource_id: ResourceId,
        issuer: impl Into<String>,
        features: Document,
    ) -> Self {
        Self::new(kind, resource_id, issuer, CommandPayload::FeaturesReplaced { features })
    }

    /// Creates an annotations-replaced command.
    #[must_use]
    pub fn annotations_replaced(
        kind: impl Into<String>,
        resource_id: ResourceId,
        issuer: impl Into<String>,
        annotations: Document,
    ) -> Self {
        Self::new(
            kind,
            resource_id,
            issuer,
            CommandPayload::AnnotationsReplaced { annotations },
        )
    }

    /// Creates a rights-granted command.
    #[must_use]
    pub fn rights_granted(
        kind: impl Into<String>,
        resource_id: ResourceId,
        issuer: impl Into<String>,
        principal: Principal,
        rights: impl Into<String>,
    ) -> Self {
        Self::new(
            kind,
            resource_id,
            issuer,
            CommandPayload::RightsGranted {
                principal,
                rights: rights.into(),
            },
        )
    }

    /// Creates a rights-revoked command. Pass `None` to revoke everything.
    #[must_use]
    pub fn rights_revoked(
        kind: impl Into<String>,
        resource_id: ResourceId,
        issuer: impl Into<String>,
        principal: Principal,
        rights: Option<String>,
    ) -> Self {
        Self::new(
            kind,
            resource_id,
            issuer,
            CommandPayload::RightsRevoked { principal, rights },
        )
    }

    /// Creates a deletion command.
    #[must_use]
    pub fn deleted(
        kind: impl Into<String>,
        resource_id: ResourceId,
        issuer: impl Into<String>,
    ) -> Self {
        Self::new(kind, resource_id, issuer, CommandPayload::Deleted)
    }

    /// Returns true if this command changes the entry's grant lists.
    #[must_use]
    pub fn is_rights_mutation(&self) -> bool {
        matches!(
            self.payload,
            CommandPayload::RightsGranted { .. } | CommandPayload::RightsRevoked { .. }
        )
    }

    /// Decodes a command from its JSON wire form.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
