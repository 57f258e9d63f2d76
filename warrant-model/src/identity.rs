use serde::{Deserialize, Serialize};

/// The resolved caller: a user id and the groups it belongs to.
///
/// Either part may be empty. A caller with neither matches no rights at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Identity {
    pub fn new(user: impl Into<String>, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            user: user.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// A caller known only by user id.
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            groups: Vec::new(),
        }
    }

    /// A caller known only by group memberships.
    pub fn groups(groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(String::new(), groups)
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user.is_empty() && self.groups.is_empty()
    }
}
