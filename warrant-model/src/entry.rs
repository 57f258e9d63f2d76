use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use warrant_types::{Document, Principal, PrincipalKind, Right, Rights};

/// The permission- and feature-bearing record for one resource instance.
///
/// This is also the exact document layout stored in the backend: the grant
/// lists are flattened to top-level keyword fields (`read_users`,
/// `admin_groups`, ...) so the rights compiler can address them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub features: Document,
    #[serde(default)]
    pub annotations: Document,
    #[serde(default)]
    pub creator: String,
    #[serde(flatten)]
    pub grants: Grants,
}

impl Entry {
    /// Builds a freshly created entry with default rights: the creator holds
    /// every right, and each configured group holds its initial rights.
    pub fn new(
        id: impl Into<String>,
        creator: impl Into<String>,
        features: Document,
        initial_group_rights: &BTreeMap<String, Rights>,
    ) -> Self {
        let creator = creator.into();
        let mut grants = Grants::default();
        grants.grant(&Principal::user(creator.clone()), Rights::all());
        for (group, rights) in initial_group_rights {
            grants.grant(&Principal::group(group.clone()), *rights);
        }
        Self {
            id: id.into(),
            features,
            annotations: Document::new(),
            creator,
            grants,
        }
    }

    /// Looks up a feature by dotted path (e.g. `"dimensions.width"`).
    pub fn feature(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = self.features.get(parts.next()?)?;
        parts.try_fold(first, |value, key| value.get(key))
    }

    /// Extract a string feature.
    pub fn feature_str(&self, path: &str) -> Option<&str> {
        self.feature(path).and_then(|v| v.as_str())
    }

    /// Renders the entry as the backend document.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parses a backend document.
    pub fn from_document(doc: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(doc)
    }
}

/// The eight principal lists of an entry.
///
/// Lists are multi-valued; a principal may appear more than once when it was
/// granted redundantly by an older writer. Reads tolerate duplicates and
/// revocation removes every occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    #[serde(default)]
    pub admin_users: Vec<String>,
    #[serde(default)]
    pub admin_groups: Vec<String>,
    #[serde(default)]
    pub read_users: Vec<String>,
    #[serde(default)]
    pub read_groups: Vec<String>,
    #[serde(default)]
    pub write_users: Vec<String>,
    #[serde(default)]
    pub write_groups: Vec<String>,
    #[serde(default)]
    pub execute_users: Vec<String>,
    #[serde(default)]
    pub execute_groups: Vec<String>,
}

impl Grants {
    /// The stored field name of the list for `right` × `kind`.
    #[must_use]
    pub fn field_name(right: Right, kind: PrincipalKind) -> String {
        format!("{}_{}", right.field_prefix(), kind.list_suffix())
    }

    pub fn list(&self, right: Right, kind: PrincipalKind) -> &[String] {
        match (right, kind) {
            (Right::Admin, PrincipalKind::User) => &self.admin_users,
            (Right::Admin, PrincipalKind::Group) => &self.admin_groups,
            (Right::Read, PrincipalKind::User) => &self.read_users,
            (Right::Read, PrincipalKind::Group) => &self.read_groups,
            (Right::Write, PrincipalKind::User) => &self.write_users,
            (Right::Write, PrincipalKind::Group) => &self.write_groups,
            (Right::Execute, PrincipalKind::User) => &self.execute_users,
            (Right::Execute, PrincipalKind::Group) => &self.execute_groups,
        }
    }

    fn list_mut(&mut self, right: Right, kind: PrincipalKind) -> &mut Vec<String> {
        match (right, kind) {
            (Right::Admin, PrincipalKind::User) => &mut self.admin_users,
            (Right::Admin, PrincipalKind::Group) => &mut self.admin_groups,
            (Right::Read, PrincipalKind::User) => &mut self.read_users,
            (Right::Read, PrincipalKind::Group) => &mut self.read_groups,
            (Right::Write, PrincipalKind::User) => &mut self.write_users,
            (Right::Write, PrincipalKind::Group) => &mut self.write_groups,
            (Right::Execute, PrincipalKind::User) => &mut self.execute_users,
            (Right::Execute, PrincipalKind::Group) => &mut self.execute_groups,
        }
    }

    /// Adds the principal to each requested list it is not already in.
    /// Returns true if any list changed.
    pub fn grant(&mut self, principal: &Principal, rights: Rights) -> bool {
        let mut changed = false;
        for right in rights.rights() {
            let list = self.list_mut(right, principal.kind());
            if !list.iter().any(|p| p == principal.id()) {
                list.push(principal.id().to_string());
                changed = true;
            }
        }
        changed
    }

    /// Removes every occurrence of the principal from each requested list.
    /// Returns true if any list changed.
    pub fn revoke(&mut self, principal: &Principal, rights: Rights) -> bool {
        let mut changed = false;
        for right in rights.rights() {
            let list = self.list_mut(right, principal.kind());
            let before = list.len();
            list.retain(|p| p != principal.id());
            changed |= list.len() != before;
        }
        changed
    }

    /// Removes the principal from all four lists of its kind.
    pub fn revoke_all(&mut self, principal: &Principal) -> bool {
        self.revoke(principal, Rights::all())
    }

    /// The rights a principal holds directly (not through a group).
    #[must_use]
    pub fn rights_of(&self, principal: &Principal) -> Rights {
        Right::ALL
            .into_iter()
            .filter(|r| self.list(*r, principal.kind()).iter().any(|p| p == principal.id()))
            .fold(Rights::empty(), |acc, r| acc | r.flag())
    }

    /// Group rights as a map, the shape used by kind configuration.
    #[must_use]
    pub fn group_rights(&self) -> BTreeMap<String, Rights> {
        let mut out: BTreeMap<String, Rights> = BTreeMap::new();
        for right in Right::ALL {
            for group in self.list(right, PrincipalKind::Group) {
                *out.entry(group.clone()).or_default() |= right.flag();
            }
        }
        out
    }
}
