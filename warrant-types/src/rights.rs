//! Rights a principal can hold on an entry.
//!
//! Internally rights are a flag set. The single-character string form
//! (`"r"`, `"rw"`, `"rwxa"`) exists only at the system boundary: command
//! payloads, request parameters and configuration files.
//!
//! | char | right |
//! |------|-------|
//! | `r` | [`Rights::READ`] |
//! | `w` | [`Rights::WRITE`] |
//! | `x` | [`Rights::EXECUTE`] |
//! | `a` | [`Rights::ADMIN`] |
//!
//! # Example
//!
//! ```
//! use warrant_types::Rights;
//!
//! let rights = Rights::from_chars("ra");
//! assert!(rights.contains(Rights::READ | Rights::ADMIN));
//! assert!(!rights.contains(Rights::WRITE));
//! assert_eq!(rights.to_chars(), "ra");
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// A set of rights. Requesting several rights means all of them must hold.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Rights: u8 {
        const READ    = 0b0001;
        const WRITE   = 0b0010;
        const EXECUTE = 0b0100;
        const ADMIN   = 0b1000;
    }
}

/// A single right, used when iterating a [`Rights`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Right {
    Read,
    Write,
    Execute,
    Admin,
}

impl Right {
    /// All rights in canonical order.
    pub const ALL: [Right; 4] = [Right::Read, Right::Write, Right::Execute, Right::Admin];

    /// Parses the boundary character for a right.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(Self::Read),
            'w' => Some(Self::Write),
            'x' => Some(Self::Execute),
            'a' => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_char(&self) -> char {
        match self {
            Self::Read => 'r',
            Self::Write => 'w',
            Self::Execute => 'x',
            Self::Admin => 'a',
        }
    }

    /// Prefix of the two entry lists (`<prefix>_users`, `<prefix>_groups`)
    /// that hold this right.
    #[must_use]
    pub const fn field_prefix(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub const fn flag(&self) -> Rights {
        match self {
            Self::Read => Rights::READ,
            Self::Write => Rights::WRITE,
            Self::Execute => Rights::EXECUTE,
            Self::Admin => Rights::ADMIN,
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_prefix())
    }
}

impl Rights {
    /// Parses a rights string, silently skipping unknown characters.
    ///
    /// This is the behaviour the read path relies on: `"rq"` means `READ`.
    #[must_use]
    pub fn from_chars(s: &str) -> Self {
        s.chars()
            .filter_map(Right::from_char)
            .fold(Self::empty(), |acc, r| acc | r.flag())
    }

    /// Parses a rights string, rejecting unknown characters.
    pub fn parse_strict(s: &str) -> Result<Self, crate::Error> {
        let mut rights = Self::empty();
        for c in s.chars() {
            let right = Right::from_char(c).ok_or(crate::Error::UnknownRight(c))?;
            rights |= right.flag();
        }
        Ok(rights)
    }

    /// Renders the set in canonical `rwxa` order.
    #[must_use]
    pub fn to_chars(&self) -> String {
        self.rights().map(|r| r.as_char()).collect()
    }

    /// Iterates the contained rights in canonical order.
    pub fn rights(&self) -> impl Iterator<Item = Right> + '_ {
        Right::ALL.into_iter().filter(|r| self.contains(r.flag()))
    }
}

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_chars())
    }
}

impl Serialize for Rights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_chars())
    }
}

impl<'de> Deserialize<'de> for Rights {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rights::parse_strict(&s).map_err(serde::de::Error::custom)
    }
}
