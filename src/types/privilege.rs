use std::fmt;

use serde::{Deserialize, Serialize};

/// Privilege represents a bitmask of granted privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Privilege(u32);

impl Privilege {
    pub const SELECT: Privilege = Privilege(1 << 0); // 1
    pub const INSERT: Privilege = Privilege(1 << 1); // 2
    pub const UPDATE: Privilege = Privilege(1 << 2); // 4
    pub const DELETE: Privilege = Privilege(1 << 3); // 8
    pub const CREATE: Privilege = Privilege(1 << 4); // 16
    pub const USAGE: Privilege = Privilege(1 << 5); // 32
    pub const CONNECT: Privilege = Privilege(1 << 6); // 64

    const TABLE_PRIVILEGES: Privilege =
        Privilege(Self::SELECT.0 | Self::INSERT.0 | Self::UPDATE.0 | Self::DELETE.0);

    const NAMES: [(Privilege, &'static str); 7] = [
        (Self::SELECT, "SELECT"),
        (Self::INSERT, "INSERT"),
        (Self::UPDATE, "UPDATE"),
        (Self::DELETE, "DELETE"),
        (Self::CREATE, "CREATE"),
        (Self::USAGE, "USAGE"),
        (Self::CONNECT, "CONNECT"),
    ];

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this bitmask contains the required privilege.
    #[must_use]
    pub const fn has(self, required: Privilege) -> bool {
        self.0 & required.0 == required.0
    }

    #[must_use]
    pub const fn union(self, other: Privilege) -> Privilege {
        Privilege(self.0 | other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Privilege) -> Privilege {
        Privilege(self.0 & !other.0)
    }

    /// Expands a bitmask to include implied privileges.
    /// CREATE and every table privilege imply USAGE on the repo.
    #[must_use]
    pub fn expand_implied(self) -> Privilege {
        if self.0 & (Self::CREATE.0 | Self::TABLE_PRIVILEGES.0) != 0 {
            self.union(Self::USAGE)
        } else {
            self
        }
    }

    /// Privileges granted when a collaborator is added without an explicit list.
    #[must_use]
    pub const fn default_collaborator_grant() -> Privilege {
        Privilege(Self::SELECT.0 | Self::INSERT.0 | Self::UPDATE.0)
    }

    /// Parses a privilege name, case-insensitively.
    pub fn parse(s: &str) -> Option<Privilege> {
        let upper = s.trim().to_ascii_uppercase();
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == upper)
            .map(|(p, _)| *p)
    }

    pub fn parse_many<S: AsRef<str>>(strs: &[S]) -> Option<Privilege> {
        let mut result = Privilege::default();
        for s in strs {
            result = result.union(Self::parse(s.as_ref())?);
        }
        Some(result)
    }

    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(p, _)| self.has(*p))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<u32> for Privilege {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<i64> for Privilege {
    fn from(bits: i64) -> Self {
        Self(bits as u32)
    }
}

impl From<Privilege> for i64 {
    fn from(p: Privilege) -> Self {
        p.0 as i64
    }
}
