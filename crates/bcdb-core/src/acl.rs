//! Access control lists.
//!
//! An ACL is a permission string shared by a set of users. Objects refer to
//! an ACL by key through their `:acl` tag.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::object::{AclKey, UserId};

/// Permission string used when none is given.
pub const DEFAULT_PERMISSIONS: &str = "r--";

/// Read, write and delete bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(0x4);
    pub const WRITE: Self = Self(0x2);
    pub const DELETE: Self = Self(0x1);
    pub const ALL: Self = Self(0x7);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit in `required` is granted.
    pub const fn allows(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl FromStr for Permissions {
    type Err = ValidationError;

    /// Parse `rwd`-style strings. Surrounding whitespace and case are
    /// ignored; each position must hold its letter or `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidPermissionString(s.to_string());
        let normalized = s.trim().to_ascii_lowercase();
        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() != 3 {
            return Err(invalid());
        }

        let mut bits = 0u8;
        for (c, (letter, bit)) in chars.iter().zip([('r', 0x4), ('w', 0x2), ('d', 0x1)]) {
            match *c {
                '-' => {}
                c if c == letter => bits |= bit,
                _ => return Err(invalid()),
            }
        }
        Ok(Self(bits))
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |bit: u8, c: char| if self.0 & bit != 0 { c } else { '-' };
        write!(f, "{}{}{}", flag(0x4, 'r'), flag(0x2, 'w'), flag(0x1, 'd'))
    }
}

impl TryFrom<String> for Permissions {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Permissions> for String {
    fn from(p: Permissions) -> Self {
        p.to_string()
    }
}

/// A permission object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub key: AclKey,
    pub perm: Permissions,
    pub users: BTreeSet<UserId>,
}

impl Acl {
    /// Add users. Existing members are left alone.
    pub fn grant(&mut self, users: &[UserId]) -> usize {
        users.iter().filter(|u| self.users.insert(**u)).count()
    }

    /// Remove users. Non-members are ignored.
    pub fn revoke(&mut self, users: &[UserId]) -> usize {
        users.iter().filter(|u| self.users.remove(*u)).count()
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.users.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        for s in ["rwd", "r--", "-w-", "--d", "---", "rw-"] {
            assert_eq!(s.parse::<Permissions>().unwrap().to_string(), s);
        }
        assert_eq!(" RW- ".parse::<Permissions>().unwrap().to_string(), "rw-");
        assert_eq!(DEFAULT_PERMISSIONS.parse::<Permissions>().unwrap(), Permissions::READ);
    }

    #[test]
    fn test_rejects_malformed() {
        for s in ["r-", "rwdx", "", "wrd", "r-x", "rr-", "d--"] {
            assert_eq!(
                s.parse::<Permissions>(),
                Err(ValidationError::InvalidPermissionString(s.to_string())),
                "{s}"
            );
        }
    }

    #[test]
    fn test_bits() {
        let p: Permissions = "rw-".parse().unwrap();
        assert_eq!(p.bits(), 0x6);
        assert!(p.allows(Permissions::READ));
        assert!(p.allows(Permissions::READ.union(Permissions::WRITE)));
        assert!(!p.allows(Permissions::DELETE));
        assert!(p.allows(Permissions::NONE));
    }

    #[test]
    fn test_serde_as_string() {
        let p: Permissions = "r-d".parse().unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"r-d\"");
        assert_eq!(serde_json::from_str::<Permissions>("\"r-d\"").unwrap(), p);
        assert!(serde_json::from_str::<Permissions>("\"r-\"").is_err());
    }

    #[test]
    fn test_grant_revoke_idempotent() {
        let mut acl = Acl {
            key: 1,
            perm: Permissions::READ,
            users: BTreeSet::new(),
        };
        assert_eq!(acl.grant(&[1]), 1);
        assert_eq!(acl.grant(&[1]), 0);
        assert_eq!(acl.users, BTreeSet::from([1]));

        assert_eq!(acl.revoke(&[2]), 0);
        assert_eq!(acl.revoke(&[1]), 1);
        assert!(acl.users.is_empty());
    }
}
