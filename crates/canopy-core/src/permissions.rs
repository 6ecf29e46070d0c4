//! The 5-bit permission bitmap.
//!
//! Bit positions are fixed: READ=0, UPDATE=1, CREATE=2, DELETE=3, SHARE=4.
//! Permissions only ever combine with bitwise OR; nothing in Canopy
//! subtracts bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::Error;

/// A combination of READ / UPDATE / CREATE / DELETE / SHARE.
///
/// # Example
///
/// ```rust
/// use canopy_core::Permissions;
///
/// let rw = Permissions::READ | Permissions::UPDATE;
/// assert_eq!(rw.bits(), 3);
/// assert!(rw.contains(Permissions::READ));
/// assert_eq!(rw.to_string(), "RU---");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Permissions(u8);

impl Permissions {
    /// No permissions.
    pub const NONE: Self = Self(0);
    /// Read access.
    pub const READ: Self = Self(1 << 0);
    /// Modify existing content.
    pub const UPDATE: Self = Self(1 << 1);
    /// Create new content.
    pub const CREATE: Self = Self(1 << 2);
    /// Delete content.
    pub const DELETE: Self = Self(1 << 3);
    /// Reshare content.
    pub const SHARE: Self = Self(1 << 4);
    /// Every bit set (31); also the mask carried by every absolute rule.
    pub const ALL: Self = Self(0b1_1111);

    const LETTERS: [(Permissions, char); 5] = [
        (Self::READ, 'R'),
        (Self::UPDATE, 'U'),
        (Self::CREATE, 'C'),
        (Self::DELETE, 'D'),
        (Self::SHARE, 'S'),
    ];

    /// Builds a bitmap, rejecting bits above SHARE.
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::ALL.0 == 0).then_some(Self(bits))
    }

    /// Builds a bitmap, silently dropping bits above SHARE.
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bit value.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Bitwise OR, usable in const context.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` when no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` when every bit of `other` is also set here.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Lowercase names of the set bits, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        const NAMES: [&str; 5] = ["read", "update", "create", "delete", "share"];
        Self::LETTERS
            .iter()
            .zip(NAMES)
            .filter(|((flag, _), _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect()
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl TryFrom<u8> for Permissions {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::from_bits(bits).ok_or(Error::InvalidPermissions(bits))
    }
}

impl From<Permissions> for u8 {
    fn from(p: Permissions) -> Self {
        p.0
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, letter) in Self::LETTERS {
            let c = if self.contains(flag) { letter } else { '-' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
