//! Build stages as a bitmask.
//!
//! A manifest run has three user-facing stages, each run across every site
//! before the next begins: [`Stage::CLEANUP`], [`Stage::COPY`], [`Stage::BUILD`]. The
//! [`Stage::COLLECT`] pass always runs first and cannot be switched off; it is
//! only named so errors from it can be reported like any other stage.

use std::fmt;
use std::ops::BitOr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stage(u8);

impl Stage {
    pub const NONE: Stage = Stage(0);
    pub const CLEANUP: Stage = Stage(1);
    pub const COPY: Stage = Stage(1 << 1);
    pub const BUILD: Stage = Stage(1 << 2);
    pub const COLLECT: Stage = Stage(1 << 3);
    pub const ALL: Stage = Stage(Self::CLEANUP.0 | Self::COPY.0 | Self::BUILD.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// These stages with `other` switched off.
    pub const fn skip(self, other: Stage) -> Stage {
        Stage(self.0 & !other.0)
    }

    pub const fn union(self, other: Stage) -> Stage {
        Stage(self.0 | other.0)
    }

    /// Whether every stage in `required` is enabled.
    pub const fn ok(self, required: Stage) -> bool {
        self.0 & required.0 == required.0
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::ALL
    }
}

impl BitOr for Stage {
    type Output = Stage;

    fn bitor(self, rhs: Stage) -> Stage {
        self.union(rhs)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Stage::COLLECT, "collect"),
            (Stage::CLEANUP, "cleanup"),
            (Stage::COPY, "copy"),
            (Stage::BUILD, "build"),
        ]
        .into_iter()
        .filter(|(stage, _)| self.ok(*stage))
        .map(|(_, name)| name)
        .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("+"))
        }
    }
}
