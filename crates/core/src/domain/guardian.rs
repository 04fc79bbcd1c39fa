use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardianClass {
    Hunter,
    Titan,
    Warlock,
}

impl GuardianClass {
    /// Listing order used when grouping builds.
    pub const ALL: [GuardianClass; 3] = [
        GuardianClass::Hunter,
        GuardianClass::Titan,
        GuardianClass::Warlock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GuardianClass::Hunter => "Hunter",
            GuardianClass::Titan => "Titan",
            GuardianClass::Warlock => "Warlock",
        }
    }
}

impl FromStr for GuardianClass {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        GuardianClass::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "class",
                value: trimmed.to_string(),
            })
    }
}

impl fmt::Display for GuardianClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subclass {
    Arc,
    Solar,
    Void,
    Strand,
    Stasis,
    Prismatic,
}

impl Subclass {
    pub const ALL: [Subclass; 6] = [
        Subclass::Arc,
        Subclass::Solar,
        Subclass::Void,
        Subclass::Strand,
        Subclass::Stasis,
        Subclass::Prismatic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subclass::Arc => "Arc",
            Subclass::Solar => "Solar",
            Subclass::Void => "Void",
            Subclass::Strand => "Strand",
            Subclass::Stasis => "Stasis",
            Subclass::Prismatic => "Prismatic",
        }
    }

    pub fn sort_order(self) -> u8 {
        match self {
            Subclass::Arc => 0,
            Subclass::Solar => 1,
            Subclass::Void => 2,
            Subclass::Strand => 3,
            Subclass::Stasis => 4,
            Subclass::Prismatic => 5,
        }
    }

    /// Prismatic borrows aspects and fragments from the other subclasses and
    /// has no catalog entries of its own.
    pub fn has_own_catalog(self) -> bool {
        !matches!(self, Subclass::Prismatic)
    }
}

impl FromStr for Subclass {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Subclass::ALL
            .into_iter()
            .find(|subclass| subclass.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "subclass",
                value: trimmed.to_string(),
            })
    }
}

impl fmt::Display for Subclass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
