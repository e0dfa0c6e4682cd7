//! Retention tiers and slot identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::SnaprotError;

/// One named retention tier, ordered finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Generation {
    /// Every generation, finest first.
    pub const ALL: [Self; 5] = [
        Self::Hourly,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// The generation whose newest slot feeds this one.
    ///
    /// `None` for hourly, which is fed by the configured sources.
    #[must_use]
    pub const fn predecessor(self) -> Option<Self> {
        match self {
            Self::Hourly => None,
            Self::Daily => Some(Self::Hourly),
            Self::Weekly => Some(Self::Daily),
            Self::Monthly => Some(Self::Weekly),
            Self::Yearly => Some(Self::Monthly),
        }
    }

    /// Default number of slots kept when the config does not override it.
    #[must_use]
    pub const fn default_retained(self) -> u32 {
        match self {
            Self::Hourly => 24,
            Self::Daily => 7,
            Self::Weekly => 5,
            Self::Monthly => 12,
            Self::Yearly => 100,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Generation {
    type Err = SnaprotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| SnaprotError::InvalidGeneration(s.to_string()))
    }
}

/// A numbered backup instance within a generation; index 0 is newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId {
    pub generation: Generation,
    pub index: u32,
}

impl SlotId {
    #[must_use]
    pub const fn new(generation: Generation, index: u32) -> Self {
        Self { generation, index }
    }

    /// Slot 0 of `generation`.
    #[must_use]
    pub const fn newest(generation: Generation) -> Self {
        Self::new(generation, 0)
    }

    /// The next-older slot in the same generation.
    #[must_use]
    pub const fn older(self) -> Self {
        Self::new(self.generation, self.index + 1)
    }

    /// Directory name of this slot under the backup root.
    #[must_use]
    pub fn dir_name(self) -> String {
        format!("{}.{}", self.generation, self.index)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.generation, self.index)
    }
}

impl FromStr for SlotId {
    type Err = SnaprotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SnaprotError::InvalidSlot(s.to_string());
        let (generation, index) = s.split_once('.').ok_or_else(invalid)?;
        let generation = generation.parse::<Generation>().map_err(|_| invalid())?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        // `daily.07` would name a directory that `daily.7` never maps back to.
        if index.len() > 1 && index.starts_with('0') {
            return Err(invalid());
        }
        let index = index.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(generation, index))
    }
}

impl Serialize for SlotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
