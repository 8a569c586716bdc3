//! Ancillary reserve categories.
//!
//! A [`ReserveKind`] pairs one of the four reserve categories with a
//! direction. Its string key (`"primary_up"`, `"tertiary2_down"`, ...) is
//! used as a prefix for every reserve-related parameter in the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::UcrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveCategory {
    Primary,
    Secondary,
    Tertiary1,
    Tertiary2,
}

impl ReserveCategory {
    pub const ALL: [ReserveCategory; 4] = [
        ReserveCategory::Primary,
        ReserveCategory::Secondary,
        ReserveCategory::Tertiary1,
        ReserveCategory::Tertiary2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReserveCategory::Primary => "primary",
            ReserveCategory::Secondary => "secondary",
            ReserveCategory::Tertiary1 => "tertiary1",
            ReserveCategory::Tertiary2 => "tertiary2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// A reserve category in a given direction.
///
/// Only upward reserves can be supplied by offline units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReserveKind {
    pub category: ReserveCategory,
    pub direction: Direction,
}

impl ReserveKind {
    pub const fn new(category: ReserveCategory, direction: Direction) -> Self {
        Self {
            category,
            direction,
        }
    }

    pub const fn up(category: ReserveCategory) -> Self {
        Self::new(category, Direction::Up)
    }

    pub const fn down(category: ReserveCategory) -> Self {
        Self::new(category, Direction::Down)
    }

    /// All eight category/direction pairs.
    pub fn all() -> impl Iterator<Item = ReserveKind> {
        ReserveCategory::ALL.into_iter().flat_map(|category| {
            [Direction::Up, Direction::Down]
                .into_iter()
                .map(move |direction| ReserveKind::new(category, direction))
        })
    }

    pub fn is_up(&self) -> bool {
        self.direction == Direction::Up
    }

    pub fn accepts_offline(&self) -> bool {
        self.is_up()
    }

    /// Parameter key, e.g. `primary_up`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.category.as_str(), self.direction.as_str())
    }

    /// Full parameter name for a reserve-scoped parameter, e.g.
    /// `primary_up_max_on`.
    pub fn param(&self, suffix: &str) -> String {
        format!("{}_{}", self.key(), suffix)
    }
}

impl fmt::Display for ReserveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.category.as_str(), self.direction.as_str())
    }
}

impl FromStr for ReserveKind {
    type Err = UcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, direction) = s
            .rsplit_once('_')
            .ok_or_else(|| UcrError::Parse(format!("invalid reserve kind '{s}'")))?;
        let category = ReserveCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(category))
            .ok_or_else(|| UcrError::Parse(format!("unknown reserve category '{category}'")))?;
        let direction = match direction.to_ascii_lowercase().as_str() {
            "up" => Direction::Up,
            "down" => Direction::Down,
            other => {
                return Err(UcrError::Parse(format!(
                    "unknown reserve direction '{other}'"
                )))
            }
        };
        Ok(ReserveKind::new(category, direction))
    }
}

impl TryFrom<String> for ReserveKind {
    type Error = UcrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReserveKind> for String {
    fn from(kind: ReserveKind) -> Self {
        kind.key()
    }
}
