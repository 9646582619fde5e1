//! The three benchmarked access patterns

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// One logical listing of every object
    FullList,
    /// Manual pagination with a fixed page size
    Paginated,
    /// Prefix filter and delimiter enumeration on nested containers
    Prefix,
}

impl Pattern {
    /// Execution and report order
    pub const ALL: [Pattern; 3] = [Pattern::FullList, Pattern::Paginated, Pattern::Prefix];

    /// File stem of the pattern's artifacts
    pub fn slug(&self) -> &'static str {
        match self {
            Pattern::FullList => "full-list",
            Pattern::Paginated => "paginated",
            Pattern::Prefix => "prefix",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Pattern::FullList => "Full list",
            Pattern::Paginated => "Paginated list",
            Pattern::Prefix => "Prefix / delimiter list",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
