//! Topics published by the data manager. Wire names are dot.case.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// A durable write or load failed; payload `{owner, op, error}`.
    #[serde(rename = "store.failed")]
    StoreFailed,
    /// A record entered the cache; payload `{owner, groups, fixed_effects, created_active_group}`.
    #[serde(rename = "record.loaded")]
    RecordLoaded,
    #[serde(rename = "record.evicted")]
    RecordEvicted,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::StoreFailed, Topic::RecordLoaded, Topic::RecordEvicted];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::StoreFailed => "store.failed",
            Topic::RecordLoaded => "record.loaded",
            Topic::RecordEvicted => "record.evicted",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
