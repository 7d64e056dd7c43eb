use std::fmt;

use serde::{Deserialize, Serialize};

/// Pair-level signal state. `None` means flat / waiting for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSignal {
    #[default]
    None,
    Long,
    Short,
}

impl AlertSignal {
    pub fn is_active(self) -> bool {
        self != AlertSignal::None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertSignal::None => "NONE",
            AlertSignal::Long => "LONG",
            AlertSignal::Short => "SHORT",
        }
    }
}

impl fmt::Display for AlertSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
