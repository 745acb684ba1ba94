// ── Site domain type ──

use serde::{Deserialize, Serialize};

use unipower_api::legacy::models::LegacySite;

/// A controller site.
///
/// `name` is the short internal reference (`default`, `x7k2q9`) that
/// appears in API paths; `description` is what the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Site {
    /// Whether `key` refers to this site by id or internal name.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.name == key
    }
}

impl From<LegacySite> for Site {
    fn from(raw: LegacySite) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.desc.filter(|d| !d.is_empty()),
        }
    }
}
