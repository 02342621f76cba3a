use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TierPolicy;
use crate::world::player::Player;

/// Header row matching [`LootEvent::to_csv_line`].
pub const CSV_HEADER: &str = "timestamp_utc;looted_by__alliance;looted_by__guild;looted_by__name;item_id;item_name;quantity;looted_from__alliance;looted_from__guild;looted_from__name";

/// A resolved item transfer. Terminal output of the correlator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootEvent {
    pub timestamp: DateTime<Utc>,
    pub item_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub looted_by: Player,
    pub looted_from: Player,
}

impl LootEvent {
    pub fn new(
        item_id: impl Into<String>,
        item_name: impl Into<String>,
        quantity: i64,
        looted_by: Player,
        looted_from: Player,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            item_id: item_id.into(),
            item_name: item_name.into(),
            quantity,
            looted_by,
            looted_from,
        }
    }

    /// Semicolon-separated row for the loot log file.
    pub fn to_csv_line(&self) -> String {
        [
            self.timestamp.to_rfc3339(),
            self.looted_by.alliance.clone(),
            self.looted_by.guild.clone(),
            self.looted_by.name.clone(),
            self.item_id.clone(),
            self.item_name.clone(),
            self.quantity.to_string(),
            self.looted_from.alliance.clone(),
            self.looted_from.guild.clone(),
            self.looted_from.name.clone(),
        ]
        .join(";")
    }

    pub fn is_rare(&self, policy: &dyn TierPolicy) -> bool {
        policy.is_rare(&self.item_id)
    }

    /// `HH:MM:SS UTC: <by> looted <n>x <item> from <from>`
    pub fn format_log(&self) -> String {
        format!(
            "{} UTC: {} looted {}x {} from {}",
            self.timestamp.format("%H:%M:%S"),
            self.looted_by.format_name(),
            self.quantity,
            self.item_name,
            self.looted_from.format_name()
        )
    }
}

impl std::fmt::Display for LootEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_log())
    }
}
