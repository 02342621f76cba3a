//! Rare-tier classification of item ids such as `T8_2H_BOW_AVALON@3`.
//!
//! This is a presentation rule layered on top of loot events. The decoder and
//! correlator never consult it.

use std::collections::HashSet;

/// Tier and enchantment parsed from an item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TierInfo {
    pub tier: u8,
    pub enchant: u8,
}

impl TierInfo {
    /// Parse `T<tier>_...` with an optional trailing `@<enchant>`.
    pub fn parse(item_id: &str) -> Option<Self> {
        let bytes = item_id.as_bytes();
        if bytes.len() < 3 || !bytes[0].eq_ignore_ascii_case(&b'T') || bytes[2] != b'_' {
            return None;
        }
        let tier = char::from(bytes[1]).to_digit(10)? as u8;
        let enchant = match bytes {
            [.., b'@', digit] if digit.is_ascii_digit() => digit - b'0',
            _ => 0,
        };
        Some(Self { tier, enchant })
    }

    /// `T<tier>.<enchant>`
    pub fn display_name(&self) -> String {
        format!("T{}.{}", self.tier, self.enchant)
    }
}

pub trait TierPolicy: Send + Sync {
    fn is_rare_tier(&self, tier: TierInfo) -> bool;

    fn is_rare(&self, item_id: &str) -> bool {
        TierInfo::parse(item_id).is_some_and(|info| self.is_rare_tier(info))
    }
}

/// Table-driven policy; the default table marks 4.4, 5.3+, 6.2+, 7.1+ and all of tier 8.
#[derive(Debug, Clone)]
pub struct RareTierTable {
    rare: HashSet<(u8, u8)>,
}

impl RareTierTable {
    pub fn new(rare: impl IntoIterator<Item = (u8, u8)>) -> Self {
        Self {
            rare: rare.into_iter().collect(),
        }
    }
}

impl Default for RareTierTable {
    fn default() -> Self {
        Self::new([
            (4, 4),
            (5, 3),
            (5, 4),
            (6, 2),
            (6, 3),
            (6, 4),
            (7, 1),
            (7, 2),
            (7, 3),
            (7, 4),
            (8, 0),
            (8, 1),
            (8, 2),
            (8, 3),
            (8, 4),
        ])
    }
}

impl TierPolicy for RareTierTable {
    fn is_rare_tier(&self, tier: TierInfo) -> bool {
        self.rare.contains(&(tier.tier, tier.enchant))
    }
}
