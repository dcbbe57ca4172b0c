//! Game mechanics: size tiers, carried weight and status-effect stacking.

use serde::{Deserialize, Serialize};

/// Ordered size tiers. Agents must be at least as large as an item's required tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    Tiny,
    Small,
    #[default]
    Medium,
    Large,
    Huge,
    Gargantuan,
}

impl SizeTier {
    /// Parse a tier name, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tiny" => Some(SizeTier::Tiny),
            "small" => Some(SizeTier::Small),
            "medium" => Some(SizeTier::Medium),
            "large" => Some(SizeTier::Large),
            "huge" => Some(SizeTier::Huge),
            "gargantuan" => Some(SizeTier::Gargantuan),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTier::Tiny => "tiny",
            SizeTier::Small => "small",
            SizeTier::Medium => "medium",
            SizeTier::Large => "large",
            SizeTier::Huge => "huge",
            SizeTier::Gargantuan => "gargantuan",
        }
    }

    /// Carried weight of an item of this tier.
    pub fn weight(&self) -> u32 {
        match self {
            SizeTier::Tiny => 1,
            SizeTier::Small => 2,
            SizeTier::Medium => 3,
            SizeTier::Large => 4,
            SizeTier::Huge => 6,
            SizeTier::Gargantuan => 10,
        }
    }

    /// Weight for an optional tier; unknown sizes weigh as medium.
    pub fn weight_of(tier: Option<SizeTier>) -> u32 {
        tier.unwrap_or_default().weight()
    }
}

impl std::fmt::Display for SizeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a status effect combines with an already-active effect of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingPolicy {
    /// The new effect replaces the old one entirely.
    #[default]
    Replace,
    /// Keep the old deltas, take the new duration.
    Refresh,
    /// Numeric deltas add up; the longer duration wins.
    Stack,
}
