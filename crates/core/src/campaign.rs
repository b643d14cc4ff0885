//! Campaign submission types.
//!
//! Brief parsing and validation live upstream; the scheduler consumes the
//! validated brief plus derived metadata and turns them into tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commercial tier of the submitting client. Enterprise and premium tiers
/// get a priority boost at decomposition time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientTier {
    Enterprise,
    Premium,
    #[default]
    Standard,
}

impl ClientTier {
    pub fn is_priority_tier(&self) -> bool {
        matches!(self, ClientTier::Enterprise | ClientTier::Premium)
    }
}

/// A validated campaign brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub name: String,
    /// Products to produce creatives for; at least one, guaranteed upstream.
    pub products: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub client_tier: ClientTier,
}

impl CampaignBrief {
    /// Case-insensitive tag lookup.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Metadata derived from brief analysis upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignMetadata {
    /// Creative complexity score, 0-1.
    pub complexity: f64,
    /// Total variant count to produce across all products.
    pub estimated_variants: u32,
    /// How independently the products can be produced, 0-1. Above the
    /// configured threshold the campaign decomposes into parallel per-product
    /// tasks instead of a sequential pipeline.
    pub parallelization_potential: f64,
    #[serde(default)]
    pub risk_tags: Vec<String>,
}

impl Default for CampaignMetadata {
    fn default() -> Self {
        Self {
            complexity: 0.5,
            estimated_variants: 1,
            parallelization_potential: 0.0,
            risk_tags: Vec::new(),
        }
    }
}
