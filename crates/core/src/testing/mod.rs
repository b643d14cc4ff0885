//! Testing utilities and mock implementations for E2E tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_core::testing::{fixtures, MockBackend};
//!
//! let backend = Arc::new(MockBackend::new());
//! let orchestrator = Orchestrator::new(config, registry, backend.clone());
//!
//! // ... drive ticks, then assert on backend.dispatched().await
//! ```

mod mock_backend;

pub use mock_backend::{MockBackend, RecordedCancel, RecordedDispatch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::campaign::{CampaignBrief, CampaignMetadata, ClientTier};
    use crate::task::{ResourceKind, ResourceProfile};

    /// A campaign brief with reasonable defaults.
    pub fn campaign_brief(name: &str) -> CampaignBrief {
        CampaignBrief {
            name: name.to_string(),
            products: vec!["poster".to_string(), "banner".to_string()],
            deadline: None,
            tags: vec![],
            client_tier: ClientTier::Standard,
        }
    }

    /// A brief with a deadline and client tier.
    pub fn tiered_brief(
        name: &str,
        tier: ClientTier,
        deadline: Option<DateTime<Utc>>,
    ) -> CampaignBrief {
        CampaignBrief {
            deadline,
            client_tier: tier,
            ..campaign_brief(name)
        }
    }

    /// Metadata for a low-complexity sequential campaign.
    pub fn pipeline_metadata() -> CampaignMetadata {
        CampaignMetadata {
            complexity: 0.3,
            estimated_variants: 4,
            parallelization_potential: 0.2,
            risk_tags: vec![],
        }
    }

    /// Metadata that decomposes into independent per-product tasks.
    pub fn parallel_metadata() -> CampaignMetadata {
        CampaignMetadata {
            complexity: 0.5,
            estimated_variants: 8,
            parallelization_potential: 0.9,
            risk_tags: vec![],
        }
    }

    /// Worker capacity covering every resource dimension generously.
    pub fn large_capacity() -> ResourceProfile {
        ResourceProfile::new()
            .with(ResourceKind::Cpu, 8.0)
            .with(ResourceKind::Memory, 8.0)
            .with(ResourceKind::Gpu, 8.0)
            .with(ResourceKind::ApiQuota, 1000.0)
            .with(ResourceKind::Network, 8.0)
    }

    /// Capability set accepted by every task type.
    pub fn all_capabilities() -> Vec<String> {
        vec![
            "image_generation".to_string(),
            "quality_checks".to_string(),
        ]
    }
}
