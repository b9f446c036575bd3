//! External provider clients: SERP rankings + post enrichment.

pub mod enrich;
pub mod serp;

pub use enrich::{ActorEnrichmentClient, EnrichmentConfig, EnrichmentFetcher};
pub use serp::{SerpClient, SerpConfig, SerpFetcher};

pub const CRATE_NAME: &str = "redrank-providers";
