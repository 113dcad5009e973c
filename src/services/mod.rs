pub mod association;
pub mod coedit;
pub mod filter;
pub mod lang;
pub mod links;
pub mod orchestrator;
pub mod sources;
pub mod textmatch;

pub use orchestrator::RecommendationService;
