pub mod dedupe;
pub mod enrich;
pub mod load;
pub mod normalize;
pub mod orchestrator;
pub mod validate;
