// Pajama Finder: shopper description + candidate kits in, validated kit picks out.
// All completion calls go through llm_client::CompletionService.

pub mod handlers;
pub mod models;
pub mod prompts;
pub mod recommender;
pub mod validation;
