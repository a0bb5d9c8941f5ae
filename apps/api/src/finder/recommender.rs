//! The recommendation pipeline: prompt → one completion call → reply validation → fallback.
//!
//! `find_kits` never fails. Every upstream problem (transport, status, timeout, empty
//! content, unparseable or wrong-shaped reply) degrades to the deterministic fallback list.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::finder::models::{FinderResponse, Kit, Recommendation};
use crate::finder::prompts::{build_prompt, truncate_kits};
use crate::finder::validation::{filter_recommendations, parse_reply, ValidatedRequest};
use crate::llm_client::{CompletionService, LlmError};

/// Number of kits returned by the fallback path.
pub const FALLBACK_COUNT: usize = 3;
pub const FALLBACK_REASON: &str = "Popular choice from our matching sets";

/// First `FALLBACK_COUNT` kits in caller order, each with the generic reason.
pub fn fallback_recommendations(kits: &[Kit]) -> Vec<Recommendation> {
    kits.iter()
        .take(FALLBACK_COUNT)
        .map(|kit| Recommendation {
            handle: kit.handle.clone(),
            title: kit.title.clone(),
            reason: FALLBACK_REASON.to_string(),
        })
        .collect()
}

pub async fn find_kits(
    request: &ValidatedRequest,
    llm: &dyn CompletionService,
    timeout: Duration,
) -> FinderResponse {
    let prompt_kits = truncate_kits(&request.kits);
    if prompt_kits.len() < request.kits.len() {
        info!(
            "Truncated kit list for prompt: {} -> {}",
            request.kits.len(),
            prompt_kits.len()
        );
    }

    let prompt = build_prompt(&request.question, prompt_kits);

    let content = match tokio::time::timeout(timeout, llm.complete(&prompt)).await {
        Ok(Ok(content)) => content,
        Ok(Err(e)) => return degrade(prompt_kits, e.class(), &e),
        Err(_) => {
            let e = LlmError::Timeout(timeout);
            return degrade(prompt_kits, e.class(), &e);
        }
    };

    info!("Raw model content: {content}");

    let items = match parse_reply(&content) {
        Ok(items) => items,
        Err(e) => return degrade(prompt_kits, e.class(), &e),
    };

    let suggested = items.len();
    let recommendations = filter_recommendations(items, &request.kits);
    if recommendations.len() < suggested {
        warn!(
            "Dropped {} model recommendation(s) with unknown or malformed handles",
            suggested - recommendations.len()
        );
    }

    FinderResponse { recommendations }
}

fn degrade(kits: &[Kit], class: &str, cause: &dyn std::fmt::Display) -> FinderResponse {
    error!(class, "Completion failed, using fallback recommendations: {cause}");
    FinderResponse {
        recommendations: fallback_recommendations(kits),
    }
}
