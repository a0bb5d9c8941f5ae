//! Boundary checks on both sides of the completion call: the caller's request going in,
//! and the model's untyped reply coming out.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thiserror::Error;

use crate::errors::AppError;
use crate::finder::models::{FinderRequest, Kit, Recommendation};
use crate::llm_client::strip_json_fences;

/// A request that passed validation: non-blank question, at least one kit,
/// every handle non-empty and unique.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub question: String,
    pub kits: Vec<Kit>,
}

pub fn validate_request(request: FinderRequest) -> Result<ValidatedRequest, AppError> {
    let question = request
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("question is required".to_string()))?;

    let kits = request
        .kits
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest("kits must be a non-empty array".to_string()))?;

    let mut seen = HashSet::with_capacity(kits.len());
    for (i, kit) in kits.iter().enumerate() {
        if kit.handle.is_empty() {
            return Err(AppError::BadRequest(format!("kits[{i}] has an empty handle")));
        }
        if !seen.insert(kit.handle.as_str()) {
            return Err(AppError::BadRequest(format!(
                "duplicate kit handle '{}'",
                kit.handle
            )));
        }
    }

    Ok(ValidatedRequest { question, kits })
}

/// Why a model reply could not be used.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("reply has no 'recommendations' array")]
    Shape,
}

impl ReplyError {
    pub fn class(&self) -> &'static str {
        match self {
            ReplyError::Parse(_) => "parse_failure",
            ReplyError::Shape => "shape_failure",
        }
    }
}

/// Parses the raw reply and returns the elements of its `recommendations` array.
/// The elements themselves are not inspected here.
pub fn parse_reply(content: &str) -> Result<Vec<Value>, ReplyError> {
    let value: Value = serde_json::from_str(strip_json_fences(content))?;
    match value {
        Value::Object(mut map) => match map.remove("recommendations") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ReplyError::Shape),
        },
        _ => Err(ReplyError::Shape),
    }
}

/// Keeps the reply elements whose `handle` exactly matches a kit handle, in reply order.
///
/// `kits` must be the caller's full list, not the truncated prompt list. Elements that are
/// not objects or carry no string handle are dropped. A kept element's `title` falls back
/// to the kit title when absent; a missing `reason` becomes empty.
pub fn filter_recommendations(items: Vec<Value>, kits: &[Kit]) -> Vec<Recommendation> {
    let by_handle: HashMap<&str, &Kit> = kits.iter().map(|k| (k.handle.as_str(), k)).collect();

    items
        .into_iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let handle = obj.get("handle")?.as_str()?;
            let kit = by_handle.get(handle)?;
            let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

            Some(Recommendation {
                handle: kit.handle.clone(),
                title: text("title").unwrap_or_else(|| kit.title.clone()),
                reason: text("reason").unwrap_or_default(),
            })
        })
        .collect()
}
