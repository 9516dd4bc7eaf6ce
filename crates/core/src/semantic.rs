//! Semantic grouping escalation.
//!
//! The semantic capability is an injected [`SemanticGrouper`]: it receives a
//! compact JSON payload and answers with raw text. Decoding, validation and
//! the time bound all live here, so a misbehaving provider can only ever
//! degrade a result, never fail it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{LayoutError, Result};

/// What the payload items are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Lines,
    Segments,
}

/// One semantic grouping call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticRequest {
    pub granularity: Granularity,
    /// Serialized line or segment payload.
    pub payload: serde_json::Value,
}

impl SemanticRequest {
    pub fn new<T: Serialize>(granularity: Granularity, payload: &T) -> Result<Self> {
        Ok(Self {
            granularity,
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// Capability that groups payload items into paragraphs.
///
/// Implementations return the provider's raw answer; an `Err` is reported as
/// a provider failure.
#[async_trait]
pub trait SemanticGrouper: Send + Sync {
    async fn group(&self, request: &SemanticRequest) -> Result<String>;
}

/// Result of one bounded semantic round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticOutcome {
    /// Validated groups; may be empty.
    Groups(Vec<Vec<usize>>),
    ParseFailure,
    TimedOut,
    ProviderFailed(String),
}

#[derive(Debug, Deserialize)]
struct GroupedResponse {
    #[serde(alias = "Paragraphs")]
    paragraphs: Vec<GroupedParagraph>,
}

#[derive(Debug, Deserialize)]
struct GroupedParagraph {
    #[serde(
        rename = "lineIndices",
        alias = "segmentIndices",
        alias = "line_indices",
        alias = "segment_indices",
        alias = "segment_lines_indices"
    )]
    indices: Vec<RawIndex>,
}

/// An index exactly as the provider wrote it.
///
/// Integers, integral floats and numeric strings are all accepted on decode;
/// anything that is not a non-negative integer is dropped at validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawIndex(serde_json::Value);

impl RawIndex {
    pub fn to_index(&self) -> Option<usize> {
        let index = match &self.0 {
            serde_json::Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }?;
        usize::try_from(index).ok()
    }
}

impl From<i64> for RawIndex {
    fn from(index: i64) -> Self {
        Self(index.into())
    }
}

impl fmt::Display for RawIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strips markdown fences and surrounding prose from a JSON answer.
pub(crate) fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if text.starts_with("```")
        && let Some(start) = text.find('\n')
    {
        let body = &text[start + 1..];
        if let Some(end) = body.rfind("```") {
            return body[..end].trim();
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
    {
        return &text[start..=end];
    }

    text
}

/// Decodes a grouping answer into raw, unvalidated index lists.
pub fn decode_groups(text: &str) -> Result<Vec<Vec<RawIndex>>> {
    let response: GroupedResponse = serde_json::from_str(extract_json(text))
        .map_err(|e| LayoutError::Parse(e.to_string()))?;
    Ok(response
        .paragraphs
        .into_iter()
        .map(|paragraph| paragraph.indices)
        .collect())
}

/// Drops out-of-range and repeated indices and empty groups; sorts each group.
pub fn validate_groups(raw: Vec<Vec<RawIndex>>, item_count: usize) -> Vec<Vec<usize>> {
    let mut used = FxHashSet::default();
    let mut groups = Vec::new();

    for raw_group in raw {
        let mut group = Vec::with_capacity(raw_group.len());
        for index in raw_group {
            let Some(i) = index.to_index().filter(|&i| i < item_count) else {
                let err = LayoutError::Validation {
                    index: index.to_string(),
                    msg: "out of range",
                };
                warn!(%err, item_count, "dropping index");
                continue;
            };
            if !used.insert(i) {
                let err = LayoutError::Validation {
                    index: index.to_string(),
                    msg: "already grouped",
                };
                warn!(%err, "dropping index");
                continue;
            }
            group.push(i);
        }
        if !group.is_empty() {
            group.sort_unstable();
            groups.push(group);
        }
    }
    groups
}

/// Runs `future` under `timeout`. Expiry drops the future.
pub(crate) async fn bounded<T>(
    future: impl Future<Output = Result<T>>,
    timeout: Duration,
) -> Result<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| LayoutError::Timeout(timeout))?
}

/// Asks `grouper` for groups over `item_count` items, within `timeout`.
///
/// Never fails: timeouts, provider errors and unparseable answers become the
/// matching [`SemanticOutcome`] variant.
pub async fn request_semantic_groups(
    grouper: &dyn SemanticGrouper,
    request: &SemanticRequest,
    item_count: usize,
    timeout: Duration,
) -> SemanticOutcome {
    match bounded(grouper.group(request), timeout).await {
        Ok(text) => match decode_groups(&text) {
            Ok(raw) => {
                let groups = validate_groups(raw, item_count);
                debug!(groups = groups.len(), item_count, "semantic groups accepted");
                SemanticOutcome::Groups(groups)
            }
            Err(err) => {
                error!(%err, granularity = ?request.granularity, "semantic answer rejected");
                SemanticOutcome::ParseFailure
            }
        },
        Err(err @ LayoutError::Timeout(_)) => {
            warn!(%err, granularity = ?request.granularity, "semantic grouping abandoned");
            SemanticOutcome::TimedOut
        }
        Err(err @ LayoutError::Parse(_)) => {
            error!(%err, granularity = ?request.granularity, "semantic answer rejected");
            SemanticOutcome::ParseFailure
        }
        Err(err) => {
            error!(%err, granularity = ?request.granularity, "semantic provider failed");
            SemanticOutcome::ProviderFailed(err.to_string())
        }
    }
}
