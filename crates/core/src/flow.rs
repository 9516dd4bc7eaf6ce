//! Named grouping flows.
//!
//! A flow is a [`GroupingStrategy`] with a stable, versioned id. Callers pick
//! a flow by id or alias; ids are matched case-insensitively.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{LayoutError, Result};
use crate::input::LineRecord;
use crate::params::EngineConfig;
use crate::semantic::SemanticGrouper;
use crate::strategy::{
    GroupingOutput, GroupingStrategy, LinesOnlyStrategy, SemanticLinesStrategy,
    SemanticSegmentsStrategy,
};

pub const AUTO_GROUP_FLOW: &str = "ocr.auto_group.v1";
pub const LINES_ONLY_FLOW: &str = "ocr.lines_only.v1";
pub const LAYOUT_SEGMENTS_FLOW: &str = "ocr.layout_segments.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowDescriptor {
    pub id: String,
    pub label: String,
    pub description: String,
}

impl FlowDescriptor {
    pub fn new(id: &str, label: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Flow {
    pub descriptor: FlowDescriptor,
    strategy: Arc<dyn GroupingStrategy>,
}

impl Flow {
    pub fn new(descriptor: FlowDescriptor, strategy: Arc<dyn GroupingStrategy>) -> Self {
        Self {
            descriptor,
            strategy,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub async fn run(&self, lines: &[LineRecord]) -> GroupingOutput {
        self.strategy.group(lines).await
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Flows by normalized id, in registration order.
#[derive(Debug, Clone)]
pub struct FlowRegistry {
    flows: Vec<Flow>,
    by_key: FxHashMap<String, usize>,
    aliases: FxHashMap<String, usize>,
    default_flow: usize,
}

impl FlowRegistry {
    /// Builds a registry.
    ///
    /// Aliases pointing at unknown flows are ignored. An unknown default
    /// falls back to the first flow. At least one flow is required.
    pub fn new<'a>(
        flows: Vec<Flow>,
        default_flow_id: &str,
        aliases: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        if flows.is_empty() {
            return Err(LayoutError::Config(
                "at least one grouping flow is required".to_string(),
            ));
        }

        let mut by_key = FxHashMap::default();
        for (i, flow) in flows.iter().enumerate() {
            by_key.insert(normalize_key(flow.id()), i);
        }
        let aliases = aliases
            .into_iter()
            .filter_map(|(alias, target)| {
                by_key
                    .get(&normalize_key(target))
                    .map(|&i| (normalize_key(alias), i))
            })
            .collect();
        let default_flow = by_key
            .get(&normalize_key(default_flow_id))
            .copied()
            .unwrap_or(0);

        Ok(Self {
            flows,
            by_key,
            aliases,
            default_flow,
        })
    }

    pub fn default_flow_id(&self) -> &str {
        self.flows[self.default_flow].id()
    }

    pub fn available_flow_ids(&self) -> Vec<String> {
        self.flows.iter().map(|flow| flow.id().to_string()).collect()
    }

    pub fn descriptors(&self) -> Vec<&FlowDescriptor> {
        self.flows.iter().map(|flow| &flow.descriptor).collect()
    }

    /// Looks up a flow by id or alias; `None` or a blank hint picks the default.
    pub fn resolve(&self, hint: Option<&str>) -> Result<&Flow> {
        let Some(hint) = hint.filter(|h| !h.trim().is_empty()) else {
            return Ok(&self.flows[self.default_flow]);
        };
        let key = normalize_key(hint);
        self.aliases
            .get(&key)
            .or_else(|| self.by_key.get(&key))
            .map(|&i| &self.flows[i])
            .ok_or_else(|| LayoutError::FlowNotFound {
                requested: hint.to_string(),
                available: self.available_flow_ids(),
            })
    }
}

/// The stock flows.
///
/// The segment flow is registered only when a grouper is available; the
/// auto-group flow then escalates ambiguous pages to it.
pub fn default_registry(
    config: &EngineConfig,
    grouper: Option<Arc<dyn SemanticGrouper>>,
) -> Result<FlowRegistry> {
    let mut flows = vec![
        Flow::new(
            FlowDescriptor::new(
                AUTO_GROUP_FLOW,
                "Auto Group",
                "Line-to-paragraph grouping with semantic escalation. Best for mixed menus with dish lines and descriptions.",
            ),
            Arc::new(SemanticLinesStrategy::new(
                config.grouping.clone(),
                config.semantic.clone(),
                grouper.clone(),
            )),
        ),
        Flow::new(
            FlowDescriptor::new(
                LINES_ONLY_FLOW,
                "Lines Only",
                "No paragraph grouping. Useful for low-latency routing or strict line-level extraction.",
            ),
            Arc::new(LinesOnlyStrategy),
        ),
    ];
    if let Some(grouper) = grouper {
        flows.push(Flow::new(
            FlowDescriptor::new(
                LAYOUT_SEGMENTS_FLOW,
                "Layout Segments",
                "Splits lines into geometry-aware segments before semantic paragraph grouping.",
            ),
            Arc::new(SemanticSegmentsStrategy::new(
                config.semantic.clone(),
                config.cluster.clone(),
                grouper,
            )),
        ));
    }

    let default_flow = config.default_flow.as_deref().unwrap_or(AUTO_GROUP_FLOW);
    FlowRegistry::new(
        flows,
        default_flow,
        [
            ("default", AUTO_GROUP_FLOW),
            ("legacy", AUTO_GROUP_FLOW),
            ("fast", LINES_ONLY_FLOW),
            ("layout", LAYOUT_SEGMENTS_FLOW),
        ],
    )
}
