use async_trait::async_trait;
use futures_util::future::join_all;
use rts_core::{
    all_components_filters, user_defined_filters, Element, ElementId, ElementMap,
    FilterDescriptor, OwnerRef, RenderTree, RenderTreeNode, RendererId, SourceLocation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod emulator;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 25;
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_INSPECT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("bridge protocol error: {reason}")]
    Protocol { reason: String },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),
    #[error("filter change did not settle within {waited_ms}ms")]
    FilterSettleTimeout { waited_ms: u64 },
    #[error("extraction cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedElement {
    pub id: ElementId,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub source: Option<SourceLocation>,
    #[serde(default)]
    pub owners: Vec<OwnerRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InspectionOutcome {
    Inspected(InspectedElement),
    Uninspectable,
}

impl InspectionOutcome {
    pub fn inspected(&self) -> Option<&InspectedElement> {
        match self {
            InspectionOutcome::Inspected(detail) => Some(detail),
            InspectionOutcome::Uninspectable => None,
        }
    }
}

/// Capability set of the external devtools store. Implementations own the
/// live element collection; the extractor only submits filters and reads.
#[async_trait]
pub trait ComponentBridge: Send + Sync {
    async fn submit_filters(&self, filters: &[FilterDescriptor]) -> Result<(), BridgeError>;
    async fn revision(&self) -> Result<u64, BridgeError>;
    async fn snapshot(&self) -> Result<ElementMap, BridgeError>;
    async fn renderer_id_for(&self, id: ElementId) -> Result<Option<RendererId>, BridgeError>;
    async fn inspect(&self, element: &Element, renderer_id: RendererId) -> InspectionOutcome;
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub poll_interval: Duration,
    pub settle_timeout: Duration,
    pub inspect_timeout: Option<Duration>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            settle_timeout: Duration::from_millis(DEFAULT_SETTLE_TIMEOUT_MS),
            inspect_timeout: Some(Duration::from_millis(DEFAULT_INSPECT_TIMEOUT_MS)),
        }
    }
}

#[derive(Debug, Default)]
pub struct TreeExtractor {
    config: ExtractorConfig,
}

impl TreeExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Runs the full extraction against `bridge`. The bridge's filter state
    /// is mutated during the run; callers must not submit concurrent filter
    /// changes of their own until the returned future resolves.
    pub async fn extract(&self, bridge: &dyn ComponentBridge) -> Result<RenderTree, ExtractError> {
        self.extract_with_cancel(bridge, &CancellationToken::new())
            .await
    }

    pub async fn extract_with_cancel(
        &self,
        bridge: &dyn ComponentBridge,
        cancel: &CancellationToken,
    ) -> Result<RenderTree, ExtractError> {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        debug!(event = "extract_start");

        let required = self
            .settled_snapshot(bridge, &user_defined_filters(), cancel)
            .await?;
        // The unfiltered snapshot is kept so owner lookups can reach elements
        // the user-defined filter hides.
        let full = self
            .settled_snapshot(bridge, &all_components_filters(), cancel)
            .await?;
        debug!(
            event = "snapshots_captured",
            required = required.len(),
            full = full.len()
        );

        let mut tree = RenderTree::new();
        let mut inspections = Vec::with_capacity(required.len());
        for element in required.values() {
            tree.insert(
                element.id,
                RenderTreeNode {
                    name: element.display_name_or_root(),
                    source: None,
                },
            );
            inspections.push(self.inspect_element(bridge, element));
        }
        debug!(event = "inspect_wave_start", elements = inspections.len());

        let outcomes = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            outcomes = join_all(inspections) => outcomes,
        };

        let mut resolutions = Vec::new();
        for outcome in outcomes {
            let InspectionOutcome::Inspected(detail) = outcome? else {
                continue;
            };
            let Some(node) = tree.get_mut(&detail.id) else {
                continue;
            };
            if detail.source.is_some() {
                node.source = detail.source;
                continue;
            }
            let owners: Vec<&Element> = detail
                .owners
                .iter()
                .filter_map(|owner| full.get(&owner.id))
                .collect();
            if owners.is_empty() {
                continue;
            }
            let id = detail.id;
            resolutions.push(async move {
                let source = self.resolve_owner_source(bridge, owners).await?;
                Ok::<(ElementId, Option<SourceLocation>), BridgeError>((id, source))
            });
        }
        debug!(event = "resolve_wave_start", elements = resolutions.len());

        let resolved = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            resolved = join_all(resolutions) => resolved,
        };
        for entry in resolved {
            let (id, source) = entry?;
            if let Some(node) = tree.get_mut(&id) {
                node.source = source;
            }
        }

        debug!(event = "extract_complete", entries = tree.len());
        Ok(tree)
    }

    async fn settled_snapshot(
        &self,
        bridge: &dyn ComponentBridge,
        filters: &[FilterDescriptor],
        cancel: &CancellationToken,
    ) -> Result<ElementMap, ExtractError> {
        let before = bridge.revision().await?;
        bridge.submit_filters(filters).await?;

        let started = Instant::now();
        loop {
            if bridge.revision().await? > before {
                break;
            }
            let waited = started.elapsed();
            if waited >= self.config.settle_timeout {
                return Err(ExtractError::FilterSettleTimeout {
                    waited_ms: waited.as_millis() as u64,
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                _ = sleep(self.config.poll_interval) => {}
            }
        }

        let snapshot = bridge.snapshot().await?;
        debug!(
            event = "filters_settled",
            filters = filters.len(),
            elements = snapshot.len()
        );
        Ok(snapshot)
    }

    async fn inspect_element(
        &self,
        bridge: &dyn ComponentBridge,
        element: &Element,
    ) -> Result<InspectionOutcome, BridgeError> {
        let Some(renderer_id) = bridge.renderer_id_for(element.id).await? else {
            return Ok(InspectionOutcome::Uninspectable);
        };
        let outcome = match self.config.inspect_timeout {
            Some(limit) => match timeout(limit, bridge.inspect(element, renderer_id)).await {
                Ok(outcome) => outcome,
                Err(_) => InspectionOutcome::Uninspectable,
            },
            None => bridge.inspect(element, renderer_id).await,
        };
        Ok(outcome)
    }

    // Waits for every owner inspection to settle, then picks the first owner
    // in list order that carries a source. One level deep only; sources
    // missing on the owners themselves are not chased further.
    async fn resolve_owner_source(
        &self,
        bridge: &dyn ComponentBridge,
        owners: Vec<&Element>,
    ) -> Result<Option<SourceLocation>, BridgeError> {
        let settled = join_all(
            owners
                .into_iter()
                .map(|owner| self.inspect_element(bridge, owner)),
        )
        .await;

        let mut resolved = None;
        for outcome in settled {
            if let InspectionOutcome::Inspected(detail) = outcome? {
                if detail.source.is_some() {
                    resolved = detail.source;
                    break;
                }
            }
        }
        Ok(resolved)
    }
}
