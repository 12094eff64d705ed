use crate::{BridgeError, ComponentBridge, InspectionOutcome};
use async_trait::async_trait;
use rts_core::{Element, ElementId, ElementMap, FilterDescriptor, RendererId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterScene {
    pub filters: Vec<FilterDescriptor>,
    #[serde(default)]
    pub elements: ElementMap,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BridgeScript {
    #[serde(default)]
    pub scenes: Vec<FilterScene>,
    #[serde(default)]
    pub renderers: BTreeMap<ElementId, RendererId>,
    #[serde(default)]
    pub inspections: BTreeMap<ElementId, InspectionOutcome>,
    #[serde(default, rename = "settleAfterPolls")]
    pub settle_after_polls: u32,
    #[serde(default, rename = "neverSettle")]
    pub never_settle: bool,
    #[serde(default, rename = "failSnapshot")]
    pub fail_snapshot: bool,
}

#[derive(Debug, Default)]
struct ScriptedState {
    active: Option<usize>,
    pending: Option<usize>,
    polls_remaining: u32,
    revision: u64,
    submissions: Vec<Vec<FilterDescriptor>>,
}

#[derive(Debug)]
pub struct ScriptedBridge {
    script: BridgeScript,
    state: Mutex<ScriptedState>,
}

impl ScriptedBridge {
    pub fn new(script: BridgeScript) -> Self {
        Self {
            script,
            state: Mutex::new(ScriptedState::default()),
        }
    }

    pub fn submitted_filters(&self) -> Vec<Vec<FilterDescriptor>> {
        self.state().submissions.clone()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().expect("scripted bridge state lock")
    }
}

#[async_trait]
impl ComponentBridge for ScriptedBridge {
    async fn submit_filters(&self, filters: &[FilterDescriptor]) -> Result<(), BridgeError> {
        let index = self
            .script
            .scenes
            .iter()
            .position(|scene| scene.filters.as_slice() == filters)
            .ok_or_else(|| BridgeError::Protocol {
                reason: format!(
                    "no scripted scene matches submitted filter list of {} entries",
                    filters.len()
                ),
            })?;

        let mut state = self.state();
        state.submissions.push(filters.to_vec());
        if !self.script.never_settle && self.script.settle_after_polls == 0 {
            state.active = Some(index);
            state.pending = None;
            state.revision += 1;
        } else {
            state.pending = Some(index);
            state.polls_remaining = self.script.settle_after_polls;
        }
        Ok(())
    }

    async fn revision(&self) -> Result<u64, BridgeError> {
        let mut state = self.state();
        if !self.script.never_settle {
            if let Some(index) = state.pending {
                if state.polls_remaining == 0 {
                    state.active = Some(index);
                    state.pending = None;
                    state.revision += 1;
                } else {
                    state.polls_remaining -= 1;
                }
            }
        }
        Ok(state.revision)
    }

    async fn snapshot(&self) -> Result<ElementMap, BridgeError> {
        if self.script.fail_snapshot {
            return Err(BridgeError::Unavailable {
                reason: "scripted snapshot failure".to_string(),
            });
        }
        let state = self.state();
        Ok(state
            .active
            .and_then(|index| self.script.scenes.get(index))
            .map(|scene| scene.elements.clone())
            .unwrap_or_default())
    }

    async fn renderer_id_for(&self, id: ElementId) -> Result<Option<RendererId>, BridgeError> {
        Ok(self.script.renderers.get(&id).copied())
    }

    async fn inspect(&self, element: &Element, _renderer_id: RendererId) -> InspectionOutcome {
        self.script
            .inspections
            .get(&element.id)
            .cloned()
            .unwrap_or(InspectionOutcome::Uninspectable)
    }
}
