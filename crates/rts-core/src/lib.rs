use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const FILTER_KIND_ELEMENT: u8 = 1;
pub const ELEMENT_KIND_HOST: u32 = 7;
pub const USER_DEFINED_ELEMENT_KINDS: [u32; 11] = [1, 2, 6, 7, 8, 9, 10, 11, 12, 13, 14];
pub const ROOT_FALLBACK_NAME: &str = "root";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RendererId(pub u32);

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub id: ElementId,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub owners: Vec<OwnerRef>,
}

impl Element {
    pub fn display_name_or_root(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| ROOT_FALLBACK_NAME.to_string())
    }
}

pub type ElementMap = BTreeMap<ElementId, Element>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    #[serde(rename = "type")]
    pub kind: u8,
    pub value: u32,
    #[serde(rename = "isEnabled")]
    pub enabled: bool,
}

impl FilterDescriptor {
    pub fn element_kind(value: u32) -> Self {
        Self {
            kind: FILTER_KIND_ELEMENT,
            value,
            enabled: true,
        }
    }
}

pub fn all_components_filters() -> Vec<FilterDescriptor> {
    vec![FilterDescriptor::element_kind(ELEMENT_KIND_HOST)]
}

pub fn user_defined_filters() -> Vec<FilterDescriptor> {
    USER_DEFINED_ELEMENT_KINDS
        .iter()
        .map(|value| FilterDescriptor::element_kind(*value))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTreeNode {
    pub name: String,
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

pub type RenderTree = BTreeMap<ElementId, RenderTreeNode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_descriptor_uses_bridge_wire_names() {
        let filter = FilterDescriptor::element_kind(7);
        let json = serde_json::to_value(filter).expect("serialize filter");
        assert_eq!(
            json,
            serde_json::json!({"type": 1, "value": 7, "isEnabled": true})
        );
    }

    #[test]
    fn all_components_preset_keeps_only_host_kind() {
        let filters = all_components_filters();
        assert_eq!(filters, vec![FilterDescriptor::element_kind(7)]);
    }

    #[test]
    fn user_defined_preset_lists_every_component_kind() {
        let filters = user_defined_filters();
        assert_eq!(filters.len(), 11);
        let values: Vec<u32> = filters.iter().map(|filter| filter.value).collect();
        assert_eq!(values, vec![1, 2, 6, 7, 8, 9, 10, 11, 12, 13, 14]);
        assert!(filters.iter().all(|filter| filter.enabled));
        assert!(filters
            .iter()
            .all(|filter| filter.kind == FILTER_KIND_ELEMENT));
    }

    #[test]
    fn element_without_display_name_falls_back_to_root() {
        let element = Element {
            id: ElementId(1),
            display_name: None,
            owners: Vec::new(),
        };
        assert_eq!(element.display_name_or_root(), "root");

        let named = Element {
            id: ElementId(2),
            display_name: Some("App".to_string()),
            owners: Vec::new(),
        };
        assert_eq!(named.display_name_or_root(), "App");
    }

    #[test]
    fn render_tree_serializes_keyed_by_element_id() {
        let mut tree = RenderTree::new();
        tree.insert(
            ElementId(3),
            RenderTreeNode {
                name: "App".to_string(),
                source: Some(SourceLocation::new("App.js", 10, 4)),
            },
        );
        tree.insert(
            ElementId(1),
            RenderTreeNode {
                name: "root".to_string(),
                source: None,
            },
        );

        let json = serde_json::to_value(&tree).expect("serialize tree");
        assert_eq!(
            json,
            serde_json::json!({
                "1": {"name": "root", "source": null},
                "3": {
                    "name": "App",
                    "source": {"file": "App.js", "line": 10, "column": 4}
                }
            })
        );
    }

    #[test]
    fn element_round_trips_through_capture_json() {
        let raw = serde_json::json!({
            "id": 4,
            "displayName": "Panel",
            "owners": [{"id": 2, "displayName": "App"}, {"id": 1}]
        });
        let element: Element = serde_json::from_value(raw).expect("deserialize element");
        assert_eq!(element.id, ElementId(4));
        assert_eq!(element.display_name.as_deref(), Some("Panel"));
        assert_eq!(element.owners.len(), 2);
        assert_eq!(element.owners[0].id, ElementId(2));
        assert_eq!(element.owners[1].display_name, None);
    }

    #[test]
    fn source_location_displays_file_line_column() {
        let source = SourceLocation::new("Foo.js", 10, 0);
        assert_eq!(source.to_string(), "Foo.js:10:0");
    }
}
