//! The style data model as the editor hands it to the engine. Declarations are immutable
//! value objects: an edit replaces the `Rc` with a new one, it never mutates in place. The
//! diff engine depends on this.

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::rc::Rc;
use stylesync_css::media::Breakpoint;
use stylesync_css::stylesheet::DeclarationSlot;
use stylesync_css::value::StyleValue;
use stylesync_shared::errors::Error;
use stylesync_shared::node::InstanceId;
use stylesync_shared::types::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDeclaration {
    pub style_source_id: String,
    pub breakpoint_id: String,
    /// Pseudo-class (`:hover`) or pseudo-element (`::before`) suffix, none for the base state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub property: String,
    pub value: StyleValue,
}

impl StyleDeclaration {
    pub fn new(
        style_source_id: &str,
        breakpoint_id: &str,
        state: Option<&str>,
        property: &str,
        value: StyleValue,
    ) -> Self {
        Self {
            style_source_id: style_source_id.to_string(),
            breakpoint_id: breakpoint_id.to_string(),
            state: state.map(str::to_string),
            property: property.to_string(),
            value,
        }
    }

    pub fn key(&self) -> DeclarationKey {
        DeclarationKey {
            style_source_id: self.style_source_id.clone(),
            breakpoint_id: self.breakpoint_id.clone(),
            state: self.state_selector().to_string(),
            property: self.property.clone(),
        }
    }

    /// The state suffix, empty for the base state
    pub fn state_selector(&self) -> &str {
        self.state.as_deref().unwrap_or("")
    }

    /// Where this declaration lives inside its mixin rule
    pub fn slot(&self) -> DeclarationSlot {
        DeclarationSlot::new(&self.breakpoint_id, self.state_selector(), &self.property)
    }
}

/// Logical identity of a declaration. Writing a declaration with an existing key replaces
/// the previous one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclarationKey {
    pub style_source_id: String,
    pub breakpoint_id: String,
    pub state: String,
    pub property: String,
}

impl DeclarationKey {
    pub fn slot(&self) -> DeclarationSlot {
        DeclarationSlot::new(&self.breakpoint_id, &self.state, &self.property)
    }
}

impl Display for DeclarationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.style_source_id, self.breakpoint_id, self.state, self.property
        )
    }
}

/// The declaration store snapshot. Cloning is cheap: it copies `Rc`s, not declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<StyleDeclaration>", into = "Vec<StyleDeclaration>")]
pub struct Declarations(IndexMap<DeclarationKey, Rc<StyleDeclaration>>);

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the declaration, replacing any declaration with the same key
    pub fn insert(&mut self, declaration: StyleDeclaration) -> Rc<StyleDeclaration> {
        let declaration = Rc::new(declaration);
        self.0.insert(declaration.key(), declaration.clone());
        declaration
    }

    pub fn remove(&mut self, key: &DeclarationKey) -> Option<Rc<StyleDeclaration>> {
        self.0.shift_remove(key)
    }

    pub fn get(&self, key: &DeclarationKey) -> Option<&Rc<StyleDeclaration>> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<StyleDeclaration>> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<StyleDeclaration> for Declarations {
    fn from_iter<T: IntoIterator<Item = StyleDeclaration>>(iter: T) -> Self {
        let mut declarations = Declarations::new();
        for declaration in iter {
            declarations.insert(declaration);
        }
        declarations
    }
}

impl From<Vec<StyleDeclaration>> for Declarations {
    fn from(value: Vec<StyleDeclaration>) -> Self {
        value.into_iter().collect()
    }
}

impl From<Declarations> for Vec<StyleDeclaration> {
    fn from(value: Declarations) -> Self {
        value.iter().map(|decl| decl.as_ref().clone()).collect()
    }
}

/// Ordered style source ids per instance. Later style sources win on collisions.
pub type StyleSourceSelections = IndexMap<InstanceId, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InstanceChild {
    Text {
        value: String,
    },
    Id {
        value: InstanceId,
    },
    /// Marker instance whose styles apply to `<parent selector><selector>`
    Descendant {
        value: InstanceId,
        selector: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub children: Vec<InstanceChild>,
}

impl Instance {
    pub fn new(id: &str, component: &str) -> Self {
        Self {
            id: InstanceId::from(id),
            component: component.to_string(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<InstanceChild>) -> Self {
        self.children = children;
        self
    }
}

pub type Instances = IndexMap<InstanceId, Instance>;

/// Default declarations components give their tags, per tag and property
pub type PresetStyles = HashMap<String, HashMap<String, StyleValue>>;

/// An uncommitted preview declaration targeting one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralDeclaration {
    pub instance_id: InstanceId,
    pub declaration: StyleDeclaration,
}

/// Everything the engine reads, bundled. Used to seed stores and by the snapshot CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub breakpoints: Vec<Breakpoint>,
    pub instances: Vec<Instance>,
    pub root_instance_id: Option<InstanceId>,
    pub selections: StyleSourceSelections,
    pub declarations: Declarations,
    pub presets: PresetStyles,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::Json(err.to_string()).into())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read snapshot {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn instances(&self) -> Instances {
        self.instances
            .iter()
            .map(|instance| (instance.id.clone(), instance.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_writes_replace_by_key() {
        let mut declarations = Declarations::new();
        let first = declarations.insert(StyleDeclaration::new(
            "s1",
            "base",
            None,
            "color",
            StyleValue::keyword("red"),
        ));
        let second = declarations.insert(StyleDeclaration::new(
            "s1",
            "base",
            None,
            "color",
            StyleValue::keyword("blue"),
        ));

        assert_eq!(declarations.len(), 1);
        assert!(!Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(declarations.get(&first.key()).unwrap(), &second));
    }

    #[test]
    fn state_is_part_of_the_key() {
        let base = StyleDeclaration::new("s1", "base", None, "color", StyleValue::keyword("red"));
        let hover =
            StyleDeclaration::new("s1", "base", Some(":hover"), "color", StyleValue::keyword("red"));
        assert_ne!(base.key(), hover.key());
        assert_eq!(hover.key().to_string(), "s1:base::hover:color");
    }

    #[test]
    fn snapshot_from_json() {
        let json = r#"{
            "breakpoints": [{"id": "base", "label": "Base"}],
            "instances": [{"id": "box", "component": "Box", "children": [{"type": "text", "value": "hi"}]}],
            "selections": {"box": ["s1"]},
            "declarations": [{
                "styleSourceId": "s1",
                "breakpointId": "base",
                "property": "color",
                "value": {"type": "keyword", "value": "red"}
            }]
        }"#;

        let snapshot = Snapshot::from_json(json).unwrap();
        assert_eq!(snapshot.breakpoints.len(), 1);
        assert!(snapshot.breakpoints[0].is_base());
        assert_eq!(snapshot.declarations.len(), 1);
        assert_eq!(snapshot.selections[&InstanceId::from("box")], vec!["s1"]);
        assert_eq!(snapshot.instances().len(), 1);
    }

    #[test]
    fn malformed_snapshot_is_a_json_error() {
        let err = Snapshot::from_json("{\"breakpoints\": 3}").unwrap_err();
        assert!(err.to_string().starts_with("json error"));
    }
}
