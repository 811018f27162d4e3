//! Read access to the rendered element tree, plus the collapse attribute writes. The canvas
//! implements this on top of the live document; [`SyntheticTree`] is an in-memory version.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use stylesync_shared::errors::Error;
use stylesync_shared::node::InstanceId;
use stylesync_shared::types::{Result, Size};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

impl Position {
    /// Absolute and fixed elements do not take part in their parent's flow
    pub fn is_out_of_flow(&self) -> bool {
        matches!(self, Position::Absolute | Position::Fixed)
    }
}

/// Which axes of an element collapsed to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollapseFlag {
    #[serde(rename = "w")]
    Width,
    #[serde(rename = "h")]
    Height,
    #[serde(rename = "wh")]
    Both,
}

impl CollapseFlag {
    pub fn from_axes(width: bool, height: bool) -> Option<Self> {
        match (width, height) {
            (true, true) => Some(CollapseFlag::Both),
            (true, false) => Some(CollapseFlag::Width),
            (false, true) => Some(CollapseFlag::Height),
            (false, false) => None,
        }
    }

    /// Attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            CollapseFlag::Width => "w",
            CollapseFlag::Height => "h",
            CollapseFlag::Both => "wh",
        }
    }
}

impl Display for CollapseFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait RenderTreeInspector {
    /// Element of the tree root, if rendered
    fn root(&self) -> Option<InstanceId>;

    /// Returns true when an element carrying this id is rendered
    fn contains(&self, id: &InstanceId) -> bool;

    /// Lowercase tag name
    fn tag_of(&self, id: &InstanceId) -> Option<String>;

    /// Managed child elements in document order
    fn children_of(&self, id: &InstanceId) -> Vec<InstanceId>;

    fn parent_of(&self, id: &InstanceId) -> Option<InstanceId>;

    fn position_of(&self, id: &InstanceId) -> Position;

    fn bounding_box_of(&self, id: &InstanceId) -> Option<Size<f32>>;

    /// Path from the root down to the element, both included. Empty when not rendered.
    fn ancestor_path_of(&self, id: &InstanceId) -> Vec<InstanceId> {
        if !self.contains(id) {
            return Vec::new();
        }

        let mut path = vec![id.clone()];
        let mut current = id.clone();
        while let Some(parent) = self.parent_of(&current) {
            path.push(parent.clone());
            current = parent;
        }
        path.reverse();
        path
    }

    /// Tests the element against a selector. Fails for selectors the host rejects.
    fn matches(&self, id: &InstanceId, selector: &str) -> Result<bool>;

    fn collapsed_flag(&self, id: &InstanceId) -> Option<CollapseFlag>;

    fn set_collapsed_flag(&mut self, id: &InstanceId, flag: CollapseFlag);

    fn remove_collapsed_flag(&mut self, id: &InstanceId);

    /// Width of the canvas, used to resolve which breakpoints apply
    fn canvas_width(&self) -> f32;
}

pub type InspectorHandle = Rc<RefCell<dyn RenderTreeInspector>>;

/// Deepest element that strictly contains every given element. Elements that are not
/// rendered are ignored; `None` when nothing is left or no such element exists.
pub fn common_ancestor(inspector: &dyn RenderTreeInspector, ids: &[InstanceId]) -> Option<InstanceId> {
    let mut common: Option<Vec<InstanceId>> = None;

    for path in ids.iter().map(|id| inspector.ancestor_path_of(id)) {
        if path.is_empty() {
            continue;
        }
        // Only strict ancestors can contain the element
        let ancestors = &path[..path.len() - 1];
        common = Some(match common {
            None => ancestors.to_vec(),
            Some(prefix) => prefix
                .into_iter()
                .zip(ancestors.iter())
                .take_while(|(a, b)| a == *b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    common.and_then(|path| path.last().cloned())
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticNode {
    pub tag: String,
    pub parent: Option<InstanceId>,
    pub children: Vec<InstanceId>,
    pub position: Position,
    pub size: Size<f32>,
    /// Pseudo-classes the element currently matches
    pub states: HashSet<String>,
    pub collapsed: Option<CollapseFlag>,
}

/// An in-memory render tree
#[derive(Debug, Clone)]
pub struct SyntheticTree {
    root: Option<InstanceId>,
    nodes: IndexMap<InstanceId, SyntheticNode>,
    canvas_width: f32,
}

impl SyntheticTree {
    pub fn new(canvas_width: f32) -> Self {
        Self {
            root: None,
            nodes: IndexMap::new(),
            canvas_width,
        }
    }

    /// Adds an element below the parent, or as root when there is no parent
    pub fn insert(&mut self, parent: Option<&str>, id: &str, tag: &str, size: Size<f32>) -> &mut SyntheticNode {
        let id = InstanceId::from(id);
        let parent = parent.map(InstanceId::from);

        match &parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.push(id.clone());
                }
            }
            None => self.root = Some(id.clone()),
        }

        self.nodes.entry(id).or_insert(SyntheticNode {
            tag: tag.to_lowercase(),
            parent,
            size,
            ..Default::default()
        })
    }

    /// Removes an element and its subtree
    pub fn remove(&mut self, id: &str) {
        let id = InstanceId::from(id);
        let Some(node) = self.nodes.shift_remove(&id) else {
            return;
        };
        if let Some(parent) = node.parent.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|child| child != &id);
        }
        if self.root.as_ref() == Some(&id) {
            self.root = None;
        }
        for child in node.children {
            self.remove(child.as_str());
        }
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut SyntheticNode> {
        self.nodes.get_mut(&InstanceId::from(id))
    }

    pub fn set_canvas_width(&mut self, width: f32) {
        self.canvas_width = width;
    }

    /// All elements carrying a collapse flag
    pub fn collapsed(&self) -> IndexMap<InstanceId, CollapseFlag> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| node.collapsed.map(|flag| (id.clone(), flag)))
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let layout: SyntheticLayout =
            serde_json::from_str(json).map_err(|err| Error::Json(err.to_string()))?;
        Ok(Self::from_layout(&layout))
    }

    pub fn from_layout(layout: &SyntheticLayout) -> Self {
        let mut tree = SyntheticTree::new(layout.canvas_width);
        tree.insert_layout(None, &layout.root);
        tree
    }

    fn insert_layout(&mut self, parent: Option<&str>, node: &LayoutNode) {
        let inserted = self.insert(parent, &node.id, &node.tag, Size::new(node.width, node.height));
        inserted.position = node.position;
        inserted.states = node.states.iter().cloned().collect();
        for child in &node.children {
            self.insert_layout(Some(&node.id), child);
        }
    }
}

fn is_valid_pseudo_class(selector: &str) -> bool {
    let Some(name) = selector.strip_prefix(':') else {
        return false;
    };
    let name = name.strip_prefix(':').unwrap_or(name);
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '(' | ')' | '+' | ' '))
        && name.matches('(').count() == name.matches(')').count()
}

impl RenderTreeInspector for SyntheticTree {
    fn root(&self) -> Option<InstanceId> {
        self.root.clone()
    }

    fn contains(&self, id: &InstanceId) -> bool {
        self.nodes.contains_key(id)
    }

    fn tag_of(&self, id: &InstanceId) -> Option<String> {
        self.nodes.get(id).map(|node| node.tag.clone())
    }

    fn children_of(&self, id: &InstanceId) -> Vec<InstanceId> {
        self.nodes
            .get(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn parent_of(&self, id: &InstanceId) -> Option<InstanceId> {
        self.nodes.get(id).and_then(|node| node.parent.clone())
    }

    fn position_of(&self, id: &InstanceId) -> Position {
        self.nodes.get(id).map(|node| node.position).unwrap_or_default()
    }

    fn bounding_box_of(&self, id: &InstanceId) -> Option<Size<f32>> {
        self.nodes.get(id).map(|node| node.size)
    }

    fn matches(&self, id: &InstanceId, selector: &str) -> Result<bool> {
        if !is_valid_pseudo_class(selector) {
            return Err(Error::InvalidSelector(selector.to_string()).into());
        }
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::UnknownElement(id.to_string()))?;
        Ok(node.states.contains(selector))
    }

    fn collapsed_flag(&self, id: &InstanceId) -> Option<CollapseFlag> {
        self.nodes.get(id).and_then(|node| node.collapsed)
    }

    fn set_collapsed_flag(&mut self, id: &InstanceId, flag: CollapseFlag) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.collapsed = Some(flag);
        }
    }

    fn remove_collapsed_flag(&mut self, id: &InstanceId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.collapsed = None;
        }
    }

    fn canvas_width(&self) -> f32 {
        self.canvas_width
    }
}

/// Serialized form of a synthetic tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticLayout {
    pub canvas_width: f32,
    pub root: LayoutNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub children: Vec<LayoutNode>,
}

fn default_tag() -> String {
    "div".to_string()
}
