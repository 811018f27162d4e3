//! Detects elements that render without width or height and would become impossible to
//! select on the canvas. Flags are written as an attribute on the element; static helper
//! rules give flagged elements padding.

use crate::config::EngineConfig;
use crate::inspector::{common_ancestor, CollapseFlag, RenderTreeInspector};
use crate::model::{DeclarationKey, Declarations, PresetStyles, StyleSourceSelections};
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use std::collections::HashMap;
use stylesync_css::media::{sorted_breakpoints, Breakpoint};
use stylesync_css::value::StyleValue;
use stylesync_shared::node::InstanceId;

/// Read-only view of the committed styles, used to find explicitly sized elements
pub struct StyleLookup<'a> {
    pub declarations: &'a Declarations,
    pub selections: &'a StyleSourceSelections,
    pub breakpoints: &'a [Breakpoint],
    pub presets: &'a PresetStyles,
}

impl StyleLookup<'_> {
    /// Breakpoints that apply at the given canvas width, in cascade order
    pub fn matching_breakpoints(&self, canvas_width: f32) -> Vec<&Breakpoint> {
        sorted_breakpoints(self.breakpoints)
            .into_iter()
            .filter(|bp| bp.matches_width(canvas_width))
            .collect()
    }

    /// Cascaded base-state value of a property for an instance over the matching breakpoints
    pub fn cascaded_value(
        &self,
        id: &InstanceId,
        property: &str,
        breakpoints: &[&Breakpoint],
    ) -> Option<&StyleValue> {
        let style_sources = self.selections.get(id)?;
        let mut value = None;

        for breakpoint in breakpoints {
            for style_source in style_sources {
                let key = DeclarationKey {
                    style_source_id: style_source.clone(),
                    breakpoint_id: breakpoint.id.clone(),
                    state: String::new(),
                    property: property.to_string(),
                };
                if let Some(declaration) = self.declarations.get(&key) {
                    value = Some(&declaration.value);
                }
            }
        }

        value
    }

    /// Returns true when the instance or its tag preset sets a fixed size for the property
    pub fn has_explicit_size(
        &self,
        id: &InstanceId,
        tag: &str,
        property: &str,
        breakpoints: &[&Breakpoint],
    ) -> bool {
        let styled = self
            .cascaded_value(id, property, breakpoints)
            .is_some_and(StyleValue::is_fixed_unit);
        let preset = self
            .presets
            .get(tag)
            .and_then(|preset| preset.get(property))
            .is_some_and(StyleValue::is_fixed_unit);
        styled || preset
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollapseReport {
    /// Element the pass was scoped to, `None` for a scan from the root
    pub scope: Option<InstanceId>,
    /// Elements that were looked at
    pub scanned: usize,
    /// Flags removed before classification
    pub removed: Vec<InstanceId>,
    /// Flags that were set
    pub flags: IndexMap<InstanceId, CollapseFlag>,
}

#[derive(Debug)]
pub struct CollapseDetector {
    config: EngineConfig,
    dirty: IndexSet<InstanceId>,
    full_scan: bool,
}

impl CollapseDetector {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            dirty: IndexSet::new(),
            full_scan: false,
        }
    }

    /// Queues elements for the next pass. Repeated ids coalesce.
    pub fn mark_dirty(&mut self, ids: impl IntoIterator<Item = InstanceId>) {
        self.dirty.extend(ids);
    }

    /// Makes the next pass scan from the root
    pub fn mark_all(&mut self) {
        self.full_scan = true;
    }

    pub fn is_pending(&self) -> bool {
        self.full_scan || !self.dirty.is_empty()
    }

    fn scope(&self, inspector: &dyn RenderTreeInspector) -> Option<InstanceId> {
        if self.full_scan || self.dirty.len() >= self.config.scope_threshold {
            return inspector.root();
        }
        let present: Vec<InstanceId> = self
            .dirty
            .iter()
            .filter(|id| inspector.contains(id))
            .cloned()
            .collect();
        if present.is_empty() {
            return inspector.root();
        }
        common_ancestor(inspector, &present).or_else(|| inspector.root())
    }

    /// Runs a pass over the queued elements and clears the queue. Without anything queued the
    /// whole tree is scanned.
    pub fn run(&mut self, inspector: &mut dyn RenderTreeInspector, styles: &StyleLookup<'_>) -> CollapseReport {
        let scope = self.scope(inspector);
        let is_root_scope = scope.is_some() && scope == inspector.root();
        self.dirty.clear();
        self.full_scan = false;

        let Some(scope_id) = scope else {
            debug!("collapse: nothing rendered, skipping pass");
            return CollapseReport::default();
        };

        let mut elements = Vec::new();
        let mut stack = vec![scope_id.clone()];
        while let Some(id) = stack.pop() {
            let children = inspector.children_of(&id);
            stack.extend(children.into_iter().rev());
            elements.push(id);
        }

        let breakpoints = styles.matching_breakpoints(inspector.canvas_width());
        let mut removed = Vec::new();
        let mut flags = IndexMap::new();
        let mut in_flow_children: HashMap<&InstanceId, usize> = HashMap::new();

        for id in &elements {
            if inspector.collapsed_flag(id).is_some() {
                removed.push(id.clone());
            }
            for child in inspector.children_of(id) {
                if !inspector.position_of(&child).is_out_of_flow() {
                    *in_flow_children.entry(id).or_default() += 1;
                }
            }
        }

        for id in &elements {
            let Some(tag) = inspector.tag_of(id) else {
                debug!("collapse: element {id} went away, skipping");
                continue;
            };
            if self.config.is_skipped_tag(&tag) {
                continue;
            }
            if in_flow_children.get(id).copied().unwrap_or(0) > 0 {
                continue;
            }
            let Some(size) = inspector.bounding_box_of(id) else {
                warn!("collapse: no bounding box for {id}");
                continue;
            };

            let width = size.has_zero_width() && !styles.has_explicit_size(id, &tag, "width", &breakpoints);
            let height = size.has_zero_height() && !styles.has_explicit_size(id, &tag, "height", &breakpoints);
            if let Some(flag) = CollapseFlag::from_axes(width, height) {
                flags.insert(id.clone(), flag);
            }
        }

        for id in &removed {
            inspector.remove_collapsed_flag(id);
        }
        for (id, flag) in &flags {
            inspector.set_collapsed_flag(id, *flag);
        }

        debug!(
            "collapse: scanned {} elements, {} flagged",
            elements.len(),
            flags.len()
        );
        CollapseReport {
            scope: (!is_root_scope).then_some(scope_id),
            scanned: elements.len(),
            removed,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{Position, SyntheticTree};
    use crate::model::StyleDeclaration;
    use stylesync_shared::types::Size;

    struct Styles {
        declarations: Declarations,
        selections: StyleSourceSelections,
        breakpoints: Vec<Breakpoint>,
        presets: PresetStyles,
    }

    impl Styles {
        fn empty() -> Self {
            Self {
                declarations: Declarations::new(),
                selections: StyleSourceSelections::new(),
                breakpoints: vec![Breakpoint::base("base"), Breakpoint::max_width("mobile", 479)],
                presets: PresetStyles::new(),
            }
        }

        fn lookup(&self) -> StyleLookup<'_> {
            StyleLookup {
                declarations: &self.declarations,
                selections: &self.selections,
                breakpoints: &self.breakpoints,
                presets: &self.presets,
            }
        }
    }

    #[test]
    fn flags_empty_leaves() {
        let mut tree = SyntheticTree::new(1200.0);
        tree.insert(None, "root", "body", Size::new(1200.0, 800.0));
        tree.insert(Some("root"), "empty", "div", Size::ZERO);
        tree.insert(Some("root"), "flat", "div", Size::new(300.0, 0.0));
        tree.insert(Some("root"), "text", "p", Size::new(300.0, 20.0));

        let styles = Styles::empty();
        let report = CollapseDetector::new(EngineConfig::default()).run(&mut tree, &styles.lookup());

        assert_eq!(report.scope, None);
        assert_eq!(report.scanned, 4);
        assert_eq!(report.flags.get(&InstanceId::from("empty")), Some(&CollapseFlag::Both));
        assert_eq!(report.flags.get(&InstanceId::from("flat")), Some(&CollapseFlag::Height));
        assert_eq!(tree.collapsed().len(), 2);
    }

    #[test]
    fn explicit_width_for_matching_breakpoint_suppresses_flag() {
        let mut tree = SyntheticTree::new(400.0);
        tree.insert(None, "root", "body", Size::new(400.0, 800.0));
        tree.insert(Some("root"), "box", "div", Size::ZERO);

        let mut styles = Styles::empty();
        styles.selections.insert("box".into(), vec!["s1".to_string()]);
        styles.declarations.insert(StyleDeclaration::new(
            "s1",
            "base",
            None,
            "width",
            StyleValue::unit(50.0, "%"),
        ));
        styles.declarations.insert(StyleDeclaration::new(
            "s1",
            "mobile",
            None,
            "width",
            StyleValue::unit(0.0, "px"),
        ));

        let report = CollapseDetector::new(EngineConfig::default()).run(&mut tree, &styles.lookup());
        assert_eq!(report.flags.get(&InstanceId::from("box")), Some(&CollapseFlag::Height));

        tree.set_canvas_width(1200.0);
        let report = CollapseDetector::new(EngineConfig::default()).run(&mut tree, &styles.lookup());
        assert_eq!(report.flags.get(&InstanceId::from("box")), Some(&CollapseFlag::Both));
    }

    #[test]
    fn cascaded_value_follows_breakpoint_and_source_order() {
        let mut styles = Styles::empty();
        styles.breakpoints.push(Breakpoint::max_width("tablet", 991));
        styles.selections.insert("box".into(), vec!["s1".to_string(), "s2".to_string()]);
        styles.declarations.insert(StyleDeclaration::new("s2", "base", None, "width", StyleValue::unit(20.0, "px")));
        styles.declarations.insert(StyleDeclaration::new("s1", "tablet", None, "width", StyleValue::unit(30.0, "px")));
        styles.declarations.insert(StyleDeclaration::new("s1", "base", None, "width", StyleValue::unit(10.0, "px")));
        styles.declarations.insert(StyleDeclaration::new(
            "s2",
            "mobile",
            Some(":hover"),
            "width",
            StyleValue::unit(40.0, "px"),
        ));

        let lookup = styles.lookup();
        let id = InstanceId::from("box");

        let desktop = lookup.matching_breakpoints(1200.0);
        assert_eq!(desktop.len(), 1);
        assert_eq!(lookup.cascaded_value(&id, "width", &desktop), Some(&StyleValue::unit(20.0, "px")));

        let phone = lookup.matching_breakpoints(400.0);
        let ids: Vec<&str> = phone.iter().map(|bp| bp.id.as_str()).collect();
        assert_eq!(ids, ["base", "tablet", "mobile"]);
        assert_eq!(lookup.cascaded_value(&id, "width", &phone), Some(&StyleValue::unit(30.0, "px")));
        assert_eq!(lookup.cascaded_value(&id, "height", &phone), None);
    }

    #[test]
    fn presets_count_as_explicit_size() {
        let mut tree = SyntheticTree::new(1200.0);
        tree.insert(None, "root", "body", Size::new(1200.0, 800.0));
        tree.insert(Some("root"), "spacer", "hr", Size::ZERO);
        tree.insert(Some("root"), "line", "span", Size::ZERO);

        let mut styles = Styles::empty();
        styles.presets.insert(
            "span".to_string(),
            [("height".to_string(), StyleValue::unit(1.0, "px"))].into(),
        );

        let report = CollapseDetector::new(EngineConfig::default()).run(&mut tree, &styles.lookup());
        assert_eq!(report.flags.get(&InstanceId::from("line")), Some(&CollapseFlag::Width));
        assert!(!report.flags.contains_key(&InstanceId::from("spacer")));
    }

    #[test]
    fn narrows_scope_to_common_ancestor() {
        let mut tree = SyntheticTree::new(1200.0);
        tree.insert(None, "root", "body", Size::new(1200.0, 800.0));
        tree.insert(Some("root"), "a", "div", Size::new(100.0, 100.0));
        tree.insert(Some("a"), "a1", "div", Size::ZERO);
        tree.insert(Some("root"), "b", "div", Size::ZERO);

        let styles = Styles::empty();
        let mut detector = CollapseDetector::new(EngineConfig::default());
        detector.mark_dirty(["a1", "a1", "gone"].map(InstanceId::from));
        let report = detector.run(&mut tree, &styles.lookup());

        assert_eq!(report.scope, Some("a".into()));
        assert_eq!(report.scanned, 2);
        assert!(!report.flags.contains_key(&InstanceId::from("b")));
        assert!(!detector.is_pending());
    }

    #[test]
    fn stale_flags_are_cleared() {
        let mut tree = SyntheticTree::new(1200.0);
        tree.insert(None, "root", "body", Size::new(1200.0, 800.0));
        tree.insert(Some("root"), "box", "div", Size::ZERO);
        let styles = Styles::empty();
        let mut detector = CollapseDetector::new(EngineConfig::default());
        detector.run(&mut tree, &styles.lookup());

        if let Some(node) = tree.node_mut("box") {
            node.size = Size::new(10.0, 10.0);
        }
        let report = detector.run(&mut tree, &styles.lookup());
        assert_eq!(report.removed, vec![InstanceId::from("box")]);
        assert!(tree.collapsed().is_empty());
    }

    #[test]
    fn out_of_flow_children_keep_parent_a_leaf() {
        let mut tree = SyntheticTree::new(1200.0);
        tree.insert(None, "root", "body", Size::new(1200.0, 800.0));
        tree.insert(Some("root"), "parent", "div", Size::ZERO);
        tree.insert(Some("parent"), "overlay", "div", Size::new(20.0, 20.0)).position = Position::Fixed;

        let styles = Styles::empty();
        let report = CollapseDetector::new(EngineConfig::default()).run(&mut tree, &styles.lookup());
        assert_eq!(report.flags.get(&InstanceId::from("parent")), Some(&CollapseFlag::Both));
    }
}
