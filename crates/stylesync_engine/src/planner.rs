//! Cascade planning: turns breakpoints, selections and declarations into the media, mixin and
//! nesting rules of the user stylesheet. The planner remembers what it last told the sink so
//! that replaying unchanged input produces no mutations.

use crate::config::EngineConfig;
use crate::diff::DeclarationDiff;
use crate::model::{DeclarationKey, StyleDeclaration, StyleSourceSelections};
use crate::selectors::instance_selector;
use crate::sink::SheetSink;
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashMap;
use stylesync_css::media::{sorted_breakpoints, Breakpoint};
use stylesync_css::stylesheet::NestingRuleId;
use stylesync_css::value::StyleValue;
use stylesync_shared::node::InstanceId;

/// Resolves the custom property a declaration is previewed through, if any
pub trait PreviewLookup {
    fn custom_property_for(&self, key: &DeclarationKey) -> Option<String>;
}

/// Nothing is previewed
pub struct NoPreview;

impl PreviewLookup for NoPreview {
    fn custom_property_for(&self, _key: &DeclarationKey) -> Option<String> {
        None
    }
}

#[derive(Debug)]
pub struct CascadePlanner {
    config: EngineConfig,
    root: Option<InstanceId>,
    /// Breakpoint ids in the order their media rules were created
    media_order: Vec<String>,
    nesting_rules: HashMap<InstanceId, NestingRuleId>,
    applied_selections: IndexMap<InstanceId, Vec<String>>,
    descendant_selectors: IndexMap<InstanceId, String>,
}

impl CascadePlanner {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            root: None,
            media_order: Vec::new(),
            nesting_rules: HashMap::new(),
            applied_selections: IndexMap::new(),
            descendant_selectors: IndexMap::new(),
        }
    }

    /// Forgets everything that was planned. Used after the sheet got cleared.
    pub fn reset(&mut self) {
        self.media_order.clear();
        self.nesting_rules.clear();
        self.applied_selections.clear();
        self.descendant_selectors.clear();
    }

    pub fn set_root(&mut self, root: Option<InstanceId>) {
        self.root = root;
    }

    pub fn root(&self) -> Option<&InstanceId> {
        self.root.as_ref()
    }

    /// Registers media rules in cascade order. Returns false when the new breakpoints cannot
    /// be appended to the media rules that already exist, in which case the sheet has to be
    /// rebuilt from scratch to keep the cascade right.
    pub fn plan_breakpoints(&mut self, sink: &mut SheetSink, breakpoints: &[Breakpoint]) -> bool {
        let sorted = sorted_breakpoints(breakpoints);
        let known = sorted
            .iter()
            .filter(|bp| self.media_order.contains(&bp.id))
            .map(|bp| bp.id.as_str());
        if !known.eq(self.media_order.iter().map(String::as_str)) {
            return false;
        }

        // Existing rules keep their place; only a tail of new breakpoints may be added
        let mut seen_new = false;
        for bp in &sorted {
            let is_new = !self.media_order.contains(&bp.id);
            if !is_new && seen_new {
                return false;
            }
            seen_new |= is_new;
        }

        for bp in sorted {
            if !self.media_order.contains(&bp.id) {
                sink.add_media_rule(&bp.id, bp);
                self.media_order.push(bp.id.clone());
            }
        }
        true
    }

    pub fn media_order(&self) -> &[String] {
        &self.media_order
    }

    /// Rewrites the selector of descendant marker rules. Returns the number of selectors that
    /// were actually changed.
    pub fn plan_descendants(
        &mut self,
        sink: &mut SheetSink,
        selectors: IndexMap<InstanceId, String>,
    ) -> usize {
        let mut changed = 0;

        for (id, selector) in &selectors {
            if self.descendant_selectors.get(id) == Some(selector) {
                continue;
            }
            if let Some(rule) = self.nesting_rules.get(id) {
                if sink.set_selector(*rule, selector) {
                    changed += 1;
                }
            }
        }

        // Markers that went away fall back to their own selector
        for id in self.descendant_selectors.keys() {
            if selectors.contains_key(id) {
                continue;
            }
            if let Some(rule) = self.nesting_rules.get(id) {
                let selector = instance_selector(&self.config, id, self.root.as_ref());
                if sink.set_selector(*rule, &selector) {
                    changed += 1;
                }
            }
        }

        self.descendant_selectors = selectors;
        changed
    }

    /// The selector an instance's nesting rule should currently use
    pub fn selector_for(&self, id: &InstanceId) -> String {
        match self.descendant_selectors.get(id) {
            Some(selector) => selector.clone(),
            None => instance_selector(&self.config, id, self.root.as_ref()),
        }
    }

    /// Returns the nesting rule of an instance, creating it when needed
    pub fn nesting_rule_for(&mut self, sink: &mut SheetSink, id: &InstanceId) -> NestingRuleId {
        if let Some(rule) = self.nesting_rules.get(id) {
            return *rule;
        }
        let rule = sink.add_nesting_rule(&self.selector_for(id));
        self.nesting_rules.insert(id.clone(), rule);
        rule
    }

    /// Applies each instance's style sources to its nesting rule. Instances whose selection
    /// went away get an empty mixin list; their rule stays so it can be reused. Returns the
    /// instances whose applied style sources changed.
    pub fn plan_selections(
        &mut self,
        sink: &mut SheetSink,
        selections: &StyleSourceSelections,
    ) -> Vec<InstanceId> {
        let mut changed = Vec::new();

        for (id, style_sources) in selections {
            if style_sources.is_empty() || self.applied_selections.get(id) == Some(style_sources) {
                continue;
            }
            let rule = self.nesting_rule_for(sink, id);
            sink.apply_mixins(rule, style_sources);
            self.applied_selections.insert(id.clone(), style_sources.clone());
            changed.push(id.clone());
        }

        let removed: Vec<InstanceId> = self
            .applied_selections
            .keys()
            .filter(|id| selections.get(*id).is_none_or(Vec::is_empty))
            .cloned()
            .collect();
        for id in removed {
            debug!("planner: selection of {id} removed");
            if let Some(rule) = self.nesting_rules.get(&id) {
                sink.apply_mixins(*rule, &[]);
            }
            self.applied_selections.shift_remove(&id);
            changed.push(id);
        }

        changed
    }

    /// Style sources last applied to an instance
    pub fn applied_selection(&self, id: &InstanceId) -> &[String] {
        self.applied_selections
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Puts the committed style sources back on an instance's rule, undoing ephemeral mixins
    pub fn restore_selection(&mut self, sink: &mut SheetSink, id: &InstanceId) {
        if let Some(rule) = self.nesting_rules.get(id) {
            let mixins = self.applied_selection(id).to_vec();
            sink.apply_mixins(*rule, &mixins);
        }
    }

    /// Writes one declaration into its style source's mixin rule
    pub fn write_declaration(
        &self,
        sink: &mut SheetSink,
        declaration: &StyleDeclaration,
        preview: &dyn PreviewLookup,
    ) {
        let key = declaration.key();
        if declaration.value.is_invalid() {
            warn!("planner: invalid value for {key}, writing it anyway");
        }

        let value = match preview.custom_property_for(&key) {
            Some(name) => StyleValue::var(&name, Some(declaration.value.clone())),
            None => declaration.value.clone(),
        };
        sink.set_declaration(&declaration.style_source_id, declaration.slot(), value);
    }

    pub fn delete_declaration(&self, sink: &mut SheetSink, key: &DeclarationKey) {
        sink.delete_declaration(&key.style_source_id, &key.slot());
    }

    /// Applies a diff: removals first, then stale keys, then additions
    pub fn apply_diff(&self, sink: &mut SheetSink, diff: &DeclarationDiff, preview: &dyn PreviewLookup) {
        for declaration in &diff.removed {
            self.delete_declaration(sink, &declaration.key());
        }
        for key in &diff.stale {
            self.delete_declaration(sink, key);
        }
        for declaration in &diff.added {
            self.write_declaration(sink, declaration, preview);
        }
    }
}
