use crate::media::Breakpoint;
use crate::value::{StyleValue, ValueTransformer};
use indexmap::IndexMap;
use log::debug;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Address of a declaration inside a mixin rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclarationSlot {
    /// Media rule id
    pub breakpoint: String,
    /// State suffix (`:hover`, `::before`), empty for the base state
    pub selector: String,
    pub property: String,
}

impl DeclarationSlot {
    pub fn new(breakpoint: &str, selector: &str, property: &str) -> Self {
        Self {
            breakpoint: breakpoint.to_string(),
            selector: selector.to_string(),
            property: property.to_string(),
        }
    }
}

/// A named bag of declarations. Mixin rules never render on their own; nesting rules pull
/// them in by id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MixinRule {
    declarations: BTreeMap<DeclarationSlot, StyleValue>,
}

impl MixinRule {
    pub fn set_declaration(&mut self, slot: DeclarationSlot, value: StyleValue) {
        self.declarations.insert(slot, value);
    }

    /// Removes the declaration. Returns true when something was removed.
    pub fn delete_declaration(&mut self, slot: &DeclarationSlot) -> bool {
        self.declarations.remove(slot).is_some()
    }

    pub fn declaration(&self, slot: &DeclarationSlot) -> Option<&StyleValue> {
        self.declarations.get(slot)
    }

    pub fn declarations(&self) -> impl Iterator<Item = (&DeclarationSlot, &StyleValue)> {
        self.declarations.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NestingRuleId(usize);

/// A selector plus the ordered list of mixins applied to it. Later mixins win.
#[derive(Debug, Clone, PartialEq)]
pub struct NestingRule {
    selector: String,
    mixins: Vec<String>,
}

impl NestingRule {
    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn mixins(&self) -> &[String] {
        &self.mixins
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MediaRule {
    media_text: String,
}

/// In-memory stylesheet. Every mutation only touches the in-memory rules; `render()`
/// flattens them into css text.
///
/// Rendering is canonical: within a block, states render base first then in lexical order,
/// and properties render in lexical order. Two sheets holding the same logical content render
/// the same text no matter in which order they were mutated.
#[derive(Debug, Default)]
pub struct StyleSheet {
    name: String,
    media_rules: IndexMap<String, MediaRule>,
    mixin_rules: HashMap<String, MixinRule>,
    nesting_rules: Vec<NestingRule>,
    nesting_by_selector: HashMap<String, NestingRuleId>,
    transformer: Option<ValueTransformer>,
    css_text: String,
    render_count: usize,
}

impl StyleSheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a media rule for the breakpoint. Media rules cascade in creation order; adding an
    /// existing one is a no-op.
    pub fn add_media_rule(&mut self, id: &str, breakpoint: &Breakpoint) {
        if self.media_rules.contains_key(id) {
            return;
        }
        self.media_rules.insert(
            id.to_string(),
            MediaRule {
                media_text: breakpoint.media_text(),
            },
        );
    }

    pub fn has_media_rule(&self, id: &str) -> bool {
        self.media_rules.contains_key(id)
    }

    pub fn media_rule_ids(&self) -> impl Iterator<Item = &str> {
        self.media_rules.keys().map(String::as_str)
    }

    /// Returns the mixin rule with the given id, creating it when needed
    pub fn add_mixin_rule(&mut self, id: &str) -> &mut MixinRule {
        self.mixin_rules.entry(id.to_string()).or_default()
    }

    pub fn mixin_rule(&self, id: &str) -> Option<&MixinRule> {
        self.mixin_rules.get(id)
    }

    pub fn mixin_rule_mut(&mut self, id: &str) -> Option<&mut MixinRule> {
        self.mixin_rules.get_mut(id)
    }

    /// Returns the nesting rule currently using this selector, creating it when needed
    pub fn add_nesting_rule(&mut self, selector: &str) -> NestingRuleId {
        if let Some(id) = self.nesting_by_selector.get(selector) {
            return *id;
        }

        let id = NestingRuleId(self.nesting_rules.len());
        self.nesting_rules.push(NestingRule {
            selector: selector.to_string(),
            mixins: Vec::new(),
        });
        self.nesting_by_selector.insert(selector.to_string(), id);
        id
    }

    /// Looks up the nesting rule currently using this selector
    pub fn find_nesting_rule(&self, selector: &str) -> Option<NestingRuleId> {
        self.nesting_by_selector.get(selector).copied()
    }

    pub fn nesting_rule(&self, id: NestingRuleId) -> Option<&NestingRule> {
        self.nesting_rules.get(id.0)
    }

    pub fn selector(&self, id: NestingRuleId) -> Option<&str> {
        self.nesting_rule(id).map(NestingRule::selector)
    }

    /// Rewrites the selector of an existing rule in place. Returns false when the rule does
    /// not exist or the selector is unchanged.
    pub fn set_selector(&mut self, id: NestingRuleId, selector: &str) -> bool {
        let Some(rule) = self.nesting_rules.get_mut(id.0) else {
            return false;
        };
        if rule.selector == selector {
            return false;
        }

        debug!("{}: selector {} -> {selector}", self.name, rule.selector);
        if self.nesting_by_selector.get(&rule.selector) == Some(&id) {
            self.nesting_by_selector.remove(&rule.selector);
        }
        rule.selector = selector.to_string();
        self.nesting_by_selector.insert(selector.to_string(), id);
        true
    }

    /// Replaces the applied mixins of a nesting rule
    pub fn apply_mixins(&mut self, id: NestingRuleId, mixins: &[String]) {
        if let Some(rule) = self.nesting_rules.get_mut(id.0) {
            rule.mixins = mixins.to_vec();
        }
    }

    /// Appends a mixin to a nesting rule unless it is already applied
    pub fn add_mixin(&mut self, id: NestingRuleId, mixin: &str) {
        if let Some(rule) = self.nesting_rules.get_mut(id.0) {
            if !rule.mixins.iter().any(|m| m == mixin) {
                rule.mixins.push(mixin.to_string());
            }
        }
    }

    pub fn set_transformer(&mut self, transformer: ValueTransformer) {
        self.transformer = Some(transformer);
    }

    pub fn transformer(&self) -> Option<&ValueTransformer> {
        self.transformer.as_ref()
    }

    /// Returns true when the sheet holds mixin or nesting rules, rendered or not
    pub fn has_rules(&self) -> bool {
        !self.mixin_rules.is_empty() || !self.nesting_rules.is_empty()
    }

    /// Drops every rule. The rendered text stays until the next render.
    pub fn clear(&mut self) {
        self.media_rules.clear();
        self.mixin_rules.clear();
        self.nesting_rules.clear();
        self.nesting_by_selector.clear();
    }

    /// Flattens all rules into css text
    pub fn render(&mut self) {
        let mut css = String::new();

        for (media_id, media) in &self.media_rules {
            let mut block = String::new();

            for rule in &self.nesting_rules {
                for (state, properties) in self.flatten(rule, media_id) {
                    block.push_str(&format!("  {}{} {{\n", rule.selector, state));
                    for (property, value) in properties {
                        block.push_str(&format!(
                            "    {}: {};\n",
                            property,
                            value.to_css(self.transformer.as_ref())
                        ));
                    }
                    block.push_str("  }\n");
                }
            }

            if !block.is_empty() {
                css.push_str(&format!("@media {} {{\n", media.media_text));
                css.push_str(&block);
                css.push_str("}\n");
            }
        }

        self.render_count += 1;
        self.css_text = css;
    }

    /// Collects the declarations of all applied mixins for one media rule. Within a state the
    /// last mixin declaring a property wins.
    fn flatten<'a>(
        &'a self,
        rule: &NestingRule,
        media_id: &str,
    ) -> BTreeMap<&'a str, BTreeMap<&'a str, &'a StyleValue>> {
        let mut states: BTreeMap<&str, BTreeMap<&str, &StyleValue>> = BTreeMap::new();

        for mixin in rule.mixins.iter().filter_map(|id| self.mixin_rules.get(id)) {
            for (slot, value) in mixin
                .declarations
                .iter()
                .filter(|(slot, _)| slot.breakpoint == media_id)
            {
                states
                    .entry(slot.selector.as_str())
                    .or_default()
                    .insert(slot.property.as_str(), value);
            }
        }

        states
    }

    /// The text produced by the last render
    pub fn css_text(&self) -> &str {
        &self.css_text
    }

    pub fn render_count(&self) -> usize {
        self.render_count
    }
}

/// Shared handle to a stylesheet. All clones point to the same sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetHandle(Rc<RefCell<StyleSheet>>);

impl SheetHandle {
    pub fn create(sheet: StyleSheet) -> Self {
        Self(Rc::new(RefCell::new(sheet)))
    }

    pub fn get(&self) -> Ref<'_, StyleSheet> {
        self.0.borrow()
    }

    pub fn get_mut(&self) -> RefMut<'_, StyleSheet> {
        self.0.borrow_mut()
    }

    pub fn css_text(&self) -> String {
        self.0.borrow().css_text().to_string()
    }

    pub fn ptr_eq(&self, other: &SheetHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
