//! Live previews of uncommitted declarations.
//!
//! While a preview runs, every previewed declaration resolves through a custom property set on
//! the document root, so a drag gesture only rewrites one property per input event. When the
//! preview ends the last values are written literally into the committed mixin rules and the
//! custom properties go away.

use crate::config::EngineConfig;
use crate::model::{DeclarationKey, EphemeralDeclaration, StyleDeclaration};
use crate::planner::{CascadePlanner, PreviewLookup};
use crate::sink::SheetSink;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use stylesync_css::stylesheet::DeclarationSlot;
use stylesync_css::value::{StyleValue, ValueTransformer};
use stylesync_shared::node::InstanceId;

fn sanitize(part: &str) -> String {
    part.chars()
        .filter(|c| *c != ':')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Name of the custom property previewing a declaration: `--<source>-<state>-<property>`
pub fn custom_property_name(prefix: &str, style_source_id: &str, state: &str, property: &str) -> String {
    format!(
        "{prefix}{}-{}-{}",
        sanitize(style_source_id),
        sanitize(state),
        sanitize(property)
    )
}

/// The state as rendered in the state sheet. Pseudo-classes are dropped so the styles show
/// without the element being hovered or focused; pseudo-elements have to stay.
pub fn preview_state(state: &str) -> &str {
    match state.find("::") {
        Some(index) => &state[index..],
        None => "",
    }
}

/// Custom properties set on the document root
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RootStyle {
    properties: IndexMap<String, String>,
}

impl RootStyle {
    pub fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    pub fn remove_property(&mut self, name: &str) -> bool {
        self.properties.shift_remove(name).is_some()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn css_text(&self) -> String {
        if self.properties.is_empty() {
            return String::new();
        }
        let mut css = String::from(":root {\n");
        for (name, value) in &self.properties {
            css.push_str(&format!("  {name}: {value};\n"));
        }
        css.push_str("}\n");
        css
    }
}

#[derive(Debug, Clone, Default)]
pub struct RootStyleHandle(Rc<RefCell<RootStyle>>);

impl RootStyleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Ref<'_, RootStyle> {
        self.0.borrow()
    }

    pub fn set_property(&self, name: &str, value: &str) {
        self.0.borrow_mut().set_property(name, value);
    }

    pub fn remove_property(&self, name: &str) -> bool {
        self.0.borrow_mut().remove_property(name)
    }

    pub fn css_text(&self) -> String {
        self.0.borrow().css_text()
    }
}

#[derive(Debug, Clone)]
struct AppliedPreview {
    instance_id: InstanceId,
    /// Last previewed declaration, written back literally on rollback
    declaration: StyleDeclaration,
    custom_property: String,
}

#[derive(Debug)]
pub struct OverlayManager {
    prefix: String,
    root_style: RootStyleHandle,
    applied: IndexMap<DeclarationKey, AppliedPreview>,
    /// Instances whose nesting rule got a style source the selection does not have
    ephemeral_mixins: IndexSet<InstanceId>,
}

impl PreviewLookup for OverlayManager {
    fn custom_property_for(&self, key: &DeclarationKey) -> Option<String> {
        self.applied.get(key).map(|applied| applied.custom_property.clone())
    }
}

impl OverlayManager {
    pub fn new(config: &EngineConfig, root_style: RootStyleHandle) -> Self {
        Self {
            prefix: config.property_prefix.clone(),
            root_style,
            applied: IndexMap::new(),
            ephemeral_mixins: IndexSet::new(),
        }
    }

    pub fn is_previewing(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Forgets which rules were rewritten, after the user sheet was rebuilt. The next
    /// preview writes everything again.
    pub fn invalidate(&mut self) {
        self.applied.clear();
        self.ephemeral_mixins.clear();
    }

    pub fn root_style(&self) -> &RootStyleHandle {
        &self.root_style
    }

    /// Previews the declarations. Custom properties are written right away; the user sheet
    /// is rendered once at the end if the preview had to rewrite a rule.
    pub fn preview(
        &mut self,
        ephemeral: &[EphemeralDeclaration],
        planner: &mut CascadePlanner,
        user: &mut SheetSink,
        transformer: Option<&ValueTransformer>,
    ) {
        let mutations = user.mutations();

        for EphemeralDeclaration {
            instance_id,
            declaration,
        } in ephemeral
        {
            let key = declaration.key();
            let name = custom_property_name(
                &self.prefix,
                &declaration.style_source_id,
                declaration.state_selector(),
                &declaration.property,
            );
            self.root_style
                .set_property(&name, &declaration.value.to_css(transformer));

            if !self.applied.contains_key(&key) {
                debug!("overlay: previewing {key} through {name}");
                user.set_declaration(
                    &declaration.style_source_id,
                    declaration.slot(),
                    StyleValue::var(&name, Some(declaration.value.clone())),
                );
            }
            self.applied.insert(
                key,
                AppliedPreview {
                    instance_id: instance_id.clone(),
                    declaration: declaration.clone(),
                    custom_property: name,
                },
            );

            if !planner
                .applied_selection(instance_id)
                .contains(&declaration.style_source_id)
            {
                let rule = planner.nesting_rule_for(user, instance_id);
                user.add_mixin(rule, &declaration.style_source_id);
                self.ephemeral_mixins.insert(instance_id.clone());
            }
        }

        if user.mutations() != mutations {
            user.render_now();
        }
    }

    /// Writes the state-bearing previews into the state sheet without their pseudo-class
    pub fn mirror_states(&self, planner: &CascadePlanner, state: &mut SheetSink) {
        for applied in self.applied.values() {
            let declaration = &applied.declaration;
            let Some(selector) = declaration.state.as_deref() else {
                continue;
            };

            let slot = DeclarationSlot::new(
                &declaration.breakpoint_id,
                preview_state(selector),
                &declaration.property,
            );
            state.set_declaration(
                &declaration.style_source_id,
                slot,
                StyleValue::var(&applied.custom_property, Some(declaration.value.clone())),
            );
            let rule = state.add_nesting_rule(&planner.selector_for(&applied.instance_id));
            state.add_mixin(rule, &declaration.style_source_id);
        }
    }

    pub fn has_state_previews(&self) -> bool {
        self.applied.values().any(|a| a.declaration.state.is_some())
    }

    /// Ends the preview. The last previewed values are written literally, custom properties
    /// are removed and ephemeral mixins are taken off again. Returns the keys the committed
    /// path has to reconcile, since the store may hold other values than the preview had.
    pub fn rollback(&mut self, planner: &mut CascadePlanner, user: &mut SheetSink) -> Vec<DeclarationKey> {
        let applied = std::mem::take(&mut self.applied);
        debug!("overlay: rolling back {} previewed declarations", applied.len());

        for applied in applied.values() {
            let declaration = &applied.declaration;
            user.set_declaration(
                &declaration.style_source_id,
                declaration.slot(),
                declaration.value.clone(),
            );
            self.root_style.remove_property(&applied.custom_property);
        }

        for instance in std::mem::take(&mut self.ephemeral_mixins) {
            planner.restore_selection(user, &instance);
        }

        user.render_now();
        applied.into_keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StyleSourceSelections;
    use crate::planner::NoPreview;
    use stylesync_css::media::Breakpoint;
    use stylesync_css::stylesheet::{SheetHandle, StyleSheet};
    use stylesync_shared::scheduler::SchedulerHandle;
    use test_case::test_case;

    #[test_case("s1", "", "color", "--s1--color")]
    #[test_case("s1", ":hover", "color", "--s1-hover-color")]
    #[test_case("s1", "::before", "content", "--s1-before-content")]
    #[test_case("local id", ":nth-child(2)", "color", "--local_id-nth-child_2_-color")]
    fn names_custom_properties(source: &str, state: &str, property: &str, expected: &str) {
        assert_eq!(custom_property_name("--", source, state, property), expected);
    }

    #[test_case(":hover", "")]
    #[test_case("::before", "::before")]
    #[test_case(":hover::after", "::after")]
    fn strips_pseudo_classes(state: &str, expected: &str) {
        assert_eq!(preview_state(state), expected);
    }

    fn setup() -> (OverlayManager, CascadePlanner, SheetSink) {
        let config = EngineConfig::default();
        let mut planner = CascadePlanner::new(config.clone());
        let mut user = SheetSink::new(SheetHandle::create(StyleSheet::new("user")), SchedulerHandle::new());
        planner.plan_breakpoints(&mut user, &[Breakpoint::base("base")]);
        (OverlayManager::new(&config, RootStyleHandle::new()), planner, user)
    }

    fn ephemeral(instance: &str, value: &str) -> EphemeralDeclaration {
        EphemeralDeclaration {
            instance_id: InstanceId::from(instance),
            declaration: StyleDeclaration::new("s1", "base", None, "color", StyleValue::keyword(value)),
        }
    }

    #[test]
    fn preview_writes_var_once_per_key() {
        let (mut overlay, mut planner, mut user) = setup();
        let selections: StyleSourceSelections = [(InstanceId::from("box"), vec!["s1".to_string()])].into();
        planner.plan_selections(&mut user, &selections);

        overlay.preview(&[ephemeral("box", "blue")], &mut planner, &mut user, None);
        let mutations = user.mutations();
        overlay.preview(&[ephemeral("box", "green")], &mut planner, &mut user, None);

        assert_eq!(user.mutations(), mutations);
        assert_eq!(overlay.root_style().get().property("--s1--color"), Some("green"));
        assert!(user.sheet().css_text().contains("color: var(--s1--color, blue);"));
    }

    #[test]
    fn preview_on_unselected_instance_adds_mixin_until_rollback() {
        let (mut overlay, mut planner, mut user) = setup();

        overlay.preview(&[ephemeral("fresh", "blue")], &mut planner, &mut user, None);
        assert!(user.sheet().css_text().contains("[data-id=\"fresh\"] {"));

        let keys = overlay.rollback(&mut planner, &mut user);
        assert_eq!(keys.len(), 1);
        assert!(!overlay.is_previewing());
        assert!(overlay.root_style().get().is_empty());
        assert!(!user.sheet().css_text().contains("fresh"));
    }

    #[test]
    fn rollback_writes_last_value_literally() {
        let (mut overlay, mut planner, mut user) = setup();
        let selections: StyleSourceSelections = [(InstanceId::from("box"), vec!["s1".to_string()])].into();
        planner.plan_selections(&mut user, &selections);
        let committed = StyleDeclaration::new("s1", "base", None, "color", StyleValue::keyword("red"));
        planner.write_declaration(&mut user, &committed, &NoPreview);

        overlay.preview(&[ephemeral("box", "blue")], &mut planner, &mut user, None);
        overlay.rollback(&mut planner, &mut user);

        let css = user.sheet().css_text();
        assert!(css.contains("color: blue;"));
        assert!(!css.contains("var("));
    }
}
