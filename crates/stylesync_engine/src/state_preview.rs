//! The state sheet shows the styles of one state (`:hover`, `::before`) of the selected
//! instance without the element having to be in that state. Overlay previews that carry a
//! state are mirrored in here as well.

use crate::inspector::RenderTreeInspector;
use crate::model::{Declarations, StyleSourceSelections};
use crate::overlay::preview_state;
use crate::planner::CascadePlanner;
use crate::sink::SheetSink;
use log::warn;
use std::collections::HashSet;
use stylesync_css::media::{sorted_breakpoints, Breakpoint};
use stylesync_css::stylesheet::DeclarationSlot;
use stylesync_shared::node::InstanceId;

pub struct StateSelection<'a> {
    pub instance: &'a InstanceId,
    pub state: &'a str,
}

/// Rebuilds the state sheet from scratch for the selected instance and state
pub fn rebuild_state_sheet(
    sink: &mut SheetSink,
    planner: &CascadePlanner,
    breakpoints: &[Breakpoint],
    declarations: &Declarations,
    selections: &StyleSourceSelections,
    selected: Option<StateSelection<'_>>,
) {
    sink.clear();
    for breakpoint in sorted_breakpoints(breakpoints) {
        sink.add_media_rule(&breakpoint.id, breakpoint);
    }

    let Some(StateSelection { instance, state }) = selected else {
        return;
    };
    let Some(style_sources) = selections.get(instance).filter(|s| !s.is_empty()) else {
        return;
    };

    for declaration in declarations.iter().filter(|decl| {
        decl.state_selector() == state && style_sources.contains(&decl.style_source_id)
    }) {
        sink.set_declaration(
            &declaration.style_source_id,
            DeclarationSlot::new(
                &declaration.breakpoint_id,
                preview_state(state),
                &declaration.property,
            ),
            declaration.value.clone(),
        );
    }

    let rule = sink.add_nesting_rule(&planner.selector_for(instance));
    sink.apply_mixins(rule, style_sources);
}

/// States the element currently is in. Selectors the inspector rejects are logged once per
/// `warned` set and left out.
pub fn active_states(
    inspector: &dyn RenderTreeInspector,
    instance: &InstanceId,
    states: &[String],
    warned: &mut HashSet<String>,
) -> Vec<String> {
    states
        .iter()
        .filter(|state| match inspector.matches(instance, state) {
            Ok(matched) => matched,
            Err(err) => {
                if warned.insert(state.to_string()) {
                    warn!("state preview: cannot test {state} on {instance}: {err}");
                }
                false
            }
        })
        .cloned()
        .collect()
}
