//! A synchronization session owns the stylesheets and keeps them in line with the stores
//! until it gets aborted.
//!
//! Sheets are created in a fixed order which is also their cascade precedence: the user sheet
//! (committed styles), the state sheet (state previews) and the helpers sheet (collapse
//! padding). Store changes are planned and diffed right away; rendering happens once per frame.

use crate::collapse::{CollapseDetector, CollapseReport, StyleLookup};
use crate::config::EngineConfig;
use crate::diff::DiffEngine;
use crate::helpers::plan_helpers;
use crate::inspector::InspectorHandle;
use crate::model::PresetStyles;
use crate::overlay::{OverlayManager, RootStyleHandle};
use crate::planner::CascadePlanner;
use crate::selectors::descendant_selectors;
use crate::sink::{SheetSink, SinkOp};
use crate::state_preview::{active_states, rebuild_state_sheet, StateSelection};
use crate::store::{Store, StyleStores, Subscription};
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use stylesync_css::stylesheet::{SheetHandle, StyleSheet};
use stylesync_css::value::ValueTransformer;
use stylesync_shared::abort::AbortSignal;
use stylesync_shared::node::InstanceId;
use stylesync_shared::scheduler::SchedulerHandle;

/// Frame key of the pass that re-reads every store
pub const SYNC_FRAME: &str = "sync";
/// Frame key of the debounced collapse pass
pub const COLLAPSE_FRAME: &str = "collapse";

/// Upper bound of frames [`SyncSession::flush`] runs before giving up
const MAX_FLUSH_FRAMES: usize = 16;

struct SessionState {
    this: Weak<RefCell<SessionState>>,
    active: bool,
    config: EngineConfig,
    stores: StyleStores,
    scheduler: SchedulerHandle,
    transformer: Option<ValueTransformer>,
    user: SheetSink,
    state: SheetSink,
    helpers: SheetSink,
    planner: CascadePlanner,
    diff: DiffEngine,
    overlay: OverlayManager,
    collapse: CollapseDetector,
    inspector: Option<InspectorHandle>,
    presets: PresetStyles,
    warned_states: HashSet<String>,
    last_collapse: Option<CollapseReport>,
    subscriptions: Vec<Subscription>,
}

/// Runs `f` on the session unless it is gone, inactive or already borrowed. A busy session
/// gets a full sync on the next frame instead.
fn with_state(weak: &Weak<RefCell<SessionState>>, scheduler: &SchedulerHandle, f: impl FnOnce(&mut SessionState)) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    match state.try_borrow_mut() {
        Ok(mut state) if state.active => f(&mut state),
        Ok(_) => {}
        Err(_) => {
            warn!("session: busy while notified, deferring to next frame");
            schedule_sync(weak.clone(), scheduler);
        }
    };
}

fn schedule_sync(weak: Weak<RefCell<SessionState>>, scheduler: &SchedulerHandle) {
    let s = scheduler.clone();
    scheduler.schedule_once(SYNC_FRAME, move || {
        with_state(&weak, &s, SessionState::sync_all);
    });
}

fn subscribe<T: 'static>(
    store: &Store<T>,
    weak: &Weak<RefCell<SessionState>>,
    scheduler: &SchedulerHandle,
    f: fn(&mut SessionState),
) -> Subscription {
    let weak = weak.clone();
    let scheduler = scheduler.clone();
    store.subscribe(move |_| with_state(&weak, &scheduler, f))
}

impl SessionState {
    fn sync_all(&mut self) {
        let breakpoints = self.stores.breakpoints.get();
        if !self.planner.plan_breakpoints(&mut self.user, &breakpoints) {
            self.rebuild();
        }
        self.sync_structure();
        self.sync_declarations();
        self.sync_overlay();
        self.refresh_state_sheet();
    }

    /// Starts the user sheet over. Needed when media rules would end up in the wrong order.
    fn rebuild(&mut self) {
        debug!("session: rebuilding user sheet");
        self.user.clear();
        self.planner.reset();
        self.diff.reset();
        self.overlay.invalidate();

        let breakpoints = self.stores.breakpoints.get();
        self.planner.plan_breakpoints(&mut self.user, &breakpoints);
    }

    fn sync_instances(&mut self) {
        let root = (*self.stores.root_instance_id.get()).clone();
        if self.planner.root() != root.as_ref() {
            self.planner.set_root(root);
            self.rebuild();
            self.sync_all();
        } else {
            self.sync_structure();
        }

        self.collapse.mark_all();
        self.schedule_collapse();
    }

    fn sync_structure(&mut self) {
        let instances = self.stores.instances.get();
        let root = (*self.stores.root_instance_id.get()).clone();
        let selectors = descendant_selectors(&self.config, &instances, root.as_ref());
        self.planner.plan_descendants(&mut self.user, selectors);
        self.sync_selections();
    }

    fn sync_selections(&mut self) {
        let selections = self.stores.selections.get();
        let changed = self.planner.plan_selections(&mut self.user, &selections);

        if self.overlay.is_previewing() {
            self.sync_overlay();
        }
        if !changed.is_empty() {
            self.collapse.mark_dirty(changed);
            self.schedule_collapse();
        }
        self.refresh_state_sheet();
    }

    fn sync_declarations(&mut self) {
        let declarations = self.stores.declarations.get();
        let diff = self.diff.diff(&declarations, self.transformer.as_ref());
        if diff.is_empty() {
            return;
        }
        debug!(
            "session: {} added, {} removed, {} stale declarations",
            diff.added.len(),
            diff.removed.len(),
            diff.stale.len()
        );
        self.planner.apply_diff(&mut self.user, &diff, &self.overlay);

        if self.inspector.is_some() {
            let style_sources: HashSet<&str> = diff
                .added
                .iter()
                .chain(&diff.removed)
                .map(|decl| decl.style_source_id.as_str())
                .chain(diff.stale.iter().map(|key| key.style_source_id.as_str()))
                .collect();
            let selections = self.stores.selections.get();
            self.collapse.mark_dirty(
                selections
                    .iter()
                    .filter(|(_, sources)| sources.iter().any(|s| style_sources.contains(s.as_str())))
                    .map(|(id, _)| id.clone()),
            );
            self.schedule_collapse();
        }
        self.refresh_state_sheet();
    }

    fn sync_overlay(&mut self) {
        let ephemeral = self.stores.ephemeral.get();

        if ephemeral.is_empty() {
            if !self.overlay.is_previewing() {
                return;
            }
            let keys = self.overlay.rollback(&mut self.planner, &mut self.user);
            self.diff.reconcile(keys);
            schedule_sync(self.this.clone(), &self.scheduler);
            self.refresh_state_sheet();
            self.state.render_now();
            return;
        }

        self.overlay.preview(
            &ephemeral,
            &mut self.planner,
            &mut self.user,
            self.transformer.as_ref(),
        );
        if self.overlay.has_state_previews() {
            self.refresh_state_sheet();
            self.state.render_now();
        }
    }

    fn refresh_state_sheet(&mut self) {
        let instance = (*self.stores.selected_instance.get()).clone();
        let state = (*self.stores.selected_state.get()).clone();
        let selected = match (&instance, &state) {
            (Some(instance), Some(state)) => Some(StateSelection {
                instance,
                state: state.as_str(),
            }),
            _ => None,
        };

        if selected.is_none() && !self.overlay.has_state_previews() {
            let sheet = self.state.sheet().get();
            if !sheet.has_rules() && sheet.css_text().is_empty() {
                return;
            }
        }

        rebuild_state_sheet(
            &mut self.state,
            &self.planner,
            &self.stores.breakpoints.get(),
            &self.stores.declarations.get(),
            &self.stores.selections.get(),
            selected,
        );
        self.overlay.mirror_states(&self.planner, &mut self.state);
    }

    fn schedule_collapse(&self) {
        if self.inspector.is_none() || !self.collapse.is_pending() {
            return;
        }
        let weak = self.this.clone();
        let scheduler = self.scheduler.clone();
        self.scheduler.schedule_once(COLLAPSE_FRAME, move || {
            with_state(&weak, &scheduler, SessionState::run_collapse);
        });
    }

    fn run_collapse(&mut self) {
        let Some(inspector) = self.inspector.clone() else {
            return;
        };
        let declarations = self.stores.declarations.get();
        let selections = self.stores.selections.get();
        let breakpoints = self.stores.breakpoints.get();
        let lookup = StyleLookup {
            declarations: &declarations,
            selections: &selections,
            breakpoints: &breakpoints,
            presets: &self.presets,
        };

        let report = self.collapse.run(&mut *inspector.borrow_mut(), &lookup);
        self.last_collapse = Some(report);
    }

    fn teardown(&mut self) {
        debug!("session: aborted");
        self.active = false;
        for key in [
            self.user.render_key(),
            self.state.render_key(),
            self.helpers.render_key(),
            SYNC_FRAME,
            COLLAPSE_FRAME,
        ] {
            self.scheduler.cancel(key);
        }
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

/// Handle to a running session. Clones share the session.
#[derive(Clone)]
pub struct SyncSession {
    state: Rc<RefCell<SessionState>>,
}

impl SyncSession {
    /// Creates the sheets, subscribes to every store and runs the initial sync. Aborting the
    /// signal cancels pending frames and detaches from the stores; rendered css is kept.
    pub fn start(
        config: EngineConfig,
        stores: StyleStores,
        scheduler: SchedulerHandle,
        transformer: Option<ValueTransformer>,
        abort: &AbortSignal,
    ) -> Self {
        let mut user = SheetSink::new(SheetHandle::create(StyleSheet::new("user")), scheduler.clone());
        let mut state = SheetSink::new(SheetHandle::create(StyleSheet::new("state")), scheduler.clone());
        let mut helpers = SheetSink::new(SheetHandle::create(StyleSheet::new("helpers")), scheduler.clone());

        if let Some(transformer) = &transformer {
            user.set_transformer(transformer.clone());
            state.set_transformer(transformer.clone());
        }
        plan_helpers(&config, &mut helpers);
        helpers.render_now();

        let session = Rc::new_cyclic(|this| {
            RefCell::new(SessionState {
                this: this.clone(),
                active: true,
                planner: CascadePlanner::new(config.clone()),
                overlay: OverlayManager::new(&config, RootStyleHandle::new()),
                collapse: CollapseDetector::new(config.clone()),
                config,
                stores: stores.clone(),
                scheduler: scheduler.clone(),
                transformer,
                user,
                state,
                helpers,
                diff: DiffEngine::new(),
                inspector: None,
                presets: PresetStyles::new(),
                warned_states: HashSet::new(),
                last_collapse: None,
                subscriptions: Vec::new(),
            })
        });

        let weak = Rc::downgrade(&session);
        let subscriptions = vec![
            subscribe(&stores.breakpoints, &weak, &scheduler, SessionState::sync_all),
            subscribe(&stores.instances, &weak, &scheduler, SessionState::sync_instances),
            subscribe(&stores.root_instance_id, &weak, &scheduler, SessionState::sync_instances),
            subscribe(&stores.selections, &weak, &scheduler, SessionState::sync_selections),
            subscribe(&stores.declarations, &weak, &scheduler, SessionState::sync_declarations),
            subscribe(&stores.ephemeral, &weak, &scheduler, SessionState::sync_overlay),
            subscribe(&stores.selected_instance, &weak, &scheduler, SessionState::refresh_state_sheet),
            subscribe(&stores.selected_state, &weak, &scheduler, SessionState::refresh_state_sheet),
        ];

        {
            let mut state = session.borrow_mut();
            state.subscriptions = subscriptions;
            let root = (*stores.root_instance_id.get()).clone();
            state.planner.set_root(root);
            state.sync_all();
        }

        abort.on_abort(move || {
            if let Some(session) = weak.upgrade() {
                match session.try_borrow_mut() {
                    Ok(mut state) => state.teardown(),
                    Err(_) => warn!("session: aborted while busy"),
                };
            }
        });

        Self { state: session }
    }

    /// Attaches the render tree. The whole tree is checked for collapsed elements on the next
    /// frame.
    pub fn attach_inspector(&self, inspector: InspectorHandle) {
        let mut state = self.state.borrow_mut();
        state.inspector = Some(inspector);
        state.collapse.mark_all();
        state.schedule_collapse();
    }

    pub fn set_presets(&self, presets: PresetStyles) {
        self.state.borrow_mut().presets = presets;
    }

    /// Swaps the value transformer. Every declaration is written again.
    pub fn set_transformer(&self, transformer: ValueTransformer) {
        let mut state = self.state.borrow_mut();
        state.user.set_transformer(transformer.clone());
        state.state.set_transformer(transformer.clone());
        state.transformer = Some(transformer);
        state.sync_declarations();
    }

    /// Queues elements for the debounced collapse pass
    pub fn request_collapse(&self, ids: impl IntoIterator<Item = InstanceId>) {
        let mut state = self.state.borrow_mut();
        if !state.active {
            return;
        }
        state.collapse.mark_dirty(ids);
        state.schedule_collapse();
    }

    /// States out of `states` the instance's element currently matches
    pub fn active_states(&self, instance: &InstanceId, states: &[String]) -> Vec<String> {
        let mut state = self.state.borrow_mut();
        let Some(inspector) = state.inspector.clone() else {
            return Vec::new();
        };
        let inspector = inspector.borrow();
        active_states(&*inspector, instance, states, &mut state.warned_states)
    }

    /// Runs frames until nothing is pending. Returns the number of frames that ran.
    pub fn flush(&self) -> usize {
        let scheduler = self.state.borrow().scheduler.clone();
        let mut frames = 0;
        while scheduler.get().pending_count() > 0 && frames < MAX_FLUSH_FRAMES {
            scheduler.run_frame();
            frames += 1;
        }
        frames
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn user_sheet(&self) -> SheetHandle {
        self.state.borrow().user.sheet().clone()
    }

    pub fn state_sheet(&self) -> SheetHandle {
        self.state.borrow().state.sheet().clone()
    }

    pub fn helpers_sheet(&self) -> SheetHandle {
        self.state.borrow().helpers.sheet().clone()
    }

    pub fn user_css(&self) -> String {
        self.state.borrow().user.sheet().css_text()
    }

    pub fn state_css(&self) -> String {
        self.state.borrow().state.sheet().css_text()
    }

    pub fn helpers_css(&self) -> String {
        self.state.borrow().helpers.sheet().css_text()
    }

    /// Custom properties currently set on the document root
    pub fn root_css(&self) -> String {
        self.state.borrow().overlay.root_style().css_text()
    }

    pub fn root_property(&self, name: &str) -> Option<String> {
        let state = self.state.borrow();
        let root = state.overlay.root_style().get();
        root.property(name).map(str::to_string)
    }

    /// Mutations applied to the user sheet so far
    pub fn mutations(&self) -> usize {
        self.state.borrow().user.mutations()
    }

    /// Starts recording user sheet mutations
    pub fn record_ops(&self) {
        self.state.borrow_mut().user.record_ops();
    }

    pub fn take_ops(&self) -> Vec<SinkOp> {
        self.state.borrow_mut().user.take_ops()
    }

    pub fn last_collapse_report(&self) -> Option<CollapseReport> {
        self.state.borrow().last_collapse.clone()
    }
}
