//! Frame-batched writes to one stylesheet. Mutations only change the in-memory rules and
//! (re)schedule a single render under the sheet's frame key; the text is materialized once
//! per frame no matter how many writes happened.

use log::debug;
use stylesync_css::media::Breakpoint;
use stylesync_css::stylesheet::{DeclarationSlot, NestingRuleId, SheetHandle};
use stylesync_css::value::{StyleValue, ValueTransformer};
use stylesync_shared::scheduler::SchedulerHandle;

/// A mutation as seen by the sink. Only recorded when journaling is turned on.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    AddMediaRule(String),
    SetDeclaration {
        mixin: String,
        slot: DeclarationSlot,
    },
    DeleteDeclaration {
        mixin: String,
        slot: DeclarationSlot,
    },
    AddNestingRule(String),
    SetSelector {
        from: String,
        to: String,
    },
    ApplyMixins {
        selector: String,
        mixins: Vec<String>,
    },
    SetTransformer,
    Clear,
}

#[derive(Debug)]
pub struct SheetSink {
    sheet: SheetHandle,
    scheduler: SchedulerHandle,
    render_key: String,
    mutations: usize,
    journal: Option<Vec<SinkOp>>,
}

impl SheetSink {
    pub fn new(sheet: SheetHandle, scheduler: SchedulerHandle) -> Self {
        let render_key = format!("render:{}", sheet.get().name());
        Self {
            sheet,
            scheduler,
            render_key,
            mutations: 0,
            journal: None,
        }
    }

    pub fn sheet(&self) -> &SheetHandle {
        &self.sheet
    }

    pub fn render_key(&self) -> &str {
        &self.render_key
    }

    /// Number of mutations that actually changed the sheet
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Starts (or restarts) recording every mutation
    pub fn record_ops(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Returns the recorded mutations and keeps recording
    pub fn take_ops(&mut self) -> Vec<SinkOp> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn touch(&mut self, op: SinkOp) {
        self.mutations += 1;
        if let Some(journal) = self.journal.as_mut() {
            journal.push(op);
        }
        self.schedule_render();
    }

    pub fn add_media_rule(&mut self, id: &str, breakpoint: &Breakpoint) {
        if self.sheet.get().has_media_rule(id) {
            return;
        }
        self.sheet.get_mut().add_media_rule(id, breakpoint);
        self.touch(SinkOp::AddMediaRule(id.to_string()));
    }

    pub fn set_declaration(&mut self, mixin: &str, slot: DeclarationSlot, value: StyleValue) {
        self.sheet
            .get_mut()
            .add_mixin_rule(mixin)
            .set_declaration(slot.clone(), value);
        self.touch(SinkOp::SetDeclaration {
            mixin: mixin.to_string(),
            slot,
        });
    }

    pub fn delete_declaration(&mut self, mixin: &str, slot: &DeclarationSlot) {
        let removed = self
            .sheet
            .get_mut()
            .mixin_rule_mut(mixin)
            .is_some_and(|rule| rule.delete_declaration(slot));
        if removed {
            self.touch(SinkOp::DeleteDeclaration {
                mixin: mixin.to_string(),
                slot: slot.clone(),
            });
        }
    }

    pub fn add_nesting_rule(&mut self, selector: &str) -> NestingRuleId {
        if let Some(id) = self.sheet.get().find_nesting_rule(selector) {
            return id;
        }
        let id = self.sheet.get_mut().add_nesting_rule(selector);
        self.touch(SinkOp::AddNestingRule(selector.to_string()));
        id
    }

    /// Rewrites a rule's selector. Unchanged text is not a mutation.
    pub fn set_selector(&mut self, id: NestingRuleId, selector: &str) -> bool {
        let from = self.sheet.get().selector(id).map(str::to_string);
        if !self.sheet.get_mut().set_selector(id, selector) {
            return false;
        }
        self.touch(SinkOp::SetSelector {
            from: from.unwrap_or_default(),
            to: selector.to_string(),
        });
        true
    }

    pub fn apply_mixins(&mut self, id: NestingRuleId, mixins: &[String]) {
        let selector = {
            let sheet = self.sheet.get();
            let Some(rule) = sheet.nesting_rule(id) else {
                return;
            };
            if rule.mixins() == mixins {
                return;
            }
            rule.selector().to_string()
        };
        self.sheet.get_mut().apply_mixins(id, mixins);
        self.touch(SinkOp::ApplyMixins {
            selector,
            mixins: mixins.to_vec(),
        });
    }

    /// Appends a mixin unless the rule already applies it
    pub fn add_mixin(&mut self, id: NestingRuleId, mixin: &str) {
        let mixins = {
            let sheet = self.sheet.get();
            let Some(rule) = sheet.nesting_rule(id) else {
                return;
            };
            if rule.mixins().iter().any(|m| m == mixin) {
                return;
            }
            let mut mixins = rule.mixins().to_vec();
            mixins.push(mixin.to_string());
            mixins
        };
        self.apply_mixins(id, &mixins);
    }

    pub fn set_transformer(&mut self, transformer: ValueTransformer) {
        if self.sheet.get().transformer() == Some(&transformer) {
            return;
        }
        self.sheet.get_mut().set_transformer(transformer);
        self.touch(SinkOp::SetTransformer);
    }

    pub fn clear(&mut self) {
        self.sheet.get_mut().clear();
        self.touch(SinkOp::Clear);
    }

    /// Schedules a render for the next frame, replacing a pending one
    pub fn schedule_render(&self) {
        let sheet = self.sheet.clone();
        self.scheduler.schedule_once(&self.render_key, move || {
            sheet.get_mut().render();
        });
    }

    /// Renders right away and drops the pending render
    pub fn render_now(&self) {
        self.cancel_pending();
        debug!("{}: immediate render", self.render_key);
        self.sheet.get_mut().render();
    }

    pub fn cancel_pending(&self) -> bool {
        self.scheduler.cancel(&self.render_key)
    }

    pub fn is_render_pending(&self) -> bool {
        self.scheduler.get().is_scheduled(&self.render_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylesync_css::stylesheet::StyleSheet;

    fn sink() -> (SheetSink, SchedulerHandle) {
        let scheduler = SchedulerHandle::new();
        let sink = SheetSink::new(SheetHandle::create(StyleSheet::new("user")), scheduler.clone());
        (sink, scheduler)
    }

    #[test]
    fn batches_renders_per_frame() {
        let (mut sink, scheduler) = sink();
        sink.add_media_rule("base", &Breakpoint::base("base"));
        sink.set_declaration(
            "s1",
            DeclarationSlot::new("base", "", "color"),
            StyleValue::keyword("red"),
        );
        let rule = sink.add_nesting_rule(".a");
        sink.apply_mixins(rule, &["s1".to_string()]);

        assert_eq!(sink.mutations(), 4);
        assert_eq!(scheduler.get().pending_count(), 1);
        assert_eq!(sink.sheet().get().render_count(), 0);

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(sink.sheet().get().render_count(), 1);
        assert!(sink.sheet().css_text().contains("color: red;"));
    }

    #[test]
    fn idempotent_calls_are_not_mutations() {
        let (mut sink, _) = sink();
        sink.add_media_rule("base", &Breakpoint::base("base"));
        let rule = sink.add_nesting_rule(".a");
        sink.apply_mixins(rule, &["s1".to_string()]);
        let before = sink.mutations();

        sink.add_media_rule("base", &Breakpoint::base("base"));
        assert_eq!(sink.add_nesting_rule(".a"), rule);
        sink.apply_mixins(rule, &["s1".to_string()]);
        sink.add_mixin(rule, "s1");
        assert!(!sink.set_selector(rule, ".a"));
        sink.delete_declaration("s1", &DeclarationSlot::new("base", "", "missing"));

        assert_eq!(sink.mutations(), before);
    }

    #[test]
    fn journal_records_mutations() {
        let (mut sink, _) = sink();
        sink.record_ops();
        let slot = DeclarationSlot::new("base", "", "color");
        sink.set_declaration("s1", slot.clone(), StyleValue::keyword("red"));
        sink.delete_declaration("s1", &slot);

        assert_eq!(
            sink.take_ops(),
            vec![
                SinkOp::SetDeclaration {
                    mixin: "s1".to_string(),
                    slot: slot.clone()
                },
                SinkOp::DeleteDeclaration {
                    mixin: "s1".to_string(),
                    slot
                },
            ]
        );
        assert!(sink.take_ops().is_empty());
    }

    #[test]
    fn render_now_cancels_pending_render() {
        let (mut sink, scheduler) = sink();
        sink.add_media_rule("base", &Breakpoint::base("base"));
        assert!(sink.is_render_pending());

        sink.render_now();
        assert!(!sink.is_render_pending());
        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(sink.sheet().get().render_count(), 1);
    }
}
