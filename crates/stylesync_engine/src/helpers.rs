use crate::config::EngineConfig;
use crate::inspector::CollapseFlag;
use crate::sink::SheetSink;
use stylesync_css::media::Breakpoint;
use stylesync_css::stylesheet::DeclarationSlot;
use stylesync_css::value::StyleValue;

const HELPERS_MEDIA: &str = "helpers";

/// Writes the static padding rules for collapsed elements. Each flag gets padding on the axis
/// that collapsed, so the element stays selectable.
pub fn plan_helpers(config: &EngineConfig, sink: &mut SheetSink) {
    sink.add_media_rule(HELPERS_MEDIA, &Breakpoint::base(HELPERS_MEDIA));
    let padding = StyleValue::unparsed(&config.collapse_padding);

    for flag in [CollapseFlag::Width, CollapseFlag::Height, CollapseFlag::Both] {
        let mixin = format!("collapsed-{flag}");
        let properties: &[&str] = match flag {
            CollapseFlag::Width => &["padding-right"],
            CollapseFlag::Height => &["padding-bottom"],
            CollapseFlag::Both => &["padding-right", "padding-bottom"],
        };
        for property in properties {
            sink.set_declaration(
                &mixin,
                DeclarationSlot::new(HELPERS_MEDIA, "", property),
                padding.clone(),
            );
        }

        let rule = sink.add_nesting_rule(&format!("[{}=\"{flag}\"]", config.collapsed_attribute));
        sink.apply_mixins(rule, &[mixin]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylesync_css::stylesheet::{SheetHandle, StyleSheet};
    use stylesync_shared::scheduler::SchedulerHandle;

    #[test]
    fn renders_padding_per_axis() {
        let mut sink = SheetSink::new(SheetHandle::create(StyleSheet::new("helpers")), SchedulerHandle::new());
        plan_helpers(&EngineConfig::default(), &mut sink);
        sink.render_now();

        assert_eq!(
            sink.sheet().css_text(),
            "@media all {\n  [data-collapsed=\"w\"] {\n    padding-right: 50px;\n  }\n  \
             [data-collapsed=\"h\"] {\n    padding-bottom: 50px;\n  }\n  \
             [data-collapsed=\"wh\"] {\n    padding-bottom: 50px;\n    padding-right: 50px;\n  }\n}\n"
        );
    }
}
