//! Turns pasted or typed css text into declarations of a style source.

use crate::model::StyleDeclaration;
use indexmap::IndexMap;
use log::{debug, error};
use std::collections::HashSet;
use stylesync_css::media::Breakpoint;
use stylesync_css::value::StyleValue;
use stylesync_shared::errors::Error;

/// Parses a declaration block (`color: red; margin: 2px`) into typed values
pub trait StyleInputParser {
    fn parse(&self, text: &str) -> IndexMap<String, StyleValue>;
}

/// Knows which properties exist
pub trait PropertyCatalog {
    fn is_known(&self, property: &str) -> bool;
}

impl PropertyCatalog for HashSet<String> {
    fn is_known(&self, property: &str) -> bool {
        self.contains(property)
    }
}

/// Produces base breakpoint declarations for a style source from css text. Without a base
/// breakpoint nothing can be written; the input is dropped and an error is logged.
pub fn import_style_input(
    parser: &dyn StyleInputParser,
    catalog: &dyn PropertyCatalog,
    text: &str,
    style_source_id: &str,
    breakpoints: &[Breakpoint],
) -> Vec<StyleDeclaration> {
    let Some(base) = breakpoints.iter().find(|bp| bp.is_base()) else {
        error!("{}", Error::MissingBaseBreakpoint(style_source_id.to_string()));
        return Vec::new();
    };

    parser
        .parse(text)
        .into_iter()
        .map(|(property, value)| {
            // TODO: unknown properties should become a guaranteed-invalid value instead of a
            // custom property once the value model has one
            let property = if property.starts_with("--") || catalog.is_known(&property) {
                property
            } else {
                debug!("import: unknown property {property}, keeping it as custom property");
                format!("--{property}")
            };
            StyleDeclaration::new(style_source_id, &base.id, None, &property, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainParser;

    impl StyleInputParser for PlainParser {
        fn parse(&self, text: &str) -> IndexMap<String, StyleValue> {
            text.split(';')
                .filter_map(|item| item.split_once(':'))
                .map(|(property, value)| {
                    (
                        property.trim().to_string(),
                        StyleValue::unparsed(value.trim()),
                    )
                })
                .collect()
        }
    }

    fn catalog() -> HashSet<String> {
        ["color", "margin"].into_iter().map(str::to_string).collect()
    }

    #[test]
    fn imports_into_base_breakpoint() {
        let declarations = import_style_input(
            &PlainParser,
            &catalog(),
            "color: red; margin: 2px; tint: blue; --gap: 4px",
            "local",
            &[Breakpoint::max_width("mobile", 479), Breakpoint::base("bp-base")],
        );

        let properties: Vec<&str> = declarations.iter().map(|d| d.property.as_str()).collect();
        assert_eq!(properties, vec!["color", "margin", "--tint", "--gap"]);
        assert!(declarations.iter().all(|d| d.breakpoint_id == "bp-base"));
        assert_eq!(declarations[0].value, StyleValue::unparsed("red"));
    }

    #[test]
    fn missing_base_breakpoint_drops_input() {
        testing_logger::setup();
        let declarations = import_style_input(
            &PlainParser,
            &catalog(),
            "color: red",
            "local",
            &[Breakpoint::max_width("mobile", 479)],
        );

        assert!(declarations.is_empty());
        testing_logger::validate(|logs| {
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].level, log::Level::Error);
            assert!(logs[0].body.contains("no base breakpoint"));
        });
    }
}
