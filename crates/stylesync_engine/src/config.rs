use std::collections::HashSet;
use stylesync_config::config;

/// Settings the engine reads once per session
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Attribute carrying the instance id on rendered elements
    pub id_attribute: String,
    /// Attribute the collapse detector writes
    pub collapsed_attribute: String,
    /// Selector for the root instance
    pub root_selector: String,
    /// Below this amount of dirty ids the collapse detector narrows its scope
    pub scope_threshold: usize,
    /// Padding the helper rules give to collapsed axes
    pub collapse_padding: String,
    /// Tags never classified as collapsed
    pub skipped_tags: HashSet<String>,
    /// Prefix of ephemeral custom properties
    pub property_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_attribute: "data-id".to_string(),
            collapsed_attribute: "data-collapsed".to_string(),
            root_selector: ":root".to_string(),
            scope_threshold: 50,
            collapse_padding: "50px".to_string(),
            skipped_tags: [
                "img", "input", "iframe", "video", "audio", "canvas", "textarea", "select", "svg",
                "embed", "object", "picture", "br", "hr", "wbr", "area", "source", "track",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            property_prefix: "--".to_string(),
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the global config store
    pub fn from_store() -> Self {
        Self {
            id_attribute: config!(string "canvas.id_attribute"),
            collapsed_attribute: config!(string "canvas.collapsed_attribute"),
            root_selector: config!(string "canvas.root_selector"),
            scope_threshold: config!(uint "collapse.scope_threshold"),
            collapse_padding: config!(string "collapse.padding"),
            skipped_tags: config!(map "collapse.skipped_tags")
                .into_iter()
                .map(|tag| tag.to_lowercase())
                .collect(),
            property_prefix: config!(string "overlay.property_prefix"),
        }
    }

    pub fn is_skipped_tag(&self, tag: &str) -> bool {
        self.skipped_tags.contains(&tag.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_defaults_match_default() {
        assert_eq!(EngineConfig::from_store(), EngineConfig::default());
    }
}
