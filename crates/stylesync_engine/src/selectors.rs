use crate::config::EngineConfig;
use crate::model::{InstanceChild, Instances};
use indexmap::IndexMap;
use stylesync_shared::node::InstanceId;

/// Selector addressing the rendered element of an instance
pub fn instance_selector(config: &EngineConfig, id: &InstanceId, root: Option<&InstanceId>) -> String {
    if root == Some(id) {
        return config.root_selector.clone();
    }
    format!("[{}=\"{}\"]", config.id_attribute, id)
}

/// Maps every descendant marker to the selector its styles apply to: the selector of the
/// instance holding the marker followed by the marker's combinator (` > div`, `::before`).
pub fn descendant_selectors(
    config: &EngineConfig,
    instances: &Instances,
    root: Option<&InstanceId>,
) -> IndexMap<InstanceId, String> {
    let mut selectors = IndexMap::new();

    for parent in instances.values() {
        for child in &parent.children {
            if let InstanceChild::Descendant { value, selector } = child {
                let parent_selector = instance_selector(config, &parent.id, root);
                selectors.insert(value.clone(), format!("{parent_selector}{selector}"));
            }
        }
    }

    selectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Instance;

    #[test]
    fn root_maps_to_root_selector() {
        let config = EngineConfig::default();
        let root = InstanceId::from("root");
        assert_eq!(instance_selector(&config, &root, Some(&root)), ":root");
        assert_eq!(
            instance_selector(&config, &InstanceId::from("box"), Some(&root)),
            "[data-id=\"box\"]"
        );
    }

    #[test]
    fn descendant_marker_uses_parent_selector() {
        let config = EngineConfig::default();
        let mut instances = Instances::new();
        instances.insert(
            InstanceId::from("list"),
            Instance::new("list", "Box").with_children(vec![
                InstanceChild::Id {
                    value: InstanceId::from("item"),
                },
                InstanceChild::Descendant {
                    value: InstanceId::from("marker"),
                    selector: " > li".to_string(),
                },
            ]),
        );

        let selectors = descendant_selectors(&config, &instances, None);
        assert_eq!(selectors.len(), 1);
        assert_eq!(selectors[&InstanceId::from("marker")], "[data-id=\"list\"] > li");
    }
}
