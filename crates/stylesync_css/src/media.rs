use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A responsive condition. A breakpoint without min and max width is the unconditional base
/// breakpoint every other breakpoint overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub min_width: Option<u32>,
    #[serde(default)]
    pub max_width: Option<u32>,
}

impl Breakpoint {
    pub fn base(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: "Base".to_string(),
            min_width: None,
            max_width: None,
        }
    }

    pub fn max_width(id: &str, max_width: u32) -> Self {
        Self {
            id: id.to_string(),
            label: format!("{max_width}"),
            min_width: None,
            max_width: Some(max_width),
        }
    }

    pub fn min_width(id: &str, min_width: u32) -> Self {
        Self {
            id: id.to_string(),
            label: format!("{min_width}"),
            min_width: Some(min_width),
            max_width: None,
        }
    }

    pub fn is_base(&self) -> bool {
        self.min_width.is_none() && self.max_width.is_none()
    }

    /// Returns true when the breakpoint applies to a canvas of the given width
    pub fn matches_width(&self, width: f32) -> bool {
        let above_min = self.min_width.is_none_or(|min| width >= min as f32);
        let below_max = self.max_width.is_none_or(|max| width <= max as f32);
        above_min && below_max
    }

    /// Media query text (`all`, `all and (max-width: 991px)`)
    pub fn media_text(&self) -> String {
        let mut text = String::from("all");
        if let Some(min) = self.min_width {
            text.push_str(&format!(" and (min-width: {min}px)"));
        }
        if let Some(max) = self.max_width {
            text.push_str(&format!(" and (max-width: {max}px)"));
        }
        text
    }
}

/// Cascade order of breakpoints: base first, then max-width breakpoints from wide to narrow,
/// then min-width breakpoints from narrow to wide. Later media rules override earlier ones, so
/// this is also the order media rules have to be created in.
pub fn compare_media(a: &Breakpoint, b: &Breakpoint) -> Ordering {
    fn rank(bp: &Breakpoint) -> u8 {
        match (bp.min_width, bp.max_width) {
            (None, None) => 0,
            (_, Some(_)) => 1,
            (Some(_), None) => 2,
        }
    }

    rank(a).cmp(&rank(b)).then_with(|| match (a.max_width, b.max_width) {
        (Some(a_max), Some(b_max)) => b_max.cmp(&a_max),
        _ => a.min_width.unwrap_or(0).cmp(&b.min_width.unwrap_or(0)),
    })
}

/// Returns the breakpoints sorted in cascade order
pub fn sorted_breakpoints<'a>(breakpoints: impl IntoIterator<Item = &'a Breakpoint>) -> Vec<&'a Breakpoint> {
    let mut sorted: Vec<_> = breakpoints.into_iter().collect();
    sorted.sort_by(|a, b| compare_media(a, b));
    sorted
}
