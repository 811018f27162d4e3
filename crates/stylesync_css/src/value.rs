use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// A typed style value as authored in the editor. Values are serialized to css text only when
/// a stylesheet renders, so special kinds (assets) can be resolved late by a
/// [`ValueTransformer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StyleValue {
    Keyword {
        value: String,
    },
    /// A number with unit. The unit `number` renders the bare number.
    Unit {
        value: f64,
        unit: String,
    },
    Rgb {
        r: u8,
        g: u8,
        b: u8,
        alpha: f64,
    },
    /// Reference to an uploaded asset, only renderable through a transformer
    Image {
        asset_id: String,
    },
    /// Custom property reference with optional fallback
    Var {
        value: String,
        fallback: Option<Box<StyleValue>>,
    },
    Unparsed {
        value: String,
    },
    /// Space separated list
    Tuple {
        value: Vec<StyleValue>,
    },
    /// Comma separated list (backgrounds, shadows, transitions)
    Layers {
        value: Vec<StyleValue>,
    },
    /// A value that failed validation. Still rendered so the author sees it.
    Invalid {
        value: String,
    },
}

impl StyleValue {
    pub fn keyword(value: &str) -> Self {
        Self::Keyword {
            value: value.to_string(),
        }
    }

    pub fn unit(value: f64, unit: &str) -> Self {
        Self::Unit {
            value,
            unit: unit.to_string(),
        }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgb { r, g, b, alpha: 1.0 }
    }

    pub fn unparsed(value: &str) -> Self {
        Self::Unparsed {
            value: value.to_string(),
        }
    }

    pub fn var(name: &str, fallback: Option<StyleValue>) -> Self {
        Self::Var {
            value: name.to_string(),
            fallback: fallback.map(Box::new),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// Returns true when this is a length with a fixed unit. Percentages and unitless numbers
    /// depend on the surroundings and do not count.
    pub fn is_fixed_unit(&self) -> bool {
        match self {
            Self::Unit { unit, .. } => unit != "%" && unit != "number",
            _ => false,
        }
    }

    /// Serializes the value to css text. The transformer gets the first say on every value,
    /// including the items of lists and var fallbacks.
    pub fn to_css(&self, transformer: Option<&ValueTransformer>) -> String {
        if let Some(transformed) = transformer.and_then(|t| t.transform(self)) {
            return transformed.to_css(None);
        }

        match self {
            Self::Keyword { value } => value.clone(),
            Self::Unit { value, unit } if unit == "number" => format_number(*value),
            Self::Unit { value, unit } => format!("{}{}", format_number(*value), unit),
            Self::Rgb { r, g, b, alpha } if *alpha >= 1.0 => format!("rgb({r}, {g}, {b})"),
            Self::Rgb { r, g, b, alpha } => {
                format!("rgba({r}, {g}, {b}, {})", format_number(*alpha))
            }
            Self::Image { .. } => "none".to_string(),
            Self::Var { value, fallback } => match fallback {
                Some(fallback) => format!("var({value}, {})", fallback.to_css(transformer)),
                None => format!("var({value})"),
            },
            Self::Unparsed { value } | Self::Invalid { value } => value.clone(),
            Self::Tuple { value } => value.iter().map(|v| v.to_css(transformer)).join(" "),
            Self::Layers { value } => value.iter().map(|v| v.to_css(transformer)).join(", "),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Resolves special value kinds into renderable values. Two transformers are only equal when
/// they share the same function, which is what cached rendering is keyed on: swapping the
/// transformer (even for an identical closure) invalidates everything rendered with the old
/// one.
#[derive(Clone)]
pub struct ValueTransformer(Rc<dyn Fn(&StyleValue) -> Option<StyleValue>>);

impl ValueTransformer {
    pub fn new(f: impl Fn(&StyleValue) -> Option<StyleValue> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Transformer that does not touch any value
    pub fn identity() -> Self {
        Self::new(|_| None)
    }

    /// Resolves `Image` values into `url()`s below `base_url`. Assets maps asset ids to
    /// their stored file names. Unknown assets stay unresolved and render as `none`.
    pub fn assets(base_url: &str, assets: HashMap<String, String>) -> Self {
        let base_url = base_url.to_string();
        Self::new(move |value| match value {
            StyleValue::Image { asset_id } => assets.get(asset_id).map(|name| {
                StyleValue::unparsed(&format!("url(\"{base_url}{name}\")"))
            }),
            _ => None,
        })
    }

    pub fn transform(&self, value: &StyleValue) -> Option<StyleValue> {
        (self.0)(value)
    }
}

impl PartialEq for ValueTransformer {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl Debug for ValueTransformer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValueTransformer({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(StyleValue::keyword("red"), "red")]
    #[test_case(StyleValue::unit(2.0, "px"), "2px")]
    #[test_case(StyleValue::unit(0.5, "em"), "0.5em")]
    #[test_case(StyleValue::unit(3.0, "number"), "3")]
    #[test_case(StyleValue::unit(50.0, "%"), "50%")]
    #[test_case(StyleValue::rgb(0, 0, 255), "rgb(0, 0, 255)")]
    #[test_case(StyleValue::Rgb { r: 1, g: 2, b: 3, alpha: 0.5 }, "rgba(1, 2, 3, 0.5)")]
    #[test_case(StyleValue::var("--s1--color", Some(StyleValue::keyword("blue"))), "var(--s1--color, blue)")]
    #[test_case(StyleValue::var("--a", None), "var(--a)")]
    #[test_case(StyleValue::Image { asset_id: "a1".into() }, "none")]
    #[test_case(StyleValue::Invalid { value: "12pz".into() }, "12pz")]
    fn to_css(value: StyleValue, expected: &str) {
        assert_eq!(value.to_css(None), expected);
    }

    #[test]
    fn lists() {
        let tuple = StyleValue::Tuple {
            value: vec![StyleValue::unit(1.0, "px"), StyleValue::keyword("solid")],
        };
        assert_eq!(tuple.to_css(None), "1px solid");

        let layers = StyleValue::Layers {
            value: vec![StyleValue::keyword("a"), StyleValue::keyword("b")],
        };
        assert_eq!(layers.to_css(None), "a, b");
    }

    #[test]
    fn asset_transformer_resolves_nested_images() {
        let transformer = ValueTransformer::assets(
            "/cdn/",
            HashMap::from([("a1".to_string(), "cat.png".to_string())]),
        );
        let value = StyleValue::Layers {
            value: vec![
                StyleValue::Image {
                    asset_id: "a1".into(),
                },
                StyleValue::Image {
                    asset_id: "missing".into(),
                },
            ],
        };
        assert_eq!(value.to_css(Some(&transformer)), "url(\"/cdn/cat.png\"), none");
    }

    #[test]
    fn transformer_identity() {
        let a = ValueTransformer::identity();
        let b = a.clone();
        let c = ValueTransformer::identity();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fixed_units() {
        assert!(StyleValue::unit(10.0, "px").is_fixed_unit());
        assert!(StyleValue::unit(0.0, "rem").is_fixed_unit());
        assert!(!StyleValue::unit(10.0, "%").is_fixed_unit());
        assert!(!StyleValue::keyword("auto").is_fixed_unit());
    }

    #[test]
    fn deserializes_tagged_values() {
        let value: StyleValue =
            serde_json::from_str(r#"{"type":"unit","value":2,"unit":"px"}"#).unwrap();
        assert_eq!(value, StyleValue::unit(2.0, "px"));
    }
}
