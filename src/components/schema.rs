//! Editable field descriptions for property inspectors

use serde::{Deserialize, Serialize};

/// How an inspector should present a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f32>,
    },
    Boolean,
    Text,
    Color,
    Vector3,
    AxisLocks,
    NumberList,
    AssetPath,
    /// Bitfield edited as an integer
    Bits,
    Select {
        options: Vec<String>,
    },
}

impl FieldKind {
    /// Unbounded number
    #[must_use]
    pub const fn number() -> Self {
        Self::Number {
            min: None,
            max: None,
        }
    }

    /// Number clamped to `[min, max]`
    #[must_use]
    pub const fn range(min: f32, max: f32) -> Self {
        Self::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Choice between fixed strings
    #[must_use]
    pub fn select(options: &[&str]) -> Self {
        Self::Select {
            options: options.iter().map(ToString::to_string).collect(),
        }
    }
}

/// One editable property of a component type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Property key in the component's `properties` record
    pub name: String,
    pub kind: FieldKind,
    /// Human readable label
    pub label: String,
}

impl FieldSpec {
    /// Create a field; the label defaults to the name
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label: label_from_name(&name),
            name,
            kind,
        }
    }

    /// Override the label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// `emissiveIntensity` -> `Emissive Intensity`
fn label_from_name(name: &str) -> String {
    let mut label = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            label.push(' ');
            label.push(c);
        } else {
            label.push(c);
        }
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_name() {
        assert_eq!(FieldSpec::new("emissiveIntensity", FieldKind::number()).label, "Emissive Intensity");
        assert_eq!(FieldSpec::new("color", FieldKind::Color).label, "Color");
        assert_eq!(FieldSpec::new("x", FieldKind::Text).with_label("Name").label, "Name");
    }

    #[test]
    fn test_field_serializes_for_inspectors() {
        let field = FieldSpec::new("type", FieldKind::select(&["box", "sphere"]));
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value["kind"]["kind"], "select");
        assert_eq!(value["kind"]["options"][1], "sphere");

        let value = serde_json::to_value(FieldKind::range(0.0, 1.0)).unwrap();
        assert_eq!(value["kind"], "number");
        assert_eq!(value["max"], 1.0);
    }
}
