//! Structured-inventory schema validation.
//!
//! The `structured_inventory` prompt asks for a three-level JSON object:
//!
//! 1. category: one of `human`, `animal`, `man-made`, `natural`
//! 2. item name: free-form
//! 3. attributes: a subset of `count`, `location`, `color`, `size`, `description`
//!
//! Validation is closed over levels 1 and 3 and type-checks `count` (integer)
//! and `color` (array). All violations are collected; nothing short-circuits
//! except a non-object root.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// Level-1 category of the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InventoryCategory {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "animal")]
    Animal,
    #[serde(rename = "man-made")]
    ManMade,
    #[serde(rename = "natural")]
    Natural,
}

impl InventoryCategory {
    pub const ALL: [InventoryCategory; 4] = [
        InventoryCategory::Human,
        InventoryCategory::Animal,
        InventoryCategory::ManMade,
        InventoryCategory::Natural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Animal => "animal",
            Self::ManMade => "man-made",
            Self::Natural => "natural",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Level-3 attribute key of an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryAttribute {
    Count,
    Location,
    Color,
    Size,
    Description,
}

impl InventoryAttribute {
    pub const ALL: [InventoryAttribute; 5] = [
        InventoryAttribute::Count,
        InventoryAttribute::Location,
        InventoryAttribute::Color,
        InventoryAttribute::Size,
        InventoryAttribute::Description,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Location => "location",
            Self::Color => "color",
            Self::Size => "size",
            Self::Description => "description",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// One schema violation. `path` is dotted (`human.person.count`), empty for
/// the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Render a set of keys as `{"a", "b"}`, sorted.
fn format_key_set(keys: &BTreeSet<&str>) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("{k:?}")).collect();
    format!("{{{}}}", quoted.join(", "))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed `structured_inventory` response. Empty result = valid.
pub fn validate_structured_inventory_schema(data: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    let Some(root) = data.as_object() else {
        violations.push(SchemaViolation::new("", "Root is not an object"));
        return violations;
    };

    let invalid_categories: BTreeSet<&str> = root
        .keys()
        .map(String::as_str)
        .filter(|k| InventoryCategory::parse(k).is_none())
        .collect();
    if !invalid_categories.is_empty() {
        violations.push(SchemaViolation::new(
            "",
            format!(
                "Invalid level-1 categories: {}",
                format_key_set(&invalid_categories)
            ),
        ));
    }

    for (category, items) in root {
        let Some(items) = items.as_object() else {
            violations.push(SchemaViolation::new(
                category.as_str(),
                format!("Category '{category}' should contain an object of items"),
            ));
            continue;
        };

        for (item_name, attributes) in items {
            let item_path = format!("{category}.{item_name}");
            let Some(attributes) = attributes.as_object() else {
                violations.push(SchemaViolation::new(
                    item_path.as_str(),
                    format!("Item '{item_path}' should have object attributes"),
                ));
                continue;
            };

            let invalid_attrs: BTreeSet<&str> = attributes
                .keys()
                .map(String::as_str)
                .filter(|k| InventoryAttribute::parse(k).is_none())
                .collect();
            if !invalid_attrs.is_empty() {
                violations.push(SchemaViolation::new(
                    item_path.as_str(),
                    format!(
                        "Item '{item_path}' has invalid attributes: {}",
                        format_key_set(&invalid_attrs)
                    ),
                ));
            }

            if let Some(count) = attributes.get(InventoryAttribute::Count.as_str()) {
                if !is_integer(count) {
                    let path = format!("{item_path}.count");
                    violations.push(SchemaViolation::new(
                        path.as_str(),
                        format!("Item '{path}' should be integer"),
                    ));
                }
            }

            if let Some(color) = attributes.get(InventoryAttribute::Color.as_str()) {
                if !color.is_array() {
                    let path = format!("{item_path}.color");
                    violations.push(SchemaViolation::new(
                        path.as_str(),
                        format!("Item '{path}' should be array"),
                    ));
                }
            }
        }
    }

    violations
}

/// Integral JSON number. Floats (even `2.0`), strings and booleans fail.
fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

/// Convenience wrapper returning only the messages.
pub fn schema_error_messages(data: &Value) -> Vec<String> {
    validate_structured_inventory_schema(data)
        .into_iter()
        .map(|v| v.message)
        .collect()
}
