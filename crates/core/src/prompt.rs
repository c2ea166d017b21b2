//! Prompt keys, response formats, and the built-in prompt catalog.
//!
//! The catalog is the canonical vocabulary of prompt keys: every annotation
//! pass is expected to contain one result per [`PromptKey`]. Instruction text
//! is carried through verbatim and never validated.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// PromptKey
// ---------------------------------------------------------------------------

/// All valid prompt key strings, in catalog order.
pub const VALID_PROMPT_KEYS: &[&str] = &[
    "general_description",
    "foreground_background",
    "entities_interactions",
    "mood_emotions",
    "structured_inventory",
];

/// Identifier of one fixed instruction template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKey {
    GeneralDescription,
    ForegroundBackground,
    EntitiesInteractions,
    MoodEmotions,
    StructuredInventory,
}

impl PromptKey {
    /// Every prompt key, in catalog order.
    pub const ALL: [PromptKey; 5] = [
        PromptKey::GeneralDescription,
        PromptKey::ForegroundBackground,
        PromptKey::EntitiesInteractions,
        PromptKey::MoodEmotions,
        PromptKey::StructuredInventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralDescription => "general_description",
            Self::ForegroundBackground => "foreground_background",
            Self::EntitiesInteractions => "entities_interactions",
            Self::MoodEmotions => "mood_emotions",
            Self::StructuredInventory => "structured_inventory",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "general_description" => Ok(Self::GeneralDescription),
            "foreground_background" => Ok(Self::ForegroundBackground),
            "entities_interactions" => Ok(Self::EntitiesInteractions),
            "mood_emotions" => Ok(Self::MoodEmotions),
            "structured_inventory" => Ok(Self::StructuredInventory),
            _ => Err(CoreError::unknown("prompt key", s, VALID_PROMPT_KEYS)),
        }
    }
}

impl std::fmt::Display for PromptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResponseFormat
// ---------------------------------------------------------------------------

/// Whether a response is free text or a JSON document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One instruction template sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDefinition {
    pub key: PromptKey,
    pub instruction_text: String,
    pub expected_format: ResponseFormat,
}

/// Fixed list of prompt definitions, one per [`PromptKey`].
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    definitions: Vec<PromptDefinition>,
}

impl PromptCatalog {
    /// Build a catalog from explicit definitions.
    ///
    /// Every [`PromptKey`] must be defined exactly once.
    pub fn new(definitions: Vec<PromptDefinition>) -> Result<Self, CoreError> {
        for key in PromptKey::ALL {
            let defined = definitions.iter().filter(|d| d.key == key).count();
            if defined != 1 {
                return Err(CoreError::Validation(format!(
                    "prompt catalog must define '{key}' exactly once, found {defined}"
                )));
            }
        }
        Ok(Self { definitions })
    }

    /// The standard five-prompt catalog.
    pub fn standard() -> Self {
        Self {
            definitions: vec![
                PromptDefinition {
                    key: PromptKey::GeneralDescription,
                    instruction_text: GENERAL_DESCRIPTION.to_string(),
                    expected_format: ResponseFormat::Text,
                },
                PromptDefinition {
                    key: PromptKey::ForegroundBackground,
                    instruction_text: FOREGROUND_BACKGROUND.to_string(),
                    expected_format: ResponseFormat::Text,
                },
                PromptDefinition {
                    key: PromptKey::EntitiesInteractions,
                    instruction_text: ENTITIES_INTERACTIONS.to_string(),
                    expected_format: ResponseFormat::Text,
                },
                PromptDefinition {
                    key: PromptKey::MoodEmotions,
                    instruction_text: MOOD_EMOTIONS.to_string(),
                    expected_format: ResponseFormat::Text,
                },
                PromptDefinition {
                    key: PromptKey::StructuredInventory,
                    instruction_text: STRUCTURED_INVENTORY.to_string(),
                    expected_format: ResponseFormat::Json,
                },
            ],
        }
    }

    /// Look up the definition for `key`. Always `Some` for catalogs built
    /// through [`PromptCatalog::new`] or [`PromptCatalog::standard`].
    pub fn get(&self, key: PromptKey) -> Option<&PromptDefinition> {
        self.definitions.iter().find(|d| d.key == key)
    }

    pub fn definitions(&self) -> &[PromptDefinition] {
        &self.definitions
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

const GENERAL_DESCRIPTION: &str = "Provide a detailed description of this image in approximately 150 words. \
Focus on the main subjects or objects, the setting or background, prominent colors, \
the overall mood or atmosphere, and any notable actions or interactions. Describe what \
makes this image distinctive or interesting. Form the response as a continuous paragraph.";

const FOREGROUND_BACKGROUND: &str = "Analyze the spatial organization of this image. Identify and describe what is in \
the foreground (closest to the viewer), middle ground, and background. Explain how \
these layers relate to each other and contribute to the overall composition. \
Maximum 150 words, presented as a continuous paragraph.";

const ENTITIES_INTERACTIONS: &str = "Identify all significant entities (people, animals, objects) in this image and \
describe their interactions or relationships. What are they doing? How do they \
relate to each other spatially or contextually? Include any notable actions, \
gestures, or connections between entities. Maximum 150 words, as a continuous paragraph.";

const MOOD_EMOTIONS: &str = "Describe the mood and emotions conveyed by this image. What feelings does it evoke? \
Consider whether the overall tone is positive, negative, or neutral. Explain what \
visual elements contribute to this emotional atmosphere. Form the response as a \
continuous paragraph. Maximum 200 words.";

const STRUCTURED_INVENTORY: &str = "Analyze this image and create a JSON object documenting all visible items. \
Structure the output with these exact three levels:\n\
Level 1 (Categories): Use only these four keys: 'human', 'animal', 'man-made', 'natural'\n\
Level 2 (Item names): Specific names of detected items (e.g., 'person', 'dog', 'car', 'tree')\n\
Level 3 (Attributes): Use ONLY these keys for each item:\n  \
\u{2022} count: number of instances (integer)\n  \
\u{2022} location: position in image (use terms like: left/center/right, top/middle/bottom, foreground/background)\n  \
\u{2022} color: main color(s) if applicable (array of strings)\n  \
\u{2022} size: relative size (small/medium/large)\n  \
\u{2022} description: any other relevant details that don't fit above categories (string)\n\
Output valid JSON only. Include only categories that contain detected items. \
If an attribute doesn't apply to an item (e.g., color for sky), omit that key \
rather than using null. The 'description' field should capture important \
characteristics like actions, states, or specific features not covered by other keys.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_keys_round_trip() {
        for key in PromptKey::ALL {
            assert_eq!(PromptKey::from_str(key.as_str()).unwrap(), key);
        }
        assert_eq!(PromptKey::ALL.len(), VALID_PROMPT_KEYS.len());
    }

    #[test]
    fn unknown_prompt_key_rejected() {
        assert!(PromptKey::from_str("colour_palette").is_err());
    }

    #[test]
    fn standard_catalog_covers_every_key() {
        let catalog = PromptCatalog::standard();
        for key in PromptKey::ALL {
            assert_eq!(catalog.get(key).unwrap().key, key);
        }
        assert_eq!(
            catalog.get(PromptKey::StructuredInventory).unwrap().expected_format,
            ResponseFormat::Json
        );
        assert_eq!(
            catalog.get(PromptKey::MoodEmotions).unwrap().expected_format,
            ResponseFormat::Text
        );
    }

    #[test]
    fn catalog_rejects_missing_definitions() {
        let partial = PromptCatalog::standard().definitions()[..4].to_vec();
        assert!(PromptCatalog::new(partial).is_err());
    }

    #[test]
    fn catalog_rejects_duplicates() {
        let mut defs = PromptCatalog::standard().definitions().to_vec();
        defs.push(defs[0].clone());
        assert!(PromptCatalog::new(defs).is_err());
    }
}
