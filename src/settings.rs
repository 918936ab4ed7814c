//! The persisted settings blob.
//!
//! Storage is the host's job; this module only parses and writes the JSON.
//! Form inputs are saved as strings, so numeric fields accept either a JSON
//! number or a numeric string.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::exercises::catalog::{ChordCategory, ChordType};
use crate::exercises::types::ChordSelection;
use crate::gate::Capabilities;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    #[default]
    Chords,
    #[serde(alias = "melody")]
    Scales,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainerSettings {
    pub mode: PracticeMode,
    /// Category key to chord type keys, as stored by the selection UI.
    pub selected_chords: BTreeMap<String, Vec<String>>,
    /// Key constraint for chords; empty means any root.
    pub chord_root: String,
    pub scale_root: String,
    #[serde(deserialize_with = "lenient_usize")]
    pub melody_length: usize,
    pub start_with_tonic: bool,
    pub include_chord: bool,
    pub auto_play: bool,
    pub auto_advance: bool,
    /// Notes per second for melody playback.
    #[serde(deserialize_with = "lenient_f64")]
    pub melody_speed: f64,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            mode: PracticeMode::Chords,
            selected_chords: BTreeMap::from([(
                ChordCategory::Triads.key().to_string(),
                vec![
                    ChordType::Major.key().to_string(),
                    ChordType::Minor.key().to_string(),
                ],
            )]),
            chord_root: String::new(),
            scale_root: "C".to_string(),
            melody_length: 4,
            start_with_tonic: false,
            include_chord: false,
            auto_play: true,
            auto_advance: false,
            melody_speed: 2.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_usize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    let n = lenient_f64(deserializer)?;
    if n.is_finite() && n >= 0.0 {
        Ok(n as usize)
    } else {
        Err(serde::de::Error::custom(format!("invalid length {}", n)))
    }
}

/// Resolve category and type keys into a generator request. Unknown
/// categories and types are skipped with a warning.
pub fn parse_chord_selection(raw: &BTreeMap<String, Vec<String>>) -> ChordSelection {
    let mut selection = ChordSelection::new();
    for (category_key, type_keys) in raw {
        let category = match ChordCategory::from_key(category_key) {
            Ok(category) => category,
            Err(e) => {
                warn!(error = %e, "ignoring chord category");
                continue;
            }
        };
        let types: Vec<ChordType> = type_keys
            .iter()
            .filter_map(|key| {
                let found = ChordType::lookup(category, key);
                if found.is_none() {
                    warn!(category = category_key.as_str(), key = key.as_str(), "ignoring chord type");
                }
                found
            })
            .collect();
        if !types.is_empty() {
            selection.insert(category, types);
        }
    }
    selection
}

impl TrainerSettings {
    pub fn from_json(json: &str) -> Result<TrainerSettings> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn chord_selection(&self) -> ChordSelection {
        parse_chord_selection(&self.selected_chords)
    }

    pub fn chord_key(&self) -> Option<&str> {
        let key = self.chord_root.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Drop what the given tier may not use.
    pub fn clamp_to(&mut self, capabilities: &dyn Capabilities) {
        self.selected_chords.retain(|key, _| {
            ChordCategory::from_key(key)
                .map(|c| capabilities.can_use_chord_category(c))
                .unwrap_or(false)
        });
        self.melody_length = capabilities.clamp_melody_length(self.melody_length);
    }
}
