use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ChordCategory {
    Triads,
    Sevenths,
    Ninths,
    Elevenths,
    Thirteenths,
    Altered,
    Suspended,
}

impl ChordCategory {
    pub const ALL: [ChordCategory; 7] = [
        ChordCategory::Triads,
        ChordCategory::Sevenths,
        ChordCategory::Ninths,
        ChordCategory::Elevenths,
        ChordCategory::Thirteenths,
        ChordCategory::Altered,
        ChordCategory::Suspended,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ChordCategory::Triads => "triads",
            ChordCategory::Sevenths => "sevenths",
            ChordCategory::Ninths => "ninths",
            ChordCategory::Elevenths => "elevenths",
            ChordCategory::Thirteenths => "thirteenths",
            ChordCategory::Altered => "altered",
            ChordCategory::Suspended => "suspended",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ChordCategory::Triads => "Triadi",
            ChordCategory::Sevenths => "Settime",
            ChordCategory::Ninths => "None",
            ChordCategory::Elevenths => "Undicesime",
            ChordCategory::Thirteenths => "Tredicesime",
            ChordCategory::Altered => "Alterati",
            ChordCategory::Suspended => "Sospesi",
        }
    }

    pub fn from_key(key: &str) -> Result<ChordCategory> {
        ChordCategory::ALL
            .into_iter()
            .find(|c| c.key() == key)
            .ok_or_else(|| TrainerError::UnknownCategory(key.to_string()))
    }

    /// Chord types of this category, in catalog order.
    pub fn types(self) -> impl Iterator<Item = ChordType> {
        ChordType::ALL.into_iter().filter(move |t| t.category() == self)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChordType {
    #[serde(rename = "major")]
    Major,
    #[serde(rename = "minor")]
    Minor,
    #[serde(rename = "diminished")]
    Diminished,
    #[serde(rename = "augmented")]
    Augmented,
    #[serde(rename = "maj7")]
    Maj7,
    #[serde(rename = "min7")]
    Min7,
    #[serde(rename = "dom7")]
    Dom7,
    #[serde(rename = "m7b5")]
    HalfDiminished7,
    #[serde(rename = "dim7")]
    Dim7,
    #[serde(rename = "maj9")]
    Maj9,
    #[serde(rename = "min9")]
    Min9,
    #[serde(rename = "dom9")]
    Dom9,
    #[serde(rename = "maj11")]
    Maj11,
    #[serde(rename = "min11")]
    Min11,
    #[serde(rename = "dom11")]
    Dom11,
    #[serde(rename = "maj13")]
    Maj13,
    #[serde(rename = "min13")]
    Min13,
    #[serde(rename = "dom13")]
    Dom13,
    #[serde(rename = "7sharp5")]
    Dom7Sharp5,
    #[serde(rename = "7flat5")]
    Dom7Flat5,
    #[serde(rename = "7sharp9")]
    Dom7Sharp9,
    #[serde(rename = "7flat9")]
    Dom7Flat9,
    #[serde(rename = "sus2")]
    Sus2,
    #[serde(rename = "sus4")]
    Sus4,
    #[serde(rename = "7sus4")]
    Dom7Sus4,
}

impl ChordType {
    pub const ALL: [ChordType; 25] = [
        ChordType::Major,
        ChordType::Minor,
        ChordType::Diminished,
        ChordType::Augmented,
        ChordType::Maj7,
        ChordType::Min7,
        ChordType::Dom7,
        ChordType::HalfDiminished7,
        ChordType::Dim7,
        ChordType::Maj9,
        ChordType::Min9,
        ChordType::Dom9,
        ChordType::Maj11,
        ChordType::Min11,
        ChordType::Dom11,
        ChordType::Maj13,
        ChordType::Min13,
        ChordType::Dom13,
        ChordType::Dom7Sharp5,
        ChordType::Dom7Flat5,
        ChordType::Dom7Sharp9,
        ChordType::Dom7Flat9,
        ChordType::Sus2,
        ChordType::Sus4,
        ChordType::Dom7Sus4,
    ];

    pub fn info(self) -> ChordInfo {
        use ChordCategory::*;
        use ChordType::*;
        match self {
            Major => entry(Triads, self, "major", "Maggiore", &[0, 4, 7]),
            Minor => entry(Triads, self, "minor", "Minore", &[0, 3, 7]),
            Diminished => entry(Triads, self, "diminished", "Diminuito", &[0, 3, 6]),
            Augmented => entry(Triads, self, "augmented", "Aumentato", &[0, 4, 8]),
            Maj7 => entry(Sevenths, self, "maj7", "Maj7", &[0, 4, 7, 11]),
            Min7 => entry(Sevenths, self, "min7", "Min7", &[0, 3, 7, 10]),
            Dom7 => entry(Sevenths, self, "dom7", "7", &[0, 4, 7, 10]),
            HalfDiminished7 => entry(Sevenths, self, "m7b5", "m7b5", &[0, 3, 6, 10]),
            Dim7 => entry(Sevenths, self, "dim7", "Dim7", &[0, 3, 6, 9]),
            Maj9 => entry(Ninths, self, "maj9", "Maj9", &[0, 4, 7, 11, 14]),
            Min9 => entry(Ninths, self, "min9", "Min9", &[0, 3, 7, 10, 14]),
            Dom9 => entry(Ninths, self, "dom9", "9", &[0, 4, 7, 10, 14]),
            Maj11 => entry(Elevenths, self, "maj11", "Maj11", &[0, 4, 7, 11, 14, 17]),
            Min11 => entry(Elevenths, self, "min11", "Min11", &[0, 3, 7, 10, 14, 17]),
            Dom11 => entry(Elevenths, self, "dom11", "11", &[0, 4, 7, 10, 14, 17]),
            Maj13 => entry(Thirteenths, self, "maj13", "Maj13", &[0, 4, 7, 11, 14, 17, 21]),
            Min13 => entry(Thirteenths, self, "min13", "Min13", &[0, 3, 7, 10, 14, 17, 21]),
            Dom13 => entry(Thirteenths, self, "dom13", "13", &[0, 4, 7, 10, 14, 17, 21]),
            Dom7Sharp5 => entry(Altered, self, "7sharp5", "7#5", &[0, 4, 8, 10]),
            Dom7Flat5 => entry(Altered, self, "7flat5", "7b5", &[0, 4, 6, 10]),
            Dom7Sharp9 => entry(Altered, self, "7sharp9", "7#9", &[0, 4, 7, 10, 15]),
            Dom7Flat9 => entry(Altered, self, "7flat9", "7b9", &[0, 4, 7, 10, 13]),
            Sus2 => entry(Suspended, self, "sus2", "Sus2", &[0, 2, 7]),
            Sus4 => entry(Suspended, self, "sus4", "Sus4", &[0, 5, 7]),
            Dom7Sus4 => entry(Suspended, self, "7sus4", "7sus4", &[0, 5, 7, 10]),
        }
    }

    pub fn category(self) -> ChordCategory {
        self.info().category
    }

    pub fn key(self) -> &'static str {
        self.info().key
    }

    pub fn display_name(self) -> &'static str {
        self.info().display_name
    }

    pub fn intervals(self) -> &'static [u8] {
        self.info().intervals
    }

    /// Parse a catalog key. The short chip labels used by the quick-select
    /// bar ("dim", "aug") are accepted too.
    pub fn from_key(key: &str) -> Result<ChordType> {
        let key = match key {
            "dim" => "diminished",
            "aug" => "augmented",
            other => other,
        };
        ChordType::ALL
            .into_iter()
            .find(|t| t.key() == key)
            .ok_or_else(|| TrainerError::UnknownChordType(key.to_string()))
    }

    /// Look up a type within a given category; `None` when the pair is not
    /// in the catalog.
    pub fn lookup(category: ChordCategory, key: &str) -> Option<ChordType> {
        ChordType::from_key(key)
            .ok()
            .filter(|t| t.category() == category)
    }
}

/// One catalog entry. `intervals[0]` is always 0; intervals above 12 are
/// kept as voiced (9ths, 11ths, 13ths).
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChordInfo {
    pub category: ChordCategory,
    pub chord_type: ChordType,
    pub key: &'static str,
    pub display_name: &'static str,
    pub intervals: &'static [u8],
}

const fn entry(
    category: ChordCategory,
    chord_type: ChordType,
    key: &'static str,
    display_name: &'static str,
    intervals: &'static [u8],
) -> ChordInfo {
    ChordInfo {
        category,
        chord_type,
        key,
        display_name,
        intervals,
    }
}

pub fn chord_info(category: ChordCategory, key: &str) -> Option<ChordInfo> {
    ChordType::lookup(category, key).map(ChordType::info)
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub key: String,
    pub name: String,
    pub intervals: Vec<u8>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCategory {
    pub key: String,
    pub name: String,
    pub types: Vec<CatalogEntry>,
}

/// The full chord catalog, grouped by category, for building the selection UI.
pub fn get_catalog() -> Vec<CatalogCategory> {
    ChordCategory::ALL
        .into_iter()
        .map(|category| CatalogCategory {
            key: category.key().to_string(),
            name: category.display_name().to_string(),
            types: category
                .types()
                .map(|t| CatalogEntry {
                    key: t.key().to_string(),
                    name: t.display_name().to_string(),
                    intervals: t.intervals().to_vec(),
                })
                .collect(),
        })
        .collect()
}
