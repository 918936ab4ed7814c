use std::collections::BTreeMap;

use serde::Serialize;

use crate::exercises::catalog::{ChordCategory, ChordType};
use crate::theory::{pitch_class_set, Pitch, PitchClass, RootNote};

/// Chord types the user has ticked, grouped by category.
pub type ChordSelection = BTreeMap<ChordCategory, Vec<ChordType>>;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChordExercise {
    pub root: RootNote,
    pub category: ChordCategory,
    pub chord_type: ChordType,
    /// Catalog display name of the quality, e.g. "Maj7".
    pub chord_name: String,
    pub intervals: Vec<u8>,
    /// Voicing in playback order. Not deduplicated.
    pub notes: Vec<Pitch>,
    /// `(root + interval) % 12` per interval, in interval order. May repeat
    /// for extensions that wrap the octave.
    pub pitch_classes: Vec<PitchClass>,
    pub full_name: String,
    /// Set when a key was requested but no chord of the selected types fit
    /// it, so the chord was drawn from all roots instead.
    pub key_dropped: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScaleExercise {
    pub root: RootNote,
    pub scale_name: String,
    pub notes: Vec<Pitch>,
    pub pitch_classes: Vec<PitchClass>,
    pub full_name: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MelodyExercise {
    pub scale: ScaleExercise,
    /// Performance order; position matters.
    pub notes: Vec<Pitch>,
    pub length: usize,
    pub start_with_tonic: bool,
    pub full_name: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CombinedExercise {
    pub chord: ChordExercise,
    pub melody: MelodyExercise,
    pub full_name: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Exercise {
    Chord(ChordExercise),
    Melody(MelodyExercise),
    Scale(ScaleExercise),
    Combined(CombinedExercise),
}

impl Exercise {
    pub fn full_name(&self) -> &str {
        match self {
            Exercise::Chord(c) => &c.full_name,
            Exercise::Melody(m) => &m.full_name,
            Exercise::Scale(s) => &s.full_name,
            Exercise::Combined(c) => &c.full_name,
        }
    }

    /// Notes in playback order. A combined exercise plays its chord first,
    /// then the melody.
    pub fn playback_notes(&self) -> Vec<Pitch> {
        match self {
            Exercise::Chord(c) => c.notes.clone(),
            Exercise::Melody(m) => m.notes.clone(),
            Exercise::Scale(s) => s.notes.clone(),
            Exercise::Combined(c) => c.chord.notes.iter().chain(&c.melody.notes).copied().collect(),
        }
    }

    /// Deduplicated, sorted pitch classes the exercise is made of.
    pub fn pitch_class_set(&self) -> Vec<PitchClass> {
        match self {
            Exercise::Chord(c) => pitch_class_set(c.pitch_classes.iter().copied()),
            Exercise::Melody(m) => pitch_class_set(m.notes.iter().copied()),
            Exercise::Scale(s) => pitch_class_set(s.pitch_classes.iter().copied()),
            Exercise::Combined(c) => pitch_class_set(
                c.chord
                    .pitch_classes
                    .iter()
                    .copied()
                    .chain(c.melody.notes.iter().copied()),
            ),
        }
    }

    pub fn root(&self) -> RootNote {
        match self {
            Exercise::Chord(c) => c.root,
            Exercise::Melody(m) => m.scale.root,
            Exercise::Scale(s) => s.root,
            Exercise::Combined(c) => c.chord.root,
        }
    }
}
