use std::collections::BTreeSet;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::{Result, TrainerError};
use crate::exercises::catalog::ChordType;
use crate::exercises::types::{
    ChordExercise, ChordSelection, CombinedExercise, MelodyExercise, ScaleExercise,
};
use crate::theory::{RootNote, BASE_OCTAVE, MAJOR_SCALE_INTERVALS, ROOT_NOTES};

/// A (root, chord type) pair the chord generator may pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChordCandidate {
    pub root_pitch_class: u8,
    pub chord_type: ChordType,
}

impl ChordCandidate {
    pub fn root(&self) -> RootNote {
        RootNote::from_pitch_class(self.root_pitch_class)
    }
}

/// Expand a selection into every valid (root, type) pair.
///
/// With a key, only pairs whose notes all belong to the key's major scale
/// survive. Types listed under the wrong category are ignored.
pub fn chord_candidates(selection: &ChordSelection, key: Option<&RootNote>) -> Vec<ChordCandidate> {
    let scale = key.map(|k| k.major_scale_pitch_classes());

    let mut candidates = BTreeSet::new();
    for (&category, types) in selection {
        for &chord_type in types {
            if chord_type.category() != category {
                continue;
            }
            for root in &ROOT_NOTES {
                let fits = match &scale {
                    Some(scale) => chord_type
                        .intervals()
                        .iter()
                        .all(|&i| scale.contains(&((root.pitch_class + i) % 12))),
                    None => true,
                };
                if fits {
                    candidates.insert(ChordCandidate {
                        root_pitch_class: root.pitch_class,
                        chord_type,
                    });
                }
            }
        }
    }
    candidates.into_iter().collect()
}

fn parse_root(name: &str) -> Result<RootNote> {
    RootNote::from_name(name).ok_or_else(|| TrainerError::UnknownRoot(name.to_string()))
}

pub(crate) fn build_chord(root: RootNote, chord_type: ChordType, key_dropped: bool) -> ChordExercise {
    let info = chord_type.info();
    ChordExercise {
        root,
        category: info.category,
        chord_type,
        chord_name: info.display_name.to_string(),
        intervals: info.intervals.to_vec(),
        notes: info
            .intervals
            .iter()
            .map(|&i| BASE_OCTAVE + root.pitch_class + i)
            .collect(),
        pitch_classes: info
            .intervals
            .iter()
            .map(|&i| (root.pitch_class + i) % 12)
            .collect(),
        full_name: format!("{} {}", root.display_name, info.display_name),
        key_dropped,
    }
}

/// The major scale on `root_name`, one octave up from C4. Deterministic.
pub fn generate_major_scale(root_name: &str) -> Result<ScaleExercise> {
    let root = parse_root(root_name)?;
    Ok(ScaleExercise {
        root,
        scale_name: "Scala Maggiore".to_string(),
        notes: MAJOR_SCALE_INTERVALS
            .iter()
            .map(|&i| BASE_OCTAVE + root.pitch_class + i)
            .collect(),
        pitch_classes: root.major_scale_pitch_classes(),
        full_name: format!("Scala di {} Maggiore", root.display_name),
    })
}

/// Random exercise source. Stateless apart from its random number generator.
pub struct ExerciseGenerator<R: Rng = SmallRng> {
    rng: R,
}

impl ExerciseGenerator<SmallRng> {
    /// Reproducible generator: the same seed yields the same exercises.
    pub fn seeded(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ExerciseGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Pick a random chord among the selected types.
    ///
    /// If `key` is given, only chords built entirely from that key's major
    /// scale are eligible. When none are, the key is dropped (logged, and
    /// flagged on the result via `key_dropped`) and every root is allowed.
    pub fn generate_chord(
        &mut self,
        selection: &ChordSelection,
        key: Option<&str>,
    ) -> Result<ChordExercise> {
        let key_root = key.map(parse_root).transpose()?;

        let mut key_dropped = false;
        let mut candidates = chord_candidates(selection, key_root.as_ref());
        if candidates.is_empty() {
            if let Some(key_root) = key_root {
                warn!(
                    key = key_root.name,
                    "no selected chord type is diatonic to the key, ignoring key"
                );
                key_dropped = true;
                candidates = chord_candidates(selection, None);
            }
        }
        if candidates.is_empty() {
            return Err(TrainerError::EmptyRequest);
        }
        debug!(count = candidates.len(), "chord candidates");

        let pick = candidates[self.rng.gen_range(0..candidates.len())];
        let chord = build_chord(pick.root(), pick.chord_type, key_dropped);
        debug!(chord = %chord.full_name, "chord selected");
        Ok(chord)
    }

    pub fn generate_major_scale(&self, root_name: &str) -> Result<ScaleExercise> {
        generate_major_scale(root_name)
    }

    /// Draw `length` notes from the major scale, with replacement. With
    /// `start_with_tonic` the first note is the scale's root.
    pub fn generate_melody(
        &mut self,
        root_name: &str,
        length: usize,
        start_with_tonic: bool,
    ) -> Result<MelodyExercise> {
        if length == 0 {
            return Err(TrainerError::InvalidLength(length));
        }
        let scale = generate_major_scale(root_name)?;

        let notes: Vec<u8> = (0..length)
            .map(|i| {
                if i == 0 && start_with_tonic {
                    scale.notes[0]
                } else {
                    scale.notes[self.rng.gen_range(0..scale.notes.len())]
                }
            })
            .collect();

        let full_name = format!(
            "Melodia in {} Maggiore ({} note){}",
            scale.root.display_name,
            length,
            if start_with_tonic { " [Inizio con Tonica]" } else { "" }
        );
        debug!(melody = ?notes, "melody generated");

        Ok(MelodyExercise {
            scale,
            notes,
            length,
            start_with_tonic,
            full_name,
        })
    }

    /// Tonic major triad followed by a melody in the same key.
    pub fn generate_combined_exercise(
        &mut self,
        root_name: &str,
        melody_length: usize,
        start_with_tonic: bool,
    ) -> Result<CombinedExercise> {
        let root = parse_root(root_name)?;
        let chord = build_chord(root, ChordType::Major, false);
        let melody = self.generate_melody(root_name, melody_length, start_with_tonic)?;

        let full_name = format!(
            "{}: Accordo + Melodia ({} note){}",
            root.display_name,
            melody_length,
            if start_with_tonic { " [Inizio con Tonica]" } else { "" }
        );

        Ok(CombinedExercise {
            chord,
            melody,
            full_name,
        })
    }
}
