use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};
use crate::exercises::types::Exercise;
use crate::theory::{Pitch, PitchClass};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    Chord,
    Melody,
    Scale,
    Combined,
}

impl EvaluationMode {
    pub fn key(self) -> &'static str {
        match self {
            EvaluationMode::Chord => "chord",
            EvaluationMode::Melody => "melody",
            EvaluationMode::Scale => "scale",
            EvaluationMode::Combined => "combined",
        }
    }

    pub fn from_key(key: &str) -> Result<EvaluationMode> {
        match key {
            "chord" => Ok(EvaluationMode::Chord),
            "melody" => Ok(EvaluationMode::Melody),
            "scale" => Ok(EvaluationMode::Scale),
            "combined" => Ok(EvaluationMode::Combined),
            other => Err(TrainerError::UnknownMode(other.to_string())),
        }
    }

    /// The mode an exercise is normally evaluated in.
    pub fn for_exercise(exercise: &Exercise) -> EvaluationMode {
        match exercise {
            Exercise::Chord(_) => EvaluationMode::Chord,
            Exercise::Melody(_) => EvaluationMode::Melody,
            Exercise::Scale(_) => EvaluationMode::Scale,
            Exercise::Combined(_) => EvaluationMode::Combined,
        }
    }
}

/// Live answer for a single key press.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Correct,
    Incorrect,
    /// No exercise is being evaluated.
    Neutral,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorState {
    Idle,
    Evaluating,
    Resolved,
}

/// Which check applies to the next note of a session.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Order- and octave-free: chords, scales, the chord half of a combined
    /// exercise.
    Set,
    /// Positional: melodies.
    Sequence,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VerdictReason {
    /// The expected number of notes was played.
    Completed,
    /// The caller rejected a wrong note before the exercise was complete.
    WrongNote,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayedNote {
    pub midi: Pitch,
    pub pitch_class: PitchClass,
    pub name: String,
    pub timestamp_ms: f64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_correct: bool,
    pub reason: VerdictReason,
    pub mode: EvaluationMode,
    pub exercise: Rc<Exercise>,
    /// Every note logged during the session, in arrival order.
    pub user_answer: Vec<PlayedNote>,
    /// Sorted, deduplicated pitch classes of the set-graded notes.
    pub user_pitch_classes: Vec<PitchClass>,
    /// Sorted, deduplicated pitch classes the set-graded part required.
    pub expected_pitch_classes: Vec<PitchClass>,
    /// Exact pitches the sequence-graded part required, in order.
    pub expected_notes: Vec<Pitch>,
    pub time_taken_ms: f64,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub is_active: bool,
    pub mode: Option<EvaluationMode>,
    pub notes_received: usize,
    pub notes_expected: usize,
    /// 0-100
    pub progress: f64,
}
