//! Practice flow: one generator, one evaluator, the current settings and the
//! license tier, wired together the way the app drives them.
//!
//! Every wrong key stops the exercise at once. Chord notes (and the chord half
//! of a combined exercise) are judged by pitch-class membership; melody notes
//! must match the cursor exactly.

use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::exercises::generators::ExerciseGenerator;
use crate::exercises::types::Exercise;
use crate::gate::{Capabilities, Feature, LicenseTier};
use crate::input::{HeldNotes, MidiMessage, NoteEvent, NoteSource};
use crate::scoring::evaluator::Evaluator;
use crate::scoring::feedback::{accuracy, generate_feedback, Feedback};
use crate::scoring::types::{EvaluationMode, NoteStatus, Phase, Progress, Verdict};
use crate::settings::{PracticeMode, TrainerSettings};
use crate::theory::{pitch_class_set, Pitch};

/// What happened to one key press.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteOutcome {
    pub status: NoteStatus,
    /// A pointer tap on an already selected chord key deselected it.
    pub released: bool,
    pub verdict: Option<Verdict>,
}

impl NoteOutcome {
    fn neutral() -> Self {
        Self {
            status: NoteStatus::Neutral,
            released: false,
            verdict: None,
        }
    }
}

pub struct Trainer<R: Rng = SmallRng, C: Clock = SystemClock> {
    generator: ExerciseGenerator<R>,
    evaluator: Evaluator<C>,
    settings: TrainerSettings,
    tier: LicenseTier,
    held: HeldNotes,
    exercise: Option<(Rc<Exercise>, EvaluationMode)>,
    last_verdict: Option<Verdict>,
}

impl<R: Rng, C: Clock> Trainer<R, C> {
    pub fn new(
        generator: ExerciseGenerator<R>,
        evaluator: Evaluator<C>,
        settings: TrainerSettings,
        tier: LicenseTier,
    ) -> Self {
        let mut trainer = Self {
            generator,
            evaluator,
            settings,
            tier,
            held: HeldNotes::new(),
            exercise: None,
            last_verdict: None,
        };
        trainer.settings.clamp_to(&trainer.tier);
        trainer
    }

    pub fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    /// Replace the settings, trimmed to what the current tier allows.
    pub fn set_settings(&mut self, mut settings: TrainerSettings) {
        settings.clamp_to(&self.tier);
        self.settings = settings;
    }

    pub fn tier(&self) -> LicenseTier {
        self.tier
    }

    pub fn set_tier(&mut self, tier: LicenseTier) {
        self.tier = tier;
        self.settings.clamp_to(&tier);
    }

    pub fn evaluator(&self) -> &Evaluator<C> {
        &self.evaluator
    }

    pub fn exercise(&self) -> Option<&Rc<Exercise>> {
        self.exercise.as_ref().map(|(exercise, _)| exercise)
    }

    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.last_verdict.as_ref()
    }

    pub fn held_notes(&self) -> &HeldNotes {
        &self.held
    }

    /// Start a new exercise for the current practice mode.
    pub fn start(&mut self) -> Result<Rc<Exercise>> {
        match self.settings.mode {
            PracticeMode::Chords => self.start_chords(),
            PracticeMode::Scales => self.start_melody(),
        }
    }

    /// A melody, or chord + melody when `include_chord` is set.
    pub fn start_melody(&mut self) -> Result<Rc<Exercise>> {
        let mode = if self.settings.include_chord {
            EvaluationMode::Combined
        } else {
            EvaluationMode::Melody
        };
        self.start_in(mode)
    }

    pub fn start_chords(&mut self) -> Result<Rc<Exercise>> {
        self.start_in(EvaluationMode::Chord)
    }

    /// Generate and start an exercise of the given kind, ignoring the
    /// practice mode stored in the settings.
    pub fn start_in(&mut self, mode: EvaluationMode) -> Result<Rc<Exercise>> {
        let root = self.settings.scale_root.clone();
        let length = self.tier.clamp_melody_length(self.settings.melody_length);
        let tonic = self.settings.start_with_tonic;

        let exercise = match mode {
            EvaluationMode::Chord => {
                let selection = self.tier.filter_selection(&self.settings.chord_selection());
                Exercise::Chord(
                    self.generator
                        .generate_chord(&selection, self.settings.chord_key())?,
                )
            }
            EvaluationMode::Scale => Exercise::Scale(self.generator.generate_major_scale(&root)?),
            EvaluationMode::Melody => {
                Exercise::Melody(self.generator.generate_melody(&root, length, tonic)?)
            }
            EvaluationMode::Combined => Exercise::Combined(
                self.generator
                    .generate_combined_exercise(&root, length, tonic)?,
            ),
        };
        Ok(self.begin(exercise))
    }

    /// Start the current exercise over.
    pub fn retry(&mut self) -> Option<Rc<Exercise>> {
        let (exercise, mode) = self.exercise.clone()?;
        self.evaluator.start_exercise(Rc::clone(&exercise), mode);
        self.last_verdict = None;
        self.held.clear();
        Some(exercise)
    }

    fn begin(&mut self, exercise: Exercise) -> Rc<Exercise> {
        let mode = EvaluationMode::for_exercise(&exercise);
        let exercise = Rc::new(exercise);
        self.evaluator.start_exercise(Rc::clone(&exercise), mode);
        self.exercise = Some((Rc::clone(&exercise), mode));
        self.last_verdict = None;
        self.held.clear();
        exercise
    }

    /// Drop the exercise and return to idle.
    pub fn reset(&mut self) {
        self.evaluator.reset();
        self.exercise = None;
        self.last_verdict = None;
        self.held.clear();
    }

    /// The "clear" button: forget the notes played so far.
    pub fn clear(&mut self) {
        self.evaluator.clear_notes();
        self.held.clear();
    }

    pub fn progress(&self) -> Progress {
        self.evaluator.progress()
    }

    pub fn feedback(&self) -> Option<Feedback> {
        self.last_verdict.as_ref().map(generate_feedback)
    }

    /// Share of the exercise's pitch classes the last answer hit, 0-100.
    /// A premium statistic; `None` on the free tier or before a verdict.
    pub fn accuracy(&self) -> Option<f64> {
        if !self.tier.has_feature(Feature::Statistics) {
            return None;
        }
        let verdict = self.last_verdict.as_ref()?;
        let played = pitch_class_set(verdict.user_answer.iter().map(|n| n.pitch_class));
        Some(accuracy(&verdict.exercise.pitch_class_set(), &played))
    }

    /// Feed a raw MIDI message. Only note-on reaches the evaluator; note-off
    /// just releases the key.
    pub fn handle_midi(&mut self, data: &[u8], timestamp_ms: f64) -> NoteOutcome {
        let message = MidiMessage::parse(data);
        self.held.apply(&message);
        match message.note_event(timestamp_ms) {
            Some(event) => self.handle_event(event),
            None => NoteOutcome::neutral(),
        }
    }

    pub fn handle_event(&mut self, event: NoteEvent) -> NoteOutcome {
        match event.source {
            NoteSource::Midi => self.note_on(event.pitch),
            NoteSource::Pointer => self.tap(event.pitch),
        }
    }

    /// On-screen keyboard. While a chord is being built a second tap on the
    /// same key deselects it.
    pub fn tap(&mut self, pitch: Pitch) -> NoteOutcome {
        let selected = self.evaluator.phase() == Some(Phase::Set)
            && self.evaluator.notes().iter().any(|n| n.midi == pitch);
        if selected {
            self.note_off(pitch);
            return NoteOutcome {
                status: NoteStatus::Neutral,
                released: true,
                verdict: None,
            };
        }
        self.note_on(pitch)
    }

    pub fn note_on(&mut self, pitch: Pitch) -> NoteOutcome {
        let Some(phase) = self.evaluator.phase() else {
            return NoteOutcome::neutral();
        };

        let accepted = match phase {
            Phase::Set => self.evaluator.check_note(pitch) == NoteStatus::Correct,
            Phase::Sequence => self.evaluator.try_advance(pitch),
        };

        let verdict = if accepted {
            let verdict = self.evaluator.add_note(pitch);
            if verdict.is_none() && self.evaluator.is_melody_complete() {
                self.evaluator.check_completion()
            } else {
                verdict
            }
        } else {
            debug!(note = pitch, ?phase, "wrong note");
            self.evaluator.reject(pitch)
        };

        if let Some(v) = &verdict {
            self.last_verdict = Some(v.clone());
        }
        NoteOutcome {
            status: if accepted {
                NoteStatus::Correct
            } else {
                NoteStatus::Incorrect
            },
            released: false,
            verdict,
        }
    }

    /// Deselect a chord note. Melody notes stay played.
    pub fn note_off(&mut self, pitch: Pitch) {
        self.evaluator.remove_note(pitch);
    }
}
