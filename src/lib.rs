use wasm_bindgen::prelude::*;

pub mod clock;
pub mod error;
pub mod exercises;
pub mod gate;
pub mod input;
pub mod scoring;
pub mod settings;
pub mod theory;
pub mod trainer;

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::Serialize;

use error::TrainerError;
use exercises::generators::ExerciseGenerator;
use gate::{Capabilities, Feature, LicenseTier};
use scoring::evaluator::Evaluator;
use scoring::types::EvaluationMode;
use settings::TrainerSettings;
use trainer::Trainer;

thread_local! {
    static GENERATOR: RefCell<Option<ExerciseGenerator>> = RefCell::new(None);
}

fn random_seed() -> u64 {
    let hi = (js_sys::Math::random() * u32::MAX as f64) as u64;
    let lo = (js_sys::Math::random() * u32::MAX as f64) as u64;
    (hi << 32) | lo
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| TrainerError::Serialization(e.to_string()))
        .map_err(js_error)
}

fn js_error(e: TrainerError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Run `f` against the shared generator, creating it on first use.
fn with_generator<T>(f: impl FnOnce(&mut ExerciseGenerator) -> T) -> T {
    GENERATOR.with(|cell| {
        let mut borrow = cell.borrow_mut();
        let generator = borrow.get_or_insert_with(|| ExerciseGenerator::seeded(random_seed()));
        f(generator)
    })
}

/// Chord categories and types, for the selection UI.
#[wasm_bindgen]
pub fn get_catalog() -> Result<JsValue, JsValue> {
    to_js(&exercises::catalog::get_catalog())
}

#[wasm_bindgen]
pub fn get_root_notes() -> Result<JsValue, JsValue> {
    to_js(&theory::ROOT_NOTES)
}

/// "C4" style name for a MIDI note.
#[wasm_bindgen]
pub fn note_name(pitch: u8) -> String {
    theory::midi_to_name(pitch)
}

/// MIDI note for a name such as "F#4" or "Bb3"; `undefined` if unparseable.
#[wasm_bindgen]
pub fn note_from_name(name: &str) -> Option<u8> {
    theory::name_to_midi(name)
}

/// Note names of a catalog chord on `root`, e.g. ("sevenths", "dom7", "G")
/// gives `["G", "B", "D", "F"]`.
#[wasm_bindgen]
pub fn chord_note_names(category: &str, chord_type: &str, root: &str) -> Result<JsValue, JsValue> {
    let category = exercises::catalog::ChordCategory::from_key(category).map_err(js_error)?;
    let info = exercises::catalog::chord_info(category, chord_type)
        .ok_or_else(|| TrainerError::UnknownChordType(chord_type.to_string()))
        .map_err(js_error)?;
    let root = theory::RootNote::from_name(root)
        .ok_or_else(|| TrainerError::UnknownRoot(root.to_string()))
        .map_err(js_error)?;
    to_js(&theory::pitch_classes_to_names(info.intervals, &root))
}

/// `selection` is an object of category key to chord type keys, e.g.
/// `{ triads: ["major", "minor"] }`.
#[wasm_bindgen]
pub fn generate_chord(selection: JsValue, key: Option<String>) -> Result<JsValue, JsValue> {
    let raw: BTreeMap<String, Vec<String>> = serde_wasm_bindgen::from_value(selection)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let selection = settings::parse_chord_selection(&raw);
    let chord = with_generator(|g| g.generate_chord(&selection, key.as_deref())).map_err(js_error)?;
    to_js(&exercises::types::Exercise::Chord(chord))
}

#[wasm_bindgen]
pub fn generate_major_scale(root: &str) -> Result<JsValue, JsValue> {
    let scale = exercises::generators::generate_major_scale(root).map_err(js_error)?;
    to_js(&exercises::types::Exercise::Scale(scale))
}

#[wasm_bindgen]
pub fn generate_melody(root: &str, length: usize, start_with_tonic: bool) -> Result<JsValue, JsValue> {
    let melody =
        with_generator(|g| g.generate_melody(root, length, start_with_tonic)).map_err(js_error)?;
    to_js(&exercises::types::Exercise::Melody(melody))
}

#[wasm_bindgen]
pub fn generate_combined_exercise(
    root: &str,
    melody_length: usize,
    start_with_tonic: bool,
) -> Result<JsValue, JsValue> {
    let combined = with_generator(|g| {
        g.generate_combined_exercise(root, melody_length, start_with_tonic)
    })
    .map_err(js_error)?;
    to_js(&exercises::types::Exercise::Combined(combined))
}

/// Practice session for the page: owns its own generator and evaluator.
/// Verdicts are returned from the input methods rather than pushed to a
/// callback.
#[wasm_bindgen(js_name = Trainer)]
pub struct JsTrainer {
    inner: Trainer,
}

#[wasm_bindgen(js_class = Trainer)]
impl JsTrainer {
    /// `settings_json` is the stored settings blob, if any.
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: Option<String>, premium: bool) -> Result<JsTrainer, JsValue> {
        let settings = match settings_json.as_deref() {
            Some(json) => TrainerSettings::from_json(json).map_err(js_error)?,
            None => TrainerSettings::default(),
        };
        let tier = if premium {
            LicenseTier::Premium
        } else {
            LicenseTier::Free
        };
        Ok(JsTrainer {
            inner: Trainer::new(
                ExerciseGenerator::seeded(random_seed()),
                Evaluator::default(),
                settings,
                tier,
            ),
        })
    }

    pub fn settings(&self) -> Result<String, JsValue> {
        self.inner.settings().to_json().map_err(js_error)
    }

    pub fn set_settings(&mut self, settings_json: &str) -> Result<(), JsValue> {
        let settings = TrainerSettings::from_json(settings_json).map_err(js_error)?;
        self.inner.set_settings(settings);
        Ok(())
    }

    pub fn set_premium(&mut self, premium: bool) {
        self.inner.set_tier(if premium {
            LicenseTier::Premium
        } else {
            LicenseTier::Free
        });
    }

    pub fn start(&mut self) -> Result<JsValue, JsValue> {
        let exercise = self.inner.start().map_err(js_error)?;
        to_js(&exercise)
    }

    pub fn start_chords(&mut self) -> Result<JsValue, JsValue> {
        let exercise = self.inner.start_chords().map_err(js_error)?;
        to_js(&exercise)
    }

    pub fn start_melody(&mut self) -> Result<JsValue, JsValue> {
        let exercise = self.inner.start_melody().map_err(js_error)?;
        to_js(&exercise)
    }

    /// Start a "chord", "melody", "scale" or "combined" exercise regardless
    /// of the stored practice mode.
    pub fn start_mode(&mut self, mode: &str) -> Result<JsValue, JsValue> {
        let mode = EvaluationMode::from_key(mode).map_err(js_error)?;
        let exercise = self.inner.start_in(mode).map_err(js_error)?;
        to_js(&exercise)
    }

    /// `feature` is "advancedChords", "longMelodies" or "statistics".
    pub fn has_feature(&self, feature: JsValue) -> Result<bool, JsValue> {
        let feature: Feature = serde_wasm_bindgen::from_value(feature)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(self.inner.tier().has_feature(feature))
    }

    /// Accuracy of the last answer; `undefined` on the free tier.
    pub fn accuracy(&self) -> Option<f64> {
        self.inner.accuracy()
    }

    /// Restart the current exercise; `null` when there is none.
    pub fn retry(&mut self) -> Result<JsValue, JsValue> {
        match self.inner.retry() {
            Some(exercise) => to_js(&exercise),
            None => Ok(JsValue::NULL),
        }
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn note_on(&mut self, pitch: u8) -> Result<JsValue, JsValue> {
        to_js(&self.inner.note_on(pitch))
    }

    pub fn note_off(&mut self, pitch: u8) {
        self.inner.note_off(pitch);
    }

    /// On-screen keyboard tap.
    pub fn tap(&mut self, pitch: u8) -> Result<JsValue, JsValue> {
        to_js(&self.inner.tap(pitch))
    }

    /// Raw bytes of a Web MIDI `midimessage` event.
    pub fn handle_midi(&mut self, data: &[u8], timestamp_ms: f64) -> Result<JsValue, JsValue> {
        to_js(&self.inner.handle_midi(data, timestamp_ms))
    }

    pub fn check_note(&self, pitch: u8) -> Result<JsValue, JsValue> {
        to_js(&self.inner.evaluator().check_note(pitch))
    }

    pub fn progress(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.progress())
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.inner.evaluator().elapsed_ms()
    }

    pub fn feedback(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.feedback())
    }

    pub fn last_verdict(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.last_verdict())
    }
}
