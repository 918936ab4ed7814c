//! Note input shared by the hardware MIDI listener and the on-screen
//! keyboard. Both adapters reduce what they receive to a [`NoteEvent`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::theory::Pitch;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteSource {
    Midi,
    Pointer,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub pitch: Pitch,
    pub source: NoteSource,
    pub source_timestamp_ms: f64,
}

/// The parts of a raw MIDI message the trainer cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: Pitch, velocity: u8 },
    /// Includes note-on with velocity 0.
    NoteOff { channel: u8, note: Pitch },
    Other,
}

impl MidiMessage {
    pub fn parse(data: &[u8]) -> MidiMessage {
        let [status, note, velocity, ..] = *data else {
            return MidiMessage::Other;
        };
        let channel = status & 0x0f;
        let note = note & 0x7f;
        match status >> 4 {
            0x9 if velocity > 0 => MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            },
            0x9 | 0x8 => MidiMessage::NoteOff { channel, note },
            _ => MidiMessage::Other,
        }
    }

    pub fn note_event(&self, source_timestamp_ms: f64) -> Option<NoteEvent> {
        match *self {
            MidiMessage::NoteOn { note, .. } => Some(NoteEvent {
                pitch: note,
                source: NoteSource::Midi,
                source_timestamp_ms,
            }),
            _ => None,
        }
    }
}

/// Notes currently held down on an input device.
#[derive(Clone, Debug, Default)]
pub struct HeldNotes {
    notes: BTreeSet<Pitch>,
}

impl HeldNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn { note, .. } => {
                self.notes.insert(note);
            }
            MidiMessage::NoteOff { note, .. } => {
                self.notes.remove(&note);
            }
            MidiMessage::Other => {}
        }
    }

    pub fn is_held(&self, note: Pitch) -> bool {
        self.notes.contains(&note)
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Held notes, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.notes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
