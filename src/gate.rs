//! Feature gating. Callers consult a [`Capabilities`] before building a
//! request; the generator and evaluator know nothing about licensing.

use serde::{Deserialize, Serialize};

use crate::exercises::catalog::ChordCategory;
use crate::exercises::types::ChordSelection;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    AdvancedChords,
    LongMelodies,
    Statistics,
}

pub trait Capabilities {
    fn has_feature(&self, feature: Feature) -> bool;
    fn can_use_chord_category(&self, category: ChordCategory) -> bool;
    fn max_melody_length(&self) -> usize;

    /// Drop every category this tier may not request.
    fn filter_selection(&self, selection: &ChordSelection) -> ChordSelection {
        selection
            .iter()
            .filter(|(category, _)| self.can_use_chord_category(**category))
            .map(|(category, types)| (*category, types.clone()))
            .collect()
    }

    fn clamp_melody_length(&self, length: usize) -> usize {
        length.min(self.max_melody_length())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LicenseTier {
    #[default]
    Free,
    Premium,
}

const FREE_MAX_MELODY_LENGTH: usize = 4;
const PREMIUM_MAX_MELODY_LENGTH: usize = 8;

impl Capabilities for LicenseTier {
    fn has_feature(&self, _feature: Feature) -> bool {
        *self == LicenseTier::Premium
    }

    fn can_use_chord_category(&self, category: ChordCategory) -> bool {
        match self {
            LicenseTier::Premium => true,
            LicenseTier::Free => category == ChordCategory::Triads,
        }
    }

    fn max_melody_length(&self) -> usize {
        match self {
            LicenseTier::Free => FREE_MAX_MELODY_LENGTH,
            LicenseTier::Premium => PREMIUM_MAX_MELODY_LENGTH,
        }
    }
}
