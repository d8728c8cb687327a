//! Pass 5: Key Signature Estimation
//!
//! Most frequent pitch class taken as a major tonic. This is a heuristic:
//! no duration weighting and no profile matching.

use crate::analysis::{KeySignature, Pitch};

/// Major key signature for each tonic pitch class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySignatureTable {
    by_pitch_class: [i8; 12],
}

impl Default for KeySignatureTable {
    fn default() -> Self {
        Self {
            //              C  C#  D  Eb  E   F  F#  G  Ab  A  Bb  B
            by_pitch_class: [0, 7, 2, -3, 4, -1, 6, 1, -4, 3, -2, 5],
        }
    }
}

impl KeySignatureTable {
    pub fn lookup(&self, pitch_class: u8) -> KeySignature {
        KeySignature(self.by_pitch_class[(pitch_class % 12) as usize])
    }
}

/// Most frequent pitch class. Ties go to the class that appeared first.
pub fn dominant_pitch_class<I: IntoIterator<Item = Pitch>>(pitches: I) -> Option<u8> {
    let mut counts = [0usize; 12];
    let mut first_seen = [usize::MAX; 12];

    for (i, pitch) in pitches.into_iter().enumerate() {
        let pc = pitch.pitch_class() as usize;
        counts[pc] += 1;
        first_seen[pc] = first_seen[pc].min(i);
    }

    (0..12u8)
        .filter(|&pc| counts[pc as usize] > 0)
        .max_by(|&a, &b| {
            counts[a as usize]
                .cmp(&counts[b as usize])
                .then(first_seen[b as usize].cmp(&first_seen[a as usize]))
        })
}

pub fn run<I: IntoIterator<Item = Pitch>>(pitches: I, table: &KeySignatureTable) -> KeySignature {
    log::info!("Pass 5: Key Signature Estimation");

    let key = match dominant_pitch_class(pitches) {
        Some(pc) => table.lookup(pc),
        None => KeySignature::default(),
    };

    log::info!("  ✓ Estimated key signature: {} ({:+})", key.name(), key.sharps());
    key
}
