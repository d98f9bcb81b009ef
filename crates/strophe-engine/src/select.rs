//! Deterministic A/B micro-context scoring
//!
//! Fewer taboo entries in a pack scores higher; lexicon coverage scores
//! higher up to a cap. Ties always resolve to A — never random.

use strophe_core::{AbLabel, MicroPack};

const LEXICON_CAP: usize = 8;

/// Score one variant's retrieved-context shape
pub fn score(pack: &MicroPack) -> f32 {
    let taboo_room = (10_i64 - pack.taboo.len() as i64).max(0) as f32 * 0.1;
    let coverage = pack.lexicon.len().min(LEXICON_CAP) as f32 * 0.05;
    taboo_room + coverage
}

/// Pick the better variant; A wins ties
pub fn choose(a: &MicroPack, b: &MicroPack) -> AbLabel {
    if score(a) >= score(b) {
        AbLabel::A
    } else {
        AbLabel::B
    }
}
