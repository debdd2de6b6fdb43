// src/pipeline/jitter.rs
//! Sub-pixel jitter sequence for temporal anti-aliasing.

use glam::Vec2;

const SEQUENCE_LEN: usize = 16;

fn halton(mut index: u32, base: u32) -> f32 {
    let mut f = 1.0f32;
    let mut r = 0.0f32;
    while index > 0 {
        f /= base as f32;
        r += f * (index % base) as f32;
        index /= base;
    }
    r
}

/// 16-entry Halton (2, 3) sequence, each component centered on zero
/// (range -0.5..0.5). The index wraps, so the offsets repeat with period 16.
#[derive(Clone, Debug)]
pub struct JitterSequence {
    offsets: [Vec2; SEQUENCE_LEN],
    index: usize,
}

impl Default for JitterSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSequence {
    pub fn new() -> Self {
        let mut offsets = [Vec2::ZERO; SEQUENCE_LEN];
        for (i, offset) in offsets.iter_mut().enumerate() {
            // Halton indices start at 1; index 0 is degenerate.
            let n = i as u32 + 1;
            *offset = Vec2::new(halton(n, 2) - 0.5, halton(n, 3) - 0.5);
        }
        Self { offsets, index: 0 }
    }

    /// The offset for the current frame, then advance.
    pub fn next(&mut self) -> Vec2 {
        let offset = self.offsets[self.index];
        self.index = (self.index + 1) % SEQUENCE_LEN;
        offset
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_centered() {
        let mut seq = JitterSequence::new();
        for _ in 0..SEQUENCE_LEN {
            let o = seq.next();
            assert!(o.x > -0.5 && o.x < 0.5);
            assert!(o.y > -0.5 && o.y < 0.5);
        }
    }

    #[test]
    fn test_sequence_repeats_with_period_sixteen() {
        let mut seq = JitterSequence::new();
        let first: Vec<Vec2> = (0..SEQUENCE_LEN).map(|_| seq.next()).collect();
        let second: Vec<Vec2> = (0..SEQUENCE_LEN).map(|_| seq.next()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_offsets_are_distinct() {
        let seq = JitterSequence::new();
        for i in 0..SEQUENCE_LEN {
            for j in (i + 1)..SEQUENCE_LEN {
                assert_ne!(seq.offsets[i], seq.offsets[j]);
            }
        }
    }
}
