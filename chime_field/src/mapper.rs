//! Hand position → quantized pitch/velocity mapping.
//!
//! One mapping per tracked hand per frame: horizontal position picks the
//! semitone, vertical position picks the octave within the handedness's
//! configured range, and depth plus finger spread drive velocity.
//! Exponential smoothing is kept per handedness so left and right hands
//! never contaminate each other's history.

use std::collections::HashMap;

use chime_theory::{note_name, octave};

use crate::config::{HandRange, MapperConfig};
use crate::hand::{landmark_index, HandSample, Handedness};

// ════════════════════════════════════════════════════════════════════════════
// NoteMapping
// ════════════════════════════════════════════════════════════════════════════

/// The musical reading of one hand's position.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteMapping {
    pub midi:       u8,
    pub velocity:   u8,
    pub note_name:  &'static str,
    pub octave:     i8,
    /// Normalised (x, y) the mapping was read from.
    pub position:   [f32; 2],
    /// Tracking-quality heuristic in [0,1].
    pub confidence: f32,
}

// ════════════════════════════════════════════════════════════════════════════
// HandPositionMapper
// ════════════════════════════════════════════════════════════════════════════

/// Maps landmark samples to smoothed [`NoteMapping`]s.
///
/// # Algorithm
///
/// * Palm centre = mean of the five base landmarks; hand extent = the
///   landmarks with minimum and maximum vertical coordinate.
/// * Pitch: `floor(x * 12)` semitone bucket, plus an octave offset from
///   the index fingertip's position within the hand extent, on top of the
///   handedness's base MIDI; clamped to `[start_midi, end_midi]`.
/// * Velocity: depth (closer ⇒ louder) boosted by the mean tip-to-base
///   spread of the five fingers, clamped to the configured range.
/// * Smoothing: EMA against the previous mapping *for that handedness*
///   (`factor` weights the previous value).  Pitch smoothing is skipped
///   when the jump exceeds two semitones so intentional leaps land
///   immediately; velocity is always smoothed.
pub struct HandPositionMapper {
    config: MapperConfig,
    prev:   HashMap<Handedness, (u8, u8)>,
}

impl HandPositionMapper {
    pub fn new(config: MapperConfig) -> Self {
        HandPositionMapper { config, prev: HashMap::new() }
    }

    /// Map one sample.  Absent or incomplete landmarks yield `None`,
    /// never a panic.
    pub fn map(&mut self, sample: &HandSample) -> Option<NoteMapping> {
        if sample.landmarks.is_empty() || sample.is_incomplete() {
            return None;
        }

        let palm = sample.palm_center()?;
        let (min_y, max_y) = sample.vertical_extent()?;
        let tip = sample.landmark(landmark_index::INDEX_TIP)?;
        let range = self.range(sample.handedness);

        // ── pitch ─────────────────────────────────────────────────────────
        let semitone = ((palm[0] * 12.0).floor() as i32).clamp(0, 11);

        let span = (max_y - min_y).max(1e-4);
        // y grows downward; 1.0 = fingertip at the top of the hand extent
        let rel = ((max_y - tip.y) / span).clamp(0.0, 1.0);
        let octaves = range.octaves.max(1) as i32;
        let octave_offset = ((rel * octaves as f32).floor() as i32).min(octaves - 1);

        let lo = range.start_midi.min(range.end_midi) as i32;
        let hi = range.start_midi.max(range.end_midi) as i32;
        let raw_midi =
            (range.start_midi as i32 + octave_offset * 12 + semitone).clamp(lo, hi) as u8;

        // ── velocity ──────────────────────────────────────────────────────
        let closeness = (0.5 - palm[2]).clamp(0.0, 1.0);
        let activity = (sample.finger_spread() * 2.5).clamp(0.0, 1.0);
        let drive = (closeness + 0.5 * activity).clamp(0.0, 1.0);
        let v = self.config.velocity;
        let raw_vel = v.min + (drive * v.max.saturating_sub(v.min) as f32).round() as u8;

        // ── smoothing ─────────────────────────────────────────────────────
        let s = self.config.smoothing_factor.clamp(0.0, 1.0);
        let (midi, velocity) = match self.prev.get(&sample.handedness) {
            Some(&(prev_midi, prev_vel)) => {
                let midi = if (raw_midi as i16 - prev_midi as i16).abs() > 2 {
                    raw_midi
                } else {
                    (s * prev_midi as f32 + (1.0 - s) * raw_midi as f32).round() as u8
                };
                let vel = (s * prev_vel as f32 + (1.0 - s) * raw_vel as f32).round() as u8;
                (midi, vel)
            }
            None => (raw_midi, raw_vel),
        };
        self.prev.insert(sample.handedness, (midi, velocity));

        if midi == range.start_midi || midi == range.end_midi {
            log::debug!("{} hand pinned to range edge {}", sample.handedness.name(), midi);
        }

        Some(NoteMapping {
            midi,
            velocity,
            note_name: note_name(midi),
            octave: octave(midi),
            position: [palm[0], palm[1]],
            confidence: sample.mean_visibility().clamp(0.0, 1.0),
        })
    }

    /// Drop the smoothing history for one handedness (hand lost).
    pub fn reset(&mut self, handedness: Handedness) {
        self.prev.remove(&handedness);
    }

    fn range(&self, handedness: Handedness) -> HandRange {
        match handedness {
            Handedness::Left  => self.config.left,
            Handedness::Right => self.config.right,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{Landmark, LANDMARK_COUNT};

    fn mapper() -> HandPositionMapper {
        HandPositionMapper::new(MapperConfig::default())
    }

    /// A degenerate but complete hand: every landmark at (x, y).
    /// The collapsed extent pins the octave offset to zero, so the pitch
    /// depends only on x.
    fn flat_hand(handedness: Handedness, x: f32, y: f32) -> HandSample {
        HandSample::new(handedness, 0, vec![Landmark::new(x, y); LANDMARK_COUNT])
    }

    #[test]
    fn empty_landmarks_map_to_none() {
        let mut m = mapper();
        let sample = HandSample::new(Handedness::Right, 0, vec![]);
        assert!(m.map(&sample).is_none());
    }

    #[test]
    fn incomplete_landmarks_map_to_none() {
        let mut m = mapper();
        let sample = HandSample::new(
            Handedness::Right,
            0,
            vec![Landmark::new(0.5, 0.5); 10],
        );
        assert!(m.map(&sample).is_none());
    }

    #[test]
    fn midi_stays_in_range_across_the_plane() {
        let mut m = mapper();
        let range = MapperConfig::default().right;
        for xi in 0..=10 {
            for yi in 0..=10 {
                m.reset(Handedness::Right);
                let sample =
                    flat_hand(Handedness::Right, xi as f32 / 10.0, yi as f32 / 10.0);
                let mapping = m.map(&sample).unwrap();
                assert!(mapping.midi >= range.start_midi);
                assert!(mapping.midi <= range.end_midi);
            }
        }
    }

    #[test]
    fn semitone_tracks_horizontal_position() {
        let mut m = mapper();
        let low = m.map(&flat_hand(Handedness::Right, 0.01, 0.5)).unwrap();
        m.reset(Handedness::Right);
        let high = m.map(&flat_hand(Handedness::Right, 0.43, 0.5)).unwrap();
        // floor(0.01*12)=0, floor(0.43*12)=5
        assert_eq!(high.midi - low.midi, 5);
    }

    #[test]
    fn raised_fingertip_lifts_the_octave() {
        let mut m = mapper();
        let mut landmarks = vec![Landmark::new(0.02, 0.8); LANDMARK_COUNT];
        landmarks[landmark_index::INDEX_TIP] = Landmark::new(0.02, 0.2);
        let sample = HandSample::new(Handedness::Right, 0, landmarks);
        let raised = m.map(&sample).unwrap();

        m.reset(Handedness::Right);
        let flat = m.map(&flat_hand(Handedness::Right, 0.02, 0.8)).unwrap();
        assert_eq!(raised.midi - flat.midi, 12);
    }

    #[test]
    fn small_jump_is_smoothed() {
        let mut m = mapper();
        let first = m.map(&flat_hand(Handedness::Right, 0.05, 0.5)).unwrap();
        // One semitone over: raw = first + 1
        let second = m.map(&flat_hand(Handedness::Right, 0.13, 0.5)).unwrap();
        let expected =
            (0.8 * first.midi as f32 + 0.2 * (first.midi + 1) as f32).round() as u8;
        assert_eq!(second.midi, expected);
    }

    #[test]
    fn large_jump_is_immediate() {
        let mut m = mapper();
        m.map(&flat_hand(Handedness::Right, 0.05, 0.5)).unwrap();
        // Ten semitones over: smoothing must be skipped
        let second = m.map(&flat_hand(Handedness::Right, 0.9, 0.5)).unwrap();
        assert_eq!(second.midi, 60 + 10);
    }

    #[test]
    fn velocity_is_always_smoothed() {
        let mut m = mapper();
        let first = m.map(&flat_hand(Handedness::Right, 0.05, 0.5)).unwrap();
        // Same spot, same raw velocity — smoothing converges on it
        let second = m.map(&flat_hand(Handedness::Right, 0.05, 0.5)).unwrap();
        assert_eq!(second.velocity, first.velocity);
    }

    #[test]
    fn velocity_within_configured_range() {
        let mut m = mapper();
        let v = MapperConfig::default().velocity;
        for xi in 0..=10 {
            let sample = flat_hand(Handedness::Right, xi as f32 / 10.0, 0.5);
            let mapping = m.map(&sample).unwrap();
            assert!(mapping.velocity >= v.min && mapping.velocity <= v.max);
        }
    }

    #[test]
    fn hands_smooth_independently() {
        let mut m = mapper();
        m.map(&flat_hand(Handedness::Left, 0.05, 0.5)).unwrap();
        // Right hand's first mapping is raw — left history must not bleed in
        let right = m.map(&flat_hand(Handedness::Right, 0.43, 0.5)).unwrap();
        assert_eq!(right.midi, 60 + 5);
    }

    #[test]
    fn reset_forgets_history() {
        let mut m = mapper();
        m.map(&flat_hand(Handedness::Right, 0.05, 0.5)).unwrap();
        m.reset(Handedness::Right);
        // After reset the next mapping is raw even for a small move
        let next = m.map(&flat_hand(Handedness::Right, 0.13, 0.5)).unwrap();
        assert_eq!(next.midi, 60 + 1);
    }

    #[test]
    fn left_hand_sits_below_right() {
        let mut m = mapper();
        let left  = m.map(&flat_hand(Handedness::Left, 0.05, 0.5)).unwrap();
        let right = m.map(&flat_hand(Handedness::Right, 0.05, 0.5)).unwrap();
        assert!(left.midi < right.midi);
    }
}
