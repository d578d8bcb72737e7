//! Per-tick orchestration.
//!
//! One [`Pipeline::tick`] call runs the whole gesture-to-music pass in
//! dependency order — mapping, collision detection, object lifecycle,
//! theory analysis — using a single timestamp sampled once at tick start.
//! Cooldown checks and state-duration checks therefore can never skew
//! within a pass.
//!
//! The object collection stays owned by the caller; the pipeline writes
//! back only `state`, `state_since_ms`, and `last_interaction_ms`.

use std::collections::{HashMap, HashSet};

use chime_theory::{AnalysisSnapshot, Recognizer};

use crate::clock::Clock;
use crate::collide::{CollisionDetector, HandTickState};
use crate::config::FieldConfig;
use crate::hand::{HandSample, Handedness};
use crate::mapper::{HandPositionMapper, NoteMapping};
use crate::object::{
    InteractiveObject, NoteEvent, ObjectEvent, ObjectLifecycle, ObjectState,
};

// ════════════════════════════════════════════════════════════════════════════
// TickReport
// ════════════════════════════════════════════════════════════════════════════

/// Everything one tick produced, for the host to dispatch.
#[derive(Debug)]
pub struct TickReport {
    pub timestamp_ms: u64,
    /// One mapping per hand that yielded one.
    pub mappings:     Vec<NoteMapping>,
    /// All lifecycle events in emission order.
    pub events:       Vec<ObjectEvent>,
    /// The note triggers extracted from `events`, for the audio sink.
    pub notes:        Vec<NoteEvent>,
    pub hand_states:  Vec<HandTickState>,
    /// Glow-intensity target per object id, for the renderer.
    pub glows:        Vec<(u32, f32)>,
    /// Theory analysis of the sounding note set; absent while silent.
    pub snapshot:     Option<AnalysisSnapshot>,
}

// ════════════════════════════════════════════════════════════════════════════
// Pipeline
// ════════════════════════════════════════════════════════════════════════════

/// Owns the per-frame components and the sounding-note set.
pub struct Pipeline {
    mapper:     HandPositionMapper,
    detector:   CollisionDetector,
    lifecycle:  ObjectLifecycle,
    recognizer: Recognizer,
    clock:      Box<dyn Clock>,
    sustain_ms: u64,
    /// Triggered notes still counted as sounding: (midi, triggered_at).
    sounding:   Vec<(u8, u64)>,
}

impl Pipeline {
    pub fn new(config: &FieldConfig, clock: Box<dyn Clock>) -> Self {
        Pipeline {
            mapper:     HandPositionMapper::new(config.mapper.clone()),
            detector:   CollisionDetector::new(config.detector.clone()),
            lifecycle:  ObjectLifecycle::new(config.lifecycle.clone()),
            recognizer: Recognizer::new(config.recognizer.to_theory()),
            clock,
            sustain_ms: config.recognizer.sustain_ms,
            sounding:   Vec::new(),
        }
    }

    /// Run one full pass over the current hands and object field.
    pub fn tick(
        &mut self,
        hands: &[HandSample],
        objects: &mut [InteractiveObject],
    ) -> TickReport {
        let now = self.clock.now_ms();

        // ── 1. pitch/velocity mapping ─────────────────────────────────────
        let mut seen_left = false;
        let mut seen_right = false;
        let mut mappings = Vec::new();
        for sample in hands {
            match sample.handedness {
                Handedness::Left  => seen_left = true,
                Handedness::Right => seen_right = true,
            }
            if let Some(mapping) = self.mapper.map(sample) {
                mappings.push(mapping);
            }
        }
        // A lost hand must not smooth against its stale history later.
        if !seen_left {
            self.mapper.reset(Handedness::Left);
        }
        if !seen_right {
            self.mapper.reset(Handedness::Right);
        }

        // ── 2. collision / proximity detection ────────────────────────────
        let detections = self.detector.detect(hands, objects, now);

        // ── 3. object lifecycle ───────────────────────────────────────────
        let index_of: HashMap<u32, usize> = objects
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id, i))
            .collect();
        let mut events = Vec::new();

        for collision in &detections.collisions {
            if let Some(&i) = index_of.get(&collision.object_id) {
                let hand = hands.get(collision.hand_index);
                events.extend(self.lifecycle.on_collision(&mut objects[i], hand, now));
            }
        }

        let near: HashSet<u32> =
            detections.proximity.iter().map(|p| p.object_id).collect();
        for proximity in &detections.proximity {
            if let Some(&i) = index_of.get(&proximity.object_id) {
                events.extend(self.lifecycle.on_proximity(&mut objects[i], now));
            }
        }
        for obj in objects.iter_mut() {
            if obj.state == ObjectState::Approaching && !near.contains(&obj.id) {
                events.extend(self.lifecycle.on_proximity_lost(obj, now));
            }
        }

        for obj in objects.iter_mut() {
            events.extend(self.lifecycle.advance(obj, now));
        }

        // ── 4. theory analysis over the sounding set ──────────────────────
        let notes: Vec<NoteEvent> = events
            .iter()
            .filter_map(|e| match e {
                ObjectEvent::Note(n) => Some(*n),
                _ => None,
            })
            .collect();
        for note in &notes {
            self.sounding.push((note.midi, note.timestamp_ms));
        }
        self.sounding
            .retain(|&(_, t)| now.saturating_sub(t) < self.sustain_ms);

        let snapshot = if self.sounding.is_empty() {
            None
        } else {
            let pitches: Vec<u8> = self.sounding.iter().map(|&(m, _)| m).collect();
            Some(self.recognizer.analyze(&pitches, now))
        };

        let glows = objects
            .iter()
            .map(|o| (o.id, self.lifecycle.glow_target(o, now)))
            .collect();

        TickReport {
            timestamp_ms: now,
            mappings,
            events,
            notes,
            hand_states: detections.hand_states,
            glows,
            snapshot,
        }
    }

    /// Notes currently counted as sounding.
    pub fn sounding_notes(&self) -> Vec<u8> {
        self.sounding.iter().map(|&(m, _)| m).collect()
    }

    /// Distinct patterns discovered so far this session.
    pub fn discovery_count(&self) -> usize {
        self.recognizer.discovery_count()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use chime_theory::{ChordKind, DiscoveryKind};

    use crate::clock::ManualClock;
    use crate::hand::interaction_points;
    use crate::source::synth_hand;

    fn pipeline() -> (Pipeline, ManualClock) {
        let clock = ManualClock::new();
        let p = Pipeline::new(&FieldConfig::default(), Box::new(clock.clone()));
        (p, clock)
    }

    fn hand() -> HandSample {
        synth_hand(Handedness::Right, 0.5, 0.5, 0.0, 0)
    }

    fn point_position(name: &str) -> [f32; 3] {
        interaction_points(&hand())
            .iter()
            .find(|p| p.name == name)
            .unwrap()
            .position
    }

    #[test]
    fn touch_triggers_note_state_and_analysis() {
        let (mut p, _clock) = pipeline();
        let mut field = vec![InteractiveObject::new(1, point_position("palm"), 60)];

        let report = p.tick(&[hand()], &mut field);
        assert_eq!(report.notes.len(), 1);
        assert_eq!(report.notes[0].midi, 60);
        // Zero hold: Touched → Playing within the same tick
        assert_eq!(field[0].state, ObjectState::Playing);

        let snap = report.snapshot.unwrap();
        assert_eq!(snap.active_notes, vec![60]);
    }

    #[test]
    fn all_events_share_the_tick_timestamp() {
        let (mut p, clock) = pipeline();
        clock.set(777);
        let mut field = vec![InteractiveObject::new(1, point_position("palm"), 60)];
        let report = p.tick(&[hand()], &mut field);
        assert_eq!(report.timestamp_ms, 777);
        for note in &report.notes {
            assert_eq!(note.timestamp_ms, 777);
        }
    }

    #[test]
    fn cooldown_suppresses_the_second_touch() {
        let (mut p, clock) = pipeline();
        let mut field =
            vec![InteractiveObject::new(1, point_position("palm"), 60).cooldown(5000)];

        let first = p.tick(&[hand()], &mut field);
        assert_eq!(first.notes.len(), 1);

        clock.set(1700); // object is fading but still inside its cooldown
        let second = p.tick(&[hand()], &mut field);
        assert!(second.notes.is_empty());
    }

    #[test]
    fn proximity_walks_the_object_to_approaching_and_back() {
        let (mut p, clock) = pipeline();
        let palm = point_position("palm");
        // 0.12 beside the palm point: outside every collision shell,
        // inside the 0.15 proximity radius
        let mut field = vec![
            InteractiveObject::new(1, [palm[0] + 0.12, palm[1], 0.0], 60).radius(0.02),
        ];

        p.tick(&[hand()], &mut field);
        assert_eq!(field[0].state, ObjectState::Approaching);

        clock.advance(33);
        let far = synth_hand(Handedness::Right, 0.05, 0.9, 0.0, 33);
        p.tick(&[far], &mut field);
        assert_eq!(field[0].state, ObjectState::Idle);
    }

    #[test]
    fn lifecycle_progresses_on_silent_ticks() {
        let (mut p, clock) = pipeline();
        let mut field = vec![InteractiveObject::new(1, point_position("palm"), 60)];

        p.tick(&[hand()], &mut field);
        assert_eq!(field[0].state, ObjectState::Playing);

        clock.set(600);
        p.tick(&[], &mut field);
        assert_eq!(field[0].state, ObjectState::Fading);

        clock.set(1700);
        p.tick(&[], &mut field);
        assert_eq!(field[0].state, ObjectState::Idle);
    }

    #[test]
    fn triad_touch_discovers_a_chord() {
        let (mut p, _clock) = pipeline();
        let mut field = vec![
            InteractiveObject::new(1, point_position("palm"), 60),
            InteractiveObject::new(2, point_position("index_tip"), 64),
            InteractiveObject::new(3, point_position("wrist"), 67),
        ];

        let report = p.tick(&[hand()], &mut field);
        assert_eq!(report.notes.len(), 3);

        let snap = report.snapshot.unwrap();
        assert_eq!(snap.chord.unwrap().kind, ChordKind::Major);
        assert!(snap
            .discoveries
            .iter()
            .any(|d| d.kind == DiscoveryKind::Chord && d.subtype == "major"));
        assert!(p.discovery_count() > 0);
    }

    #[test]
    fn sounding_notes_expire_after_sustain() {
        let (mut p, clock) = pipeline();
        let mut field = vec![InteractiveObject::new(1, point_position("palm"), 60)];

        p.tick(&[hand()], &mut field);
        assert_eq!(p.sounding_notes(), vec![60]);

        clock.set(2000); // past the 1500 ms sustain
        let report = p.tick(&[], &mut field);
        assert!(p.sounding_notes().is_empty());
        assert!(report.snapshot.is_none());
    }

    #[test]
    fn glow_targets_cover_every_object() {
        let (mut p, _clock) = pipeline();
        let mut field = vec![
            InteractiveObject::new(1, point_position("palm"), 60),
            InteractiveObject::new(2, [0.1, 0.1, 0.0], 64),
        ];
        let report = p.tick(&[hand()], &mut field);
        assert_eq!(report.glows.len(), 2);
        // Touched object glows, far object rests dark
        let glow_of = |id: u32| {
            report.glows.iter().find(|(g, _)| *g == id).unwrap().1
        };
        assert!(glow_of(1) > 0.9);
        assert_eq!(glow_of(2), 0.0);
    }

    #[test]
    fn hand_loss_resets_smoothing() {
        let (mut p, clock) = pipeline();
        let mut field: Vec<InteractiveObject> = Vec::new();

        let near = synth_hand(Handedness::Right, 0.05, 0.5, 0.0, 0);
        let report = p.tick(&[near], &mut field);
        let first = report.mappings[0].midi;

        clock.advance(33);
        p.tick(&[], &mut field); // hand lost — history dropped

        clock.advance(33);
        let moved = synth_hand(Handedness::Right, 0.13, 0.5, 0.0, 66);
        let report = p.tick(&[moved], &mut field);
        // Raw mapping, one semitone over — no smoothing against history
        assert_eq!(report.mappings[0].midi, first + 1);
    }

    #[test]
    fn empty_tick_is_harmless() {
        let (mut p, _clock) = pipeline();
        let mut field: Vec<InteractiveObject> = Vec::new();
        let report = p.tick(&[], &mut field);
        assert!(report.mappings.is_empty());
        assert!(report.events.is_empty());
        assert!(report.snapshot.is_none());
    }
}
