//! Interactive objects and their lifecycle state machine.
//!
//! Each object in the field runs the same five-state lifecycle:
//!
//! ```text
//!   Idle ⇄ Approaching            (proximity gained / lost)
//!   {Idle, Approaching} → Touched (accepted collision — sound trigger)
//!   Touched → Playing             (after the hold duration, default 0)
//!   Playing → Fading              (after the play duration)
//!   Fading → Idle                 (after the fade duration)
//! ```
//!
//! Transitions return the events they emit — note triggers, particle-burst
//! descriptions, state changes — for an external dispatcher to consume.
//! No callbacks are stored on the objects themselves.

use crate::config::LifecycleConfig;
use crate::hand::HandSample;

// ════════════════════════════════════════════════════════════════════════════
// ObjectState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectState {
    Idle,
    Approaching,
    Touched,
    Playing,
    Fading,
}

impl ObjectState {
    pub fn name(self) -> &'static str {
        match self {
            ObjectState::Idle        => "idle",
            ObjectState::Approaching => "approaching",
            ObjectState::Touched     => "touched",
            ObjectState::Playing     => "playing",
            ObjectState::Fading      => "fading",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Emitted events
// ════════════════════════════════════════════════════════════════════════════

/// A sound trigger produced by a Touched transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub midi:         u8,
    pub velocity:     u8,
    pub timestamp_ms: u64,
    pub object_id:    u32,
}

/// Particles per burst — fixed size, radial layout.
pub const BURST_PARTICLES: usize = 12;

/// Description of a radial particle burst.  Drawing it is the rendering
/// collaborator's job; only the description is owned here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleBurst {
    pub origin: [f32; 3],
    pub count:  usize,
    pub speed:  f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectEvent {
    StateChanged { id: u32, from: ObjectState, to: ObjectState },
    Note(NoteEvent),
    Burst(ParticleBurst),
}

// ════════════════════════════════════════════════════════════════════════════
// InteractiveObject
// ════════════════════════════════════════════════════════════════════════════

/// One object in the interactive field.
///
/// The collection is owned by the scene collaborator; this core reads
/// position and flags and writes back `state`, `state_since_ms`, and
/// `last_interaction_ms` only.
#[derive(Clone, Debug)]
pub struct InteractiveObject {
    pub id:                  u32,
    pub position:            [f32; 3],
    pub collision_radius:    f32,
    pub state:               ObjectState,
    pub midi_note:           u8,
    pub velocity:            u8,
    pub cooldown_ms:         u64,
    pub last_interaction_ms: Option<u64>,
    /// When the current state was entered.
    pub state_since_ms:      u64,
    pub is_active:           bool,
    pub is_interactable:     bool,
}

impl InteractiveObject {
    pub fn new(id: u32, position: [f32; 3], midi_note: u8) -> Self {
        InteractiveObject {
            id,
            position,
            collision_radius:    0.08,
            state:               ObjectState::Idle,
            midi_note,
            velocity:            100,
            cooldown_ms:         250,
            last_interaction_ms: None,
            state_since_ms:      0,
            is_active:           true,
            is_interactable:     true,
        }
    }

    // ── builder-style setters ─────────────────────────────────────────────

    pub fn radius(mut self, r: f32) -> Self {
        self.collision_radius = r;
        self
    }

    pub fn cooldown(mut self, ms: u64) -> Self {
        self.cooldown_ms = ms;
        self
    }

    pub fn note_velocity(mut self, v: u8) -> Self {
        self.velocity = v.min(127);
        self
    }

    /// True while the object is inside its own cooldown window.
    pub fn in_cooldown(&self, now_ms: u64) -> bool {
        match self.last_interaction_ms {
            Some(last) => now_ms.saturating_sub(last) < self.cooldown_ms,
            None => false,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ObjectLifecycle — drives the transitions
// ════════════════════════════════════════════════════════════════════════════

/// Applies lifecycle transitions to objects and returns the emitted
/// events.  All checks within one tick use the same `now_ms`.
pub struct ObjectLifecycle {
    timing: LifecycleConfig,
}

impl ObjectLifecycle {
    pub fn new(timing: LifecycleConfig) -> Self {
        ObjectLifecycle { timing }
    }

    /// Proximity gained: `Idle → Approaching`.
    pub fn on_proximity(&self, obj: &mut InteractiveObject, now_ms: u64) -> Vec<ObjectEvent> {
        let mut events = Vec::new();
        if obj.state == ObjectState::Idle {
            transition(obj, ObjectState::Approaching, now_ms, &mut events);
        }
        events
    }

    /// Proximity lost: `Approaching → Idle`.
    pub fn on_proximity_lost(
        &self,
        obj: &mut InteractiveObject,
        now_ms: u64,
    ) -> Vec<ObjectEvent> {
        let mut events = Vec::new();
        if obj.state == ObjectState::Approaching {
            transition(obj, ObjectState::Idle, now_ms, &mut events);
        }
        events
    }

    /// Accepted collision: `{Idle, Approaching} → Touched`, emitting the
    /// sound trigger and a radial burst description.
    ///
    /// Attempts inside the object's cooldown window, or carrying
    /// malformed/missing hand data, are silently ignored.
    pub fn on_collision(
        &self,
        obj: &mut InteractiveObject,
        hand: Option<&HandSample>,
        now_ms: u64,
    ) -> Vec<ObjectEvent> {
        let mut events = Vec::new();

        match hand {
            Some(h) if !h.landmarks.is_empty() => {}
            _ => return events,
        }

        if obj.in_cooldown(now_ms) {
            log::debug!("object {} in cooldown, interaction ignored", obj.id);
            return events;
        }
        if !matches!(obj.state, ObjectState::Idle | ObjectState::Approaching) {
            return events;
        }

        obj.last_interaction_ms = Some(now_ms);
        transition(obj, ObjectState::Touched, now_ms, &mut events);
        events.push(ObjectEvent::Note(NoteEvent {
            midi:         obj.midi_note,
            velocity:     obj.velocity,
            timestamp_ms: now_ms,
            object_id:    obj.id,
        }));
        events.push(ObjectEvent::Burst(ParticleBurst {
            origin: obj.position,
            count:  BURST_PARTICLES,
            speed:  1.0,
        }));
        events
    }

    /// Duration-driven transitions: Touched → Playing → Fading → Idle.
    pub fn advance(&self, obj: &mut InteractiveObject, now_ms: u64) -> Vec<ObjectEvent> {
        let mut events = Vec::new();
        let elapsed = now_ms.saturating_sub(obj.state_since_ms);
        match obj.state {
            ObjectState::Touched if elapsed >= self.timing.hold_ms => {
                transition(obj, ObjectState::Playing, now_ms, &mut events);
            }
            ObjectState::Playing if elapsed >= self.timing.play_ms => {
                transition(obj, ObjectState::Fading, now_ms, &mut events);
            }
            ObjectState::Fading if elapsed >= self.timing.fade_ms => {
                transition(obj, ObjectState::Idle, now_ms, &mut events);
            }
            _ => {}
        }
        events
    }

    /// Continuous glow-intensity target for the rendering collaborator.
    /// Ramps while approaching/touched, full while playing, decays while
    /// fading; zero at rest.
    pub fn glow_target(&self, obj: &InteractiveObject, now_ms: u64) -> f32 {
        let elapsed = now_ms.saturating_sub(obj.state_since_ms) as f32;
        match obj.state {
            ObjectState::Idle        => 0.0,
            ObjectState::Approaching => 0.5 * (elapsed / 250.0).min(1.0),
            ObjectState::Touched     => 0.5 + 0.5 * (elapsed / 150.0).min(1.0),
            ObjectState::Playing     => 1.0,
            ObjectState::Fading      => {
                1.0 - (elapsed / self.timing.fade_ms.max(1) as f32).min(1.0)
            }
        }
    }
}

fn transition(
    obj: &mut InteractiveObject,
    to: ObjectState,
    now_ms: u64,
    events: &mut Vec<ObjectEvent>,
) {
    let from = obj.state;
    obj.state = to;
    obj.state_since_ms = now_ms;
    events.push(ObjectEvent::StateChanged { id: obj.id, from, to });
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
