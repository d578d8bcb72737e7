//! # chime_field
//!
//! Real-time gesture-to-music interaction pipeline.  Tracked hand landmark
//! samples come in once per frame; quantized note events, object lifecycle
//! events, and music-theory discoveries come out.
//!
//! ## Per-tick data flow
//!
//! | Stage | Component | Consumes | Produces |
//! |---|---|---|---|
//! | 1 | [`mapper::HandPositionMapper`] | hand landmarks | smoothed [`mapper::NoteMapping`] |
//! | 2 | [`collide::CollisionDetector`] | hand points + object field | collision / proximity events |
//! | 3 | [`object::ObjectLifecycle`] | collision / proximity events | note triggers, bursts, glow targets |
//! | 4 | `chime_theory::Recognizer` | sounding note set | intervals, chords, scales, discoveries |
//!
//! All four stages run synchronously inside [`pipeline::Pipeline::tick`]
//! with a single timestamp sampled once at tick start, so cooldown checks
//! and state-duration checks can never skew within a pass.
//!
//! ## Feature flags
//!
//! * (default) — **Scripted mode**: replayed hand frames drive the pipeline.
//! * `leap` — **Hardware mode**: polls a real LeapMotion controller via LeapC.

pub mod clock;
pub mod collide;
pub mod config;
pub mod hand;
pub mod mapper;
pub mod object;
pub mod pipeline;
pub mod sink;
pub mod source;
