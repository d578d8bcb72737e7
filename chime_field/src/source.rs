//! Hand sample sources — scripted replay and LeapMotion hardware.
//!
//! The pipeline consumes [`HandSample`] batches through the [`HandSource`]
//! trait and never learns where they came from.  The scripted source is
//! always available and drives the demo binary and tests; real hardware
//! compiles behind the `leap` feature.

use std::collections::VecDeque;

use crate::hand::{HandSample, Handedness, Landmark};

// ════════════════════════════════════════════════════════════════════════════
// HandSource trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver one batch of hand samples per tick.
pub trait HandSource {
    /// Samples for the next tick; empty when no hands are tracked.
    fn poll(&mut self) -> Vec<HandSample>;

    /// True once the source will never produce samples again.
    fn is_done(&self) -> bool {
        false
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Synthetic hands
// ════════════════════════════════════════════════════════════════════════════

/// Build a plausible 21-landmark hand around a palm position.
///
/// The five base landmarks average exactly to `(palm_x, palm_y + 0.02)`,
/// fingertips sit above the knuckle row, and every landmark carries the
/// given depth.  Used by the scripted source and throughout the tests.
pub fn synth_hand(
    handedness: Handedness,
    palm_x: f32,
    palm_y: f32,
    depth: f32,
    timestamp_ms: u64,
) -> HandSample {
    let p = |dx: f32, dy: f32| Landmark::with_z(palm_x + dx, palm_y + dy, depth);
    let landmarks = vec![
        p(0.0, 0.10),      // 0  wrist
        p(-0.05, 0.06),    // 1  thumb cmc
        p(-0.07, 0.02),    // 2  thumb mcp
        p(-0.08, -0.02),   // 3  thumb ip
        p(-0.09, -0.05),   // 4  thumb tip
        p(-0.045, 0.0),    // 5  index mcp
        p(-0.045, -0.04),  // 6  index pip
        p(-0.045, -0.08),  // 7  index dip
        p(-0.045, -0.12),  // 8  index tip
        p(-0.015, 0.0),    // 9  middle mcp
        p(-0.015, -0.045), // 10 middle pip
        p(-0.015, -0.09),  // 11 middle dip
        p(-0.015, -0.135), // 12 middle tip
        p(0.015, 0.0),     // 13 ring mcp
        p(0.015, -0.04),   // 14 ring pip
        p(0.015, -0.08),   // 15 ring dip
        p(0.015, -0.12),   // 16 ring tip
        p(0.045, 0.0),     // 17 pinky mcp
        p(0.045, -0.033),  // 18 pinky pip
        p(0.045, -0.066),  // 19 pinky dip
        p(0.045, -0.10),   // 20 pinky tip
    ];
    HandSample::new(handedness, timestamp_ms, landmarks)
}

// ════════════════════════════════════════════════════════════════════════════
// ScriptedSource — replayed frames
// ════════════════════════════════════════════════════════════════════════════

/// Replays a fixed list of per-tick sample batches, then goes quiet.
pub struct ScriptedSource {
    frames: VecDeque<Vec<HandSample>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Vec<HandSample>>) -> Self {
        ScriptedSource { frames: frames.into() }
    }

    /// A horizontal sweep: one hand gliding from `from_x` to `to_x` at
    /// height `y` over `frames` ticks, `frame_ms` apart.
    pub fn sweep(
        handedness: Handedness,
        from_x: f32,
        to_x: f32,
        y: f32,
        frames: usize,
        frame_ms: u64,
    ) -> Self {
        let steps = frames.max(2);
        let batches = (0..steps)
            .map(|i| {
                let t = i as f32 / (steps - 1) as f32;
                let x = from_x + (to_x - from_x) * t;
                vec![synth_hand(handedness, x, y, 0.0, i as u64 * frame_ms)]
            })
            .collect();
        ScriptedSource::new(batches)
    }
}

impl HandSource for ScriptedSource {
    fn poll(&mut self) -> Vec<HandSample> {
        self.frames.pop_front().unwrap_or_default()
    }

    fn is_done(&self) -> bool {
        self.frames.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapSource — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Hand source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library
/// installed.  Palm and digit joints are converted from millimetres in
/// device space to the normalised mirrored frame the pipeline expects.
#[cfg(feature = "leap")]
pub struct LeapSource {
    connection: leaprs::Connection,
    epoch:      std::time::Instant,
}

#[cfg(feature = "leap")]
impl LeapSource {
    /// Device-space extents mapped onto the [0,1] frame.
    const X_HALF_RANGE_MM: f32 = 200.0;
    const Y_MIN_MM:        f32 = 100.0;
    const Y_RANGE_MM:      f32 = 300.0;
    const Z_RANGE_MM:      f32 = 400.0;

    pub fn open() -> Self {
        use leaprs::*;
        let mut connection = Connection::create(ConnectionConfig::default())
            .expect("Failed to open LeapC connection");
        connection.open().expect("Failed to open LeapMotion device");
        LeapSource { connection, epoch: std::time::Instant::now() }
    }

    fn landmark(x: f32, y: f32, z: f32) -> Landmark {
        Landmark {
            x: (x / (2.0 * Self::X_HALF_RANGE_MM) + 0.5).clamp(0.0, 1.0),
            // Device y grows upward; the frame's y grows downward.
            y: (1.0 - (y - Self::Y_MIN_MM) / Self::Y_RANGE_MM).clamp(0.0, 1.0),
            z: Some((z / Self::Z_RANGE_MM).clamp(-1.0, 1.0)),
            visibility: None,
        }
    }
}

#[cfg(feature = "leap")]
impl HandSource for LeapSource {
    fn poll(&mut self) -> Vec<HandSample> {
        use leaprs::*;

        let msg = match self.connection.poll(10) {
            Ok(m) => m,
            Err(_) => return Vec::new(),
        };
        let frame = match msg.event() {
            Event::Tracking(f) => f,
            _ => return Vec::new(),
        };

        let timestamp_ms = self.epoch.elapsed().as_millis() as u64;
        frame
            .hands()
            .filter_map(|hand| {
                let handedness = match hand.hand_type() {
                    HandType::Left  => Handedness::Left,
                    HandType::Right => Handedness::Right,
                };

                let digits: Vec<_> = hand.digits().collect();
                if digits.len() < 5 {
                    return None;
                }

                // 21-landmark layout: wrist, then four joints per digit
                // (thumb first), matching the hand model convention.
                let mut landmarks = Vec::with_capacity(21);
                let wrist = digits[0].metacarpal().prev_joint();
                landmarks.push(Self::landmark(wrist.x, wrist.y, wrist.z));
                for digit in &digits {
                    for joint in [
                        digit.metacarpal().next_joint(),
                        digit.proximal().next_joint(),
                        digit.intermediate().next_joint(),
                        digit.distal().next_joint(),
                    ] {
                        landmarks.push(Self::landmark(joint.x, joint.y, joint.z));
                    }
                }

                Some(HandSample::new(handedness, timestamp_ms, landmarks))
            })
            .collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::LANDMARK_COUNT;

    #[test]
    fn synth_hand_is_complete() {
        let sample = synth_hand(Handedness::Right, 0.5, 0.5, 0.0, 0);
        assert_eq!(sample.landmarks.len(), LANDMARK_COUNT);
        assert!(!sample.is_incomplete());
    }

    #[test]
    fn synth_hand_palm_lands_where_asked() {
        let sample = synth_hand(Handedness::Left, 0.3, 0.6, 0.0, 0);
        let palm = sample.palm_center().unwrap();
        assert!((palm[0] - 0.3).abs() < 1e-6);
        assert!((palm[1] - 0.62).abs() < 1e-6);
    }

    #[test]
    fn scripted_source_replays_in_order() {
        let mut src = ScriptedSource::new(vec![
            vec![synth_hand(Handedness::Right, 0.1, 0.5, 0.0, 0)],
            vec![],
            vec![synth_hand(Handedness::Right, 0.9, 0.5, 0.0, 66)],
        ]);
        assert!(!src.is_done());
        assert_eq!(src.poll().len(), 1);
        assert!(src.poll().is_empty());
        let last = src.poll();
        assert_eq!(last[0].timestamp_ms, 66);
        assert!(src.is_done());
        assert!(src.poll().is_empty());
    }

    #[test]
    fn sweep_moves_across_the_frame() {
        let mut src = ScriptedSource::sweep(Handedness::Right, 0.1, 0.9, 0.5, 10, 33);
        let first = src.poll()[0].palm_center().unwrap();
        let mut last = first;
        while !src.is_done() {
            if let Some(sample) = src.poll().first() {
                last = sample.palm_center().unwrap();
            }
        }
        assert!(first[0] < 0.2);
        assert!(last[0] > 0.8);
    }
}
