//! Collision and proximity detection between hands and the object field.
//!
//! Cost is bounded by a uniform spatial hash rebuilt from scratch every
//! tick, so a dense field never degrades into a full hand-points × objects
//! scan.  Each object is tested against the *single closest* interaction
//! point only, and accepted collisions are debounced per object id by the
//! detector's own cooldown map.

use std::collections::HashMap;

use crate::config::DetectorConfig;
use crate::hand::{
    distance3, interaction_points, HandSample, Handedness, InteractionPoint,
};
use crate::object::InteractiveObject;

// ════════════════════════════════════════════════════════════════════════════
// Events
// ════════════════════════════════════════════════════════════════════════════

/// A discrete trigger: an interaction point entered an object's collision
/// shell this tick (and the object was outside its cooldown window).
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionEvent {
    pub object_id:    u32,
    pub hand_index:   usize,
    pub handedness:   Handedness,
    /// The closest interaction point that produced the event.
    pub point:        InteractionPoint,
    pub distance:     f32,
    pub timestamp_ms: u64,
}

/// A continuous approach: near the object but not colliding.
#[derive(Clone, Debug, PartialEq)]
pub struct ProximityEvent {
    pub object_id:    u32,
    pub hand_index:   usize,
    pub handedness:   Handedness,
    pub point:        InteractionPoint,
    pub distance:     f32,
    pub timestamp_ms: u64,
}

/// Per-hand gate outcome, reported even for skipped hands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandTickState {
    pub hand_index: usize,
    pub handedness: Handedness,
    pub in_bounds:  bool,
    pub confidence: f32,
    /// True when the hand was excluded from detection this tick.
    pub skipped:    bool,
}

/// Everything one detection pass produces.
#[derive(Clone, Debug, Default)]
pub struct TickDetections {
    pub collisions:  Vec<CollisionEvent>,
    pub proximity:   Vec<ProximityEvent>,
    pub hand_states: Vec<HandTickState>,
}

// ════════════════════════════════════════════════════════════════════════════
// BoundaryCheck — gate collaborator with a built-in fallback
// ════════════════════════════════════════════════════════════════════════════

/// Verdict on whether a hand should participate in detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandGate {
    pub in_bounds:  bool,
    pub confidence: f32,
}

/// Decides per tick whether a hand is usable.  The host can supply its
/// own; [`DefaultBoundary`] is the built-in heuristic.
pub trait BoundaryCheck {
    fn check(&self, sample: &HandSample) -> HandGate;
}

/// Fallback gate: palm centre must sit inside the (margin-extended)
/// frame, confidence is mean landmark visibility, penalised when the
/// wrist→knuckle distances disagree wildly (a telltale of a garbled
/// detection).
pub struct DefaultBoundary {
    pub margin: f32,
}

impl Default for DefaultBoundary {
    fn default() -> Self {
        DefaultBoundary { margin: 0.1 }
    }
}

impl BoundaryCheck for DefaultBoundary {
    fn check(&self, sample: &HandSample) -> HandGate {
        if sample.is_incomplete() {
            return HandGate { in_bounds: false, confidence: 0.0 };
        }
        let palm = match sample.palm_center() {
            Some(p) => p,
            None => return HandGate { in_bounds: false, confidence: 0.0 },
        };

        let lo = -self.margin;
        let hi = 1.0 + self.margin;
        let in_bounds =
            palm[0] >= lo && palm[0] <= hi && palm[1] >= lo && palm[1] <= hi;

        // Wrist→MCP spans of a real hand agree within a small factor.
        let wrist = &sample.landmarks[crate::hand::landmark_index::WRIST];
        let mut min_span = f32::MAX;
        let mut max_span = f32::MIN;
        for &i in &crate::hand::PALM_BASE[1..] {
            let lm = &sample.landmarks[i];
            let d = ((lm.x - wrist.x).powi(2) + (lm.y - wrist.y).powi(2)).sqrt();
            min_span = min_span.min(d);
            max_span = max_span.max(d);
        }
        let consistent = min_span > 1e-4 && max_span / min_span < 4.0;

        let confidence = if consistent {
            sample.mean_visibility()
        } else {
            sample.mean_visibility() * 0.5
        };

        HandGate { in_bounds, confidence: confidence.clamp(0.0, 1.0) }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SpatialGrid — uniform hash over object positions
// ════════════════════════════════════════════════════════════════════════════

/// Uniform spatial hash, rebuilt from the candidate objects every tick.
///
/// Cell edge must be at least the largest interaction distance
/// (collision shell or proximity radius) so a 3×3×3 neighbourhood scan
/// is exhaustive.
struct SpatialGrid {
    cell:    f32,
    buckets: HashMap<[i32; 3], Vec<usize>>,
}

impl SpatialGrid {
    fn build(objects: &[InteractiveObject], candidates: &[usize], cell: f32) -> Self {
        let mut grid = SpatialGrid { cell: cell.max(1e-3), buckets: HashMap::new() };
        for &i in candidates {
            let key = grid.key(objects[i].position);
            grid.buckets.entry(key).or_default().push(i);
        }
        grid
    }

    fn key(&self, p: [f32; 3]) -> [i32; 3] {
        [
            (p[0] / self.cell).floor() as i32,
            (p[1] / self.cell).floor() as i32,
            (p[2] / self.cell).floor() as i32,
        ]
    }

    /// Candidate object indices in the 3×3×3 neighbourhood of a point.
    fn neighbors(&self, p: [f32; 3], out: &mut Vec<usize>) {
        let center = self.key(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [center[0] + dx, center[1] + dy, center[2] + dz];
                    if let Some(bucket) = self.buckets.get(&key) {
                        out.extend_from_slice(bucket);
                    }
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CollisionDetector
// ════════════════════════════════════════════════════════════════════════════

const DIST_EPS: f32 = 1e-6;

/// Per-tick collision/proximity detection with per-object debouncing.
pub struct CollisionDetector {
    config:   DetectorConfig,
    boundary: Box<dyn BoundaryCheck>,
    /// object id → timestamp of the last accepted collision.
    cooldown: HashMap<u32, u64>,
}

impl CollisionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_boundary(config, Box::new(DefaultBoundary::default()))
    }

    pub fn with_boundary(config: DetectorConfig, boundary: Box<dyn BoundaryCheck>) -> Self {
        CollisionDetector { config, boundary, cooldown: HashMap::new() }
    }

    /// Run one detection pass.  `now_ms` is the tick timestamp, sampled
    /// once by the caller and reused for every check in the pass.
    ///
    /// Empty hands or objects yield an empty result; never panics.
    pub fn detect(
        &mut self,
        hands: &[HandSample],
        objects: &[InteractiveObject],
        now_ms: u64,
    ) -> TickDetections {
        let mut result = TickDetections::default();
        if hands.is_empty() || objects.is_empty() {
            return result;
        }

        // Drop cooldown entries whose window has fully elapsed so the map
        // never outgrows the live field.
        self.prune_cooldowns(objects, now_ms);

        let candidates: Vec<usize> = objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_active && o.is_interactable)
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return result;
        }

        let grid = SpatialGrid::build(objects, &candidates, self.config.grid_size);
        let mut near: Vec<usize> = Vec::new();

        for (hand_index, sample) in hands.iter().enumerate() {
            let gate = self.boundary.check(sample);
            let skipped =
                !gate.in_bounds || gate.confidence < self.config.confidence_threshold;
            result.hand_states.push(HandTickState {
                hand_index,
                handedness: sample.handedness,
                in_bounds: gate.in_bounds,
                confidence: gate.confidence,
                skipped,
            });
            if skipped {
                log::debug!(
                    "hand {} ({}) skipped: in_bounds={} confidence={:.2}",
                    hand_index,
                    sample.handedness.name(),
                    gate.in_bounds,
                    gate.confidence
                );
                continue;
            }

            let points = interaction_points(sample);
            if points.is_empty() {
                continue;
            }

            near.clear();
            for point in &points {
                grid.neighbors(point.position, &mut near);
            }
            near.sort_unstable();
            near.dedup();

            for &oi in &near {
                let obj = &objects[oi];
                let (point, dist) = closest_point(&points, obj.position);

                if dist <= obj.collision_radius + point.radius {
                    if let Some(&last) = self.cooldown.get(&obj.id) {
                        if now_ms.saturating_sub(last) < obj.cooldown_ms {
                            continue;
                        }
                    }
                    self.cooldown.insert(obj.id, now_ms);
                    result.collisions.push(CollisionEvent {
                        object_id:    obj.id,
                        hand_index,
                        handedness:   sample.handedness,
                        point:        *point,
                        distance:     dist,
                        timestamp_ms: now_ms,
                    });
                } else if dist <= self.config.proximity_radius {
                    result.proximity.push(ProximityEvent {
                        object_id:    obj.id,
                        hand_index,
                        handedness:   sample.handedness,
                        point:        *point,
                        distance:     dist,
                        timestamp_ms: now_ms,
                    });
                }
            }
        }

        result
    }

    fn prune_cooldowns(&mut self, objects: &[InteractiveObject], now_ms: u64) {
        let fallback = self.config.default_cooldown_ms;
        let windows: HashMap<u32, u64> =
            objects.iter().map(|o| (o.id, o.cooldown_ms)).collect();
        self.cooldown.retain(|id, &mut last| {
            let window = windows.get(id).copied().unwrap_or(fallback);
            now_ms.saturating_sub(last) < window
        });
    }
}

/// The single closest interaction point to a target, preferring higher
/// priority on (near-)ties.  Never called with an empty point set.
fn closest_point(points: &[InteractionPoint], target: [f32; 3]) -> (&InteractionPoint, f32) {
    let mut best = &points[0];
    let mut best_dist = distance3(best.position, target);
    for point in &points[1..] {
        let d = distance3(point.position, target);
        if d + DIST_EPS < best_dist
            || ((d - best_dist).abs() <= DIST_EPS && point.priority > best.priority)
        {
            best = point;
            best_dist = d;
        }
    }
    (best, best_dist)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Landmark;
    use crate::source::synth_hand;

    fn detector() -> CollisionDetector {
        CollisionDetector::new(DetectorConfig::default())
    }

    /// Hand whose palm centre lands at world (0.5, 0.52, 0).
    fn centered_hand() -> HandSample {
        synth_hand(Handedness::Right, 0.5, 0.5, 0.0, 0)
    }

    fn palm_world() -> [f32; 3] {
        let points = interaction_points(&centered_hand());
        points.iter().find(|p| p.name == "palm").unwrap().position
    }

    #[test]
    fn empty_inputs_yield_empty_result() {
        let mut d = detector();
        let r = d.detect(&[], &[InteractiveObject::new(1, [0.5; 3], 60)], 0);
        assert!(r.collisions.is_empty() && r.hand_states.is_empty());
        let r = d.detect(&[centered_hand()], &[], 0);
        assert!(r.collisions.is_empty() && r.proximity.is_empty());
    }

    #[test]
    fn touching_object_collides() {
        let mut d = detector();
        let obj = InteractiveObject::new(7, palm_world(), 60);
        let r = d.detect(&[centered_hand()], &[obj], 100);
        assert_eq!(r.collisions.len(), 1);
        assert_eq!(r.collisions[0].object_id, 7);
        assert_eq!(r.collisions[0].timestamp_ms, 100);
        assert!(r.proximity.is_empty());
    }

    #[test]
    fn one_event_per_object_even_with_many_points() {
        // All six interaction points are near the palm; still one event
        let mut d = detector();
        let obj = InteractiveObject::new(7, palm_world(), 60).radius(0.5);
        let r = d.detect(&[centered_hand()], &[obj], 0);
        assert_eq!(r.collisions.len(), 1);
    }

    #[test]
    fn cooldown_accepts_exactly_one_collision() {
        let mut d = detector();
        let obj = InteractiveObject::new(7, palm_world(), 60).cooldown(250);
        let field = vec![obj];

        let first = d.detect(&[centered_hand()], &field, 100);
        assert_eq!(first.collisions.len(), 1);

        // 150 ms later — inside the window, no new collision
        let second = d.detect(&[centered_hand()], &field, 250);
        assert!(second.collisions.is_empty());

        // Window elapsed — accepted again
        let third = d.detect(&[centered_hand()], &field, 360);
        assert_eq!(third.collisions.len(), 1);
    }

    #[test]
    fn near_object_reports_proximity_not_collision() {
        let mut d = detector();
        let palm = palm_world();
        // 0.12 beside the palm point: outside every collision shell,
        // inside the 0.15 proximity radius, closest to the palm probe
        let obj = InteractiveObject::new(3, [palm[0] + 0.12, palm[1], 0.0], 60)
            .radius(0.02);
        let r = d.detect(&[centered_hand()], &[obj], 0);
        assert!(r.collisions.is_empty());
        assert_eq!(r.proximity.len(), 1);
        assert_eq!(r.proximity[0].object_id, 3);
    }

    #[test]
    fn far_object_is_silent() {
        let mut d = detector();
        let obj = InteractiveObject::new(3, [0.05, 0.05, 0.0], 60).radius(0.02);
        let r = d.detect(&[centered_hand()], &[obj], 0);
        assert!(r.collisions.is_empty());
        assert!(r.proximity.is_empty());
    }

    #[test]
    fn inactive_objects_are_ignored() {
        let mut d = detector();
        let mut obj = InteractiveObject::new(7, palm_world(), 60);
        obj.is_active = false;
        let r = d.detect(&[centered_hand()], &[obj.clone()], 0);
        assert!(r.collisions.is_empty());

        obj.is_active = true;
        obj.is_interactable = false;
        let r = d.detect(&[centered_hand()], &[obj], 0);
        assert!(r.collisions.is_empty());
    }

    #[test]
    fn low_visibility_hand_is_skipped() {
        let mut d = detector();
        let mut sample = centered_hand();
        for lm in &mut sample.landmarks {
            lm.visibility = Some(0.1);
        }
        let obj = InteractiveObject::new(7, palm_world(), 60);
        let r = d.detect(&[sample], &[obj], 0);
        assert!(r.collisions.is_empty());
        assert_eq!(r.hand_states.len(), 1);
        assert!(r.hand_states[0].skipped);
        assert!(r.hand_states[0].confidence < 0.5);
    }

    #[test]
    fn out_of_frame_hand_is_skipped() {
        let mut d = detector();
        let sample = synth_hand(Handedness::Right, 1.6, 0.5, 0.0, 0);
        let r = d.detect(&[sample], &[InteractiveObject::new(1, [0.5; 3], 60)], 0);
        assert_eq!(r.hand_states.len(), 1);
        assert!(!r.hand_states[0].in_bounds);
        assert!(r.hand_states[0].skipped);
    }

    #[test]
    fn incomplete_hand_is_skipped() {
        let mut d = detector();
        let sample = HandSample::new(
            Handedness::Left,
            0,
            vec![Landmark::new(0.5, 0.5); 5],
        );
        let r = d.detect(&[sample], &[InteractiveObject::new(1, [0.5; 3], 60)], 0);
        assert!(r.collisions.is_empty());
        assert!(r.hand_states[0].skipped);
    }

    #[test]
    fn closest_point_prefers_priority_on_tie() {
        let a = InteractionPoint {
            name: "wrist", position: [0.0; 3], priority: 0.5, radius: 0.04,
        };
        let b = InteractionPoint {
            name: "index_tip", position: [0.0; 3], priority: 1.0, radius: 0.03,
        };
        let points = [a, b];
        let (best, _) = closest_point(&points, [0.1, 0.0, 0.0]);
        assert_eq!(best.name, "index_tip");
    }

    #[test]
    fn grid_neighbourhood_matches_full_scan() {
        let mut d = detector();
        let hand = centered_hand();
        let points = interaction_points(&hand);
        let cfg = DetectorConfig::default();

        // Objects scattered across the frame, a few near the hand
        let mut field = Vec::new();
        let mut id = 0;
        for xi in 0..6 {
            for yi in 0..6 {
                field.push(
                    InteractiveObject::new(id, [xi as f32 * 0.18, yi as f32 * 0.18, 0.0], 60)
                        .radius(0.03)
                        .cooldown(0),
                );
                id += 1;
            }
        }

        let r = d.detect(&[hand], &field, 0);
        let mut grid_hits: Vec<u32> = r
            .collisions
            .iter()
            .map(|c| c.object_id)
            .chain(r.proximity.iter().map(|p| p.object_id))
            .collect();
        grid_hits.sort_unstable();

        // Brute force over every object with the same rules
        let mut scan_hits: Vec<u32> = field
            .iter()
            .filter(|o| {
                let (p, dist) = closest_point(&points, o.position);
                dist <= o.collision_radius + p.radius || dist <= cfg.proximity_radius
            })
            .map(|o| o.id)
            .collect();
        scan_hits.sort_unstable();

        assert_eq!(grid_hits, scan_hits);
    }
}
