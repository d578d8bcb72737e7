//! # chime_theory
//!
//! Music-theory recognition for the chime field: classify the set of
//! currently-sounding pitches into intervals, chords, and scales, and track
//! first-time pattern **discoveries** within a session.
//!
//! The recognizer is a pure function of its inputs plus its own private
//! state (analysis cache, pitch history, discovery set) — no I/O, no clock
//! of its own.  Timestamps come in from the caller so behaviour is fully
//! deterministic under test.
//!
//! ## Quick start
//!
//! ```rust
//! use chime_theory::{Recognizer, RecognizerConfig, ChordKind};
//!
//! let mut rec = Recognizer::new(RecognizerConfig::default());
//!
//! // C–E–G sounding together at t=0
//! let snap = rec.analyze(&[60, 64, 67], 0);
//! assert_eq!(snap.chord.unwrap().kind, ChordKind::Major);
//! assert_eq!(snap.discoveries.len(), 4); // M3, m3, P5 intervals + major chord
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// Error
// ════════════════════════════════════════════════════════════════════════════

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A note-name lookup that does not exist in the chromatic table.
    /// This indicates a programming error upstream, not bad user input.
    #[error("invalid note name: {0}")]
    InvalidNote(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Note conversions — MIDI ↔ frequency ↔ name/octave
// ════════════════════════════════════════════════════════════════════════════

/// The fixed chromatic note-name table.  Index = pitch class.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Equal-temperament frequency for a MIDI note number.
/// `freq = 440 * 2^((midi - 69) / 12)` — A4 (69) is 440 Hz.
pub fn midi_to_frequency(midi: u8) -> f32 {
    440.0 * 2f32.powf((midi as f32 - 69.0) / 12.0)
}

/// Nearest MIDI note for a frequency, clamped to 0–127.
pub fn frequency_to_midi(freq: f32) -> u8 {
    if freq <= 0.0 {
        return 0;
    }
    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
    midi.round().clamp(0.0, 127.0) as u8
}

/// Chromatic name of a MIDI note ("C", "C#", … "B").
pub fn note_name(midi: u8) -> &'static str {
    NOTE_NAMES[(midi % 12) as usize]
}

/// Scientific octave number: `floor(midi / 12) - 1` (middle C = C4).
pub fn octave(midi: u8) -> i8 {
    (midi / 12) as i8 - 1
}

/// Display label, e.g. `60` → `"C4"`.
pub fn note_label(midi: u8) -> String {
    format!("{}{}", note_name(midi), octave(midi))
}

/// MIDI note number for a name + octave.
///
/// The name must appear in [`NOTE_NAMES`]; anything else is
/// [`Error::InvalidNote`].
pub fn note_to_midi(name: &str, octave: i8) -> Result<u8> {
    let pc = NOTE_NAMES
        .iter()
        .position(|&n| n == name)
        .ok_or_else(|| Error::InvalidNote(name.to_string()))?;
    let midi = (octave as i32 + 1) * 12 + pc as i32;
    Ok(midi.clamp(0, 127) as u8)
}

// ════════════════════════════════════════════════════════════════════════════
// IntervalQuality — the 13 canonical qualities, unison through octave
// ════════════════════════════════════════════════════════════════════════════

/// Canonical interval quality between two pitches.
///
/// Distances collapse modulo 12, except that a non-zero distance which is
/// an exact multiple of 12 reads as an octave rather than a unison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntervalQuality {
    Unison,
    MinorSecond,
    MajorSecond,
    MinorThird,
    MajorThird,
    PerfectFourth,
    Tritone,
    PerfectFifth,
    MinorSixth,
    MajorSixth,
    MinorSeventh,
    MajorSeventh,
    Octave,
}

impl IntervalQuality {
    /// Classify an absolute semitone distance.
    pub fn from_semitones(distance: u8) -> Self {
        use IntervalQuality::*;
        if distance == 0 {
            return Unison;
        }
        match distance % 12 {
            0  => Octave,
            1  => MinorSecond,
            2  => MajorSecond,
            3  => MinorThird,
            4  => MajorThird,
            5  => PerfectFourth,
            6  => Tritone,
            7  => PerfectFifth,
            8  => MinorSixth,
            9  => MajorSixth,
            10 => MinorSeventh,
            _  => MajorSeventh,
        }
    }

    /// Full display name.
    pub fn name(self) -> &'static str {
        use IntervalQuality::*;
        match self {
            Unison        => "Unison",
            MinorSecond   => "Minor Second",
            MajorSecond   => "Major Second",
            MinorThird    => "Minor Third",
            MajorThird    => "Major Third",
            PerfectFourth => "Perfect Fourth",
            Tritone       => "Tritone",
            PerfectFifth  => "Perfect Fifth",
            MinorSixth    => "Minor Sixth",
            MajorSixth    => "Major Sixth",
            MinorSeventh  => "Minor Seventh",
            MajorSeventh  => "Major Seventh",
            Octave        => "Octave",
        }
    }

    /// Compact name used in discovery keys ("P5", "m3", …).
    pub fn short(self) -> &'static str {
        use IntervalQuality::*;
        match self {
            Unison        => "P1",
            MinorSecond   => "m2",
            MajorSecond   => "M2",
            MinorThird    => "m3",
            MajorThird    => "M3",
            PerfectFourth => "P4",
            Tritone       => "TT",
            PerfectFifth  => "P5",
            MinorSixth    => "m6",
            MajorSixth    => "M6",
            MinorSeventh  => "m7",
            MajorSeventh  => "M7",
            Octave        => "P8",
        }
    }

    fn teaching_message(self) -> &'static str {
        use IntervalQuality::*;
        match self {
            Unison        => "Two voices on the very same note — a unison.",
            MinorSecond   => "A minor second — the smallest step, tense and crunchy.",
            MajorSecond   => "A major second — one whole step, the building block of scales.",
            MinorThird    => "A minor third — the sound of sadness in a chord.",
            MajorThird    => "A major third — the bright heart of a major chord.",
            PerfectFourth => "A perfect fourth — open and sturdy, like a fanfare.",
            Tritone       => "The tritone — maximum tension, splitting the octave in half.",
            PerfectFifth  => "A perfect fifth — the most stable interval after the octave.",
            MinorSixth    => "A minor sixth — wide and wistful.",
            MajorSixth    => "A major sixth — warm and singing.",
            MinorSeventh  => "A minor seventh — the pull of a dominant chord.",
            MajorSeventh  => "A major seventh — dreamy, just shy of the octave.",
            Octave        => "An octave — the same note, higher. Frequencies exactly doubled.",
        }
    }
}

/// Interval quality between two pitches, order-independent.
pub fn interval_between(a: u8, b: u8) -> IntervalQuality {
    IntervalQuality::from_semitones(a.abs_diff(b))
}

/// One classified pair out of the active pitch set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalPair {
    pub low:     u8,
    pub high:    u8,
    pub quality: IntervalQuality,
}

// ════════════════════════════════════════════════════════════════════════════
// Chord templates — exact, rooted interval fingerprints
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChordKind {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
}

impl ChordKind {
    pub fn name(self) -> &'static str {
        match self {
            ChordKind::Major      => "major",
            ChordKind::Minor      => "minor",
            ChordKind::Diminished => "diminished",
            ChordKind::Augmented  => "augmented",
            ChordKind::Sus2       => "sus2",
            ChordKind::Sus4       => "sus4",
        }
    }

    /// Ascending semitone offsets from the root.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordKind::Major      => &[0, 4, 7],
            ChordKind::Minor      => &[0, 3, 7],
            ChordKind::Diminished => &[0, 3, 6],
            ChordKind::Augmented  => &[0, 4, 8],
            ChordKind::Sus2       => &[0, 2, 7],
            ChordKind::Sus4       => &[0, 5, 7],
        }
    }

    fn teaching_message(self) -> &'static str {
        match self {
            ChordKind::Major      => "A major chord: root, major third, perfect fifth. Bright and at rest.",
            ChordKind::Minor      => "A minor chord: the third drops a semitone and the mood darkens.",
            ChordKind::Diminished => "A diminished chord: two stacked minor thirds, restless and unstable.",
            ChordKind::Augmented  => "An augmented chord: two major thirds, floating with nowhere to land.",
            ChordKind::Sus2       => "A sus2 chord: the third is replaced by a second, open and unresolved.",
            ChordKind::Sus4       => "A sus4 chord: the fourth leans on the third, begging to resolve.",
        }
    }
}

/// Match priority order — first exact fingerprint match wins.
pub const CHORD_TABLE: [ChordKind; 6] = [
    ChordKind::Major,
    ChordKind::Minor,
    ChordKind::Diminished,
    ChordKind::Augmented,
    ChordKind::Sus2,
    ChordKind::Sus4,
];

/// A recognised chord: kind plus the root pitch class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChordMatch {
    pub kind:      ChordKind,
    pub root:      u8,
    pub root_name: &'static str,
}

/// Reduce pitches to unique pitch classes, ascending.
pub fn pitch_classes(pitches: &[u8]) -> Vec<u8> {
    let mut pcs: Vec<u8> = pitches.iter().map(|p| p % 12).collect();
    pcs.sort_unstable();
    pcs.dedup();
    pcs
}

/// Classify a pitch set as a chord.
///
/// The lowest pitch class is taken as the root and the ascending
/// interval-from-root list must match a template *exactly* — inversions
/// with a different bass note do not match.  Requires at least three
/// distinct pitch classes.
pub fn match_chord(pitches: &[u8]) -> Option<ChordMatch> {
    let pcs = pitch_classes(pitches);
    if pcs.len() < 3 {
        return None;
    }
    let root = pcs[0];
    let fingerprint: Vec<u8> = pcs.iter().map(|pc| pc - root).collect();

    CHORD_TABLE
        .iter()
        .find(|kind| kind.intervals() == fingerprint.as_slice())
        .map(|&kind| ChordMatch {
            kind,
            root,
            root_name: NOTE_NAMES[root as usize],
        })
}

// ════════════════════════════════════════════════════════════════════════════
// Scale templates — subset interval matching over a trailing window
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScaleKind {
    Major,
    NaturalMinor,
    Pentatonic,
    Blues,
    Dorian,
}

impl ScaleKind {
    pub fn name(self) -> &'static str {
        match self {
            ScaleKind::Major        => "major",
            ScaleKind::NaturalMinor => "natural minor",
            ScaleKind::Pentatonic   => "pentatonic",
            ScaleKind::Blues        => "blues",
            ScaleKind::Dorian       => "dorian",
        }
    }

    /// Semitone offsets from the root.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleKind::Major        => &[0, 2, 4, 5, 7, 9, 11],
            ScaleKind::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleKind::Pentatonic   => &[0, 2, 4, 7, 9],
            ScaleKind::Blues        => &[0, 3, 5, 6, 7, 10],
            ScaleKind::Dorian       => &[0, 2, 3, 5, 7, 9, 10],
        }
    }

    fn teaching_message(self) -> &'static str {
        match self {
            ScaleKind::Major        => "The major scale — do re mi — the home base of Western melody.",
            ScaleKind::NaturalMinor => "The natural minor scale — the major scale's shadowed twin.",
            ScaleKind::Pentatonic   => "The pentatonic scale — five notes, no wrong ones.",
            ScaleKind::Blues        => "The blues scale — a pentatonic with one bent, blue note.",
            ScaleKind::Dorian       => "The dorian mode — minor with a raised sixth, cool and modal.",
        }
    }
}

/// Match priority order for scale recognition.
///
/// Subset matching means several templates can fit the same pitch set
/// (a pentatonic is contained in the major scale); the first match in
/// this order wins.
pub const SCALE_TABLE: [ScaleKind; 5] = [
    ScaleKind::Major,
    ScaleKind::NaturalMinor,
    ScaleKind::Pentatonic,
    ScaleKind::Blues,
    ScaleKind::Dorian,
];

/// A recognised scale: kind plus the root pitch class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleMatch {
    pub kind:      ScaleKind,
    pub root:      u8,
    pub root_name: &'static str,
}

/// Classify a pitch set as a scale fragment.
///
/// The lowest pitch class is the root; every observed interval-from-root
/// must be a member of the template's interval set.  Requires at least
/// five distinct pitch classes.
pub fn match_scale(pitches: &[u8]) -> Option<ScaleMatch> {
    let pcs = pitch_classes(pitches);
    if pcs.len() < 5 {
        return None;
    }
    let root = pcs[0];
    let observed: Vec<u8> = pcs.iter().map(|pc| pc - root).collect();

    SCALE_TABLE
        .iter()
        .find(|kind| {
            let set = kind.intervals();
            observed.iter().all(|iv| set.contains(iv))
        })
        .map(|&kind| ScaleMatch {
            kind,
            root,
            root_name: NOTE_NAMES[root as usize],
        })
}

// ════════════════════════════════════════════════════════════════════════════
// Discovery — first-time pattern sightings within a session
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryKind {
    Interval,
    Chord,
    Scale,
}

impl DiscoveryKind {
    pub fn name(self) -> &'static str {
        match self {
            DiscoveryKind::Interval => "interval",
            DiscoveryKind::Chord    => "chord",
            DiscoveryKind::Scale    => "scale",
        }
    }

    fn celebration_tokens(self) -> &'static [&'static str] {
        match self {
            DiscoveryKind::Interval => &["♪", "✨"],
            DiscoveryKind::Chord    => &["♪", "♫", "✨"],
            DiscoveryKind::Scale    => &["♫", "★", "✨"],
        }
    }
}

/// Emitted the first time a pattern is recognised in a session.
/// Later sightings of the same pattern are silent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    pub kind:               DiscoveryKind,
    /// Pattern subtype: the interval short name, chord kind, or scale kind.
    pub subtype:            String,
    pub message:            String,
    pub celebration_tokens: &'static [&'static str],
}

// ════════════════════════════════════════════════════════════════════════════
// AnalysisSnapshot — one classified view of the sounding pitch set
// ════════════════════════════════════════════════════════════════════════════

/// The full classification of one active-pitch set.
///
/// Snapshots are memoized by the canonical pitch-set key, so repeated
/// queries with the same sounding notes return the identical snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisSnapshot {
    pub timestamp_ms: u64,
    /// Canonical (sorted, deduplicated) active pitches.
    pub active_notes: Vec<u8>,
    pub intervals:    Vec<IntervalPair>,
    pub chord:        Option<ChordMatch>,
    pub scale:        Option<ScaleMatch>,
    /// Patterns seen for the first time while computing this snapshot.
    pub discoveries:  Vec<Discovery>,
}

// ════════════════════════════════════════════════════════════════════════════
// Recognizer — cache, history, discovery set
// ════════════════════════════════════════════════════════════════════════════

/// Tuning knobs for the recognizer.
#[derive(Clone, Copy, Debug)]
pub struct RecognizerConfig {
    /// Trailing window merged into scale lookups.
    pub scale_window_ms: u64,
    /// Pitch-set history entries kept for the trailing window.
    pub history_cap:     usize,
    /// Memoized snapshots kept before oldest-first eviction.
    pub cache_cap:       usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        RecognizerConfig {
            scale_window_ms: 5000,
            history_cap:     100,
            cache_cap:       256,
        }
    }
}

struct HistoryEntry {
    pitches:      Vec<u8>,
    timestamp_ms: u64,
}

/// Classifies active pitch sets and tracks first-time discoveries.
///
/// Owns its analysis cache, pitch history, and discovery set; all are
/// bounded and mutated only through [`Recognizer::analyze`].
pub struct Recognizer {
    config:      RecognizerConfig,
    cache:       HashMap<Vec<u8>, AnalysisSnapshot>,
    cache_order: VecDeque<Vec<u8>>,
    history:     VecDeque<HistoryEntry>,
    seen:        HashSet<String>,
}

impl Recognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Recognizer {
            config,
            cache:       HashMap::new(),
            cache_order: VecDeque::new(),
            history:     VecDeque::new(),
            seen:        HashSet::new(),
        }
    }

    /// Classify the active pitch set at `now_ms`.
    ///
    /// A cache hit returns the stored snapshot unchanged — no history
    /// update, no recomputation, and no repeated discoveries.  Total over
    /// any pitch set, including empty.
    pub fn analyze(&mut self, active: &[u8], now_ms: u64) -> AnalysisSnapshot {
        let mut key: Vec<u8> = active.to_vec();
        key.sort_unstable();
        key.dedup();

        if let Some(snap) = self.cache.get(&key) {
            log::debug!("analysis cache hit for {:?}", key);
            return snap.clone();
        }

        // History feeds the trailing-window scale lookup; record before
        // matching so the current pitches are part of their own window.
        self.history.push_back(HistoryEntry {
            pitches:      key.clone(),
            timestamp_ms: now_ms,
        });
        while self.history.len() > self.config.history_cap {
            self.history.pop_front();
        }

        let mut discoveries = Vec::new();

        // ── pairwise intervals ────────────────────────────────────────────
        let mut intervals = Vec::new();
        for i in 0..key.len() {
            for j in (i + 1)..key.len() {
                let quality = interval_between(key[i], key[j]);
                intervals.push(IntervalPair { low: key[i], high: key[j], quality });
                self.discover(
                    DiscoveryKind::Interval,
                    quality.short(),
                    quality.teaching_message(),
                    &mut discoveries,
                );
            }
        }

        // ── chord ─────────────────────────────────────────────────────────
        let chord = match_chord(&key);
        if let Some(c) = chord {
            self.discover(
                DiscoveryKind::Chord,
                c.kind.name(),
                c.kind.teaching_message(),
                &mut discoveries,
            );
        }

        // ── scale (current + trailing window) ─────────────────────────────
        let since = now_ms.saturating_sub(self.config.scale_window_ms);
        let mut window: Vec<u8> = key.clone();
        for entry in &self.history {
            if entry.timestamp_ms >= since {
                window.extend_from_slice(&entry.pitches);
            }
        }
        let scale = match_scale(&window);
        if let Some(s) = scale {
            self.discover(
                DiscoveryKind::Scale,
                s.kind.name(),
                s.kind.teaching_message(),
                &mut discoveries,
            );
        }

        let snap = AnalysisSnapshot {
            timestamp_ms: now_ms,
            active_notes: key.clone(),
            intervals,
            chord,
            scale,
            discoveries,
        };

        self.cache.insert(key.clone(), snap.clone());
        self.cache_order.push_back(key);
        while self.cache_order.len() > self.config.cache_cap {
            if let Some(oldest) = self.cache_order.pop_front() {
                self.cache.remove(&oldest);
            }
        }

        snap
    }

    fn discover(
        &mut self,
        kind: DiscoveryKind,
        subtype: &str,
        message: &'static str,
        out: &mut Vec<Discovery>,
    ) {
        let key = format!("{}:{}", kind.name(), subtype);
        if self.seen.insert(key) {
            log::info!("discovered {} {}", kind.name(), subtype);
            out.push(Discovery {
                kind,
                subtype: subtype.to_string(),
                message: message.to_string(),
                celebration_tokens: kind.celebration_tokens(),
            });
        }
    }

    /// Number of distinct patterns discovered so far this session.
    pub fn discovery_count(&self) -> usize {
        self.seen.len()
    }

    /// Pitch-set history entries currently retained.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forget the session: cache, history, and discoveries.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.cache_order.clear();
        self.history.clear();
        self.seen.clear();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
