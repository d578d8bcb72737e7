//! Note output — abstraction over midir / null.
//!
//! The pipeline emits [`crate::object::NoteEvent`]s; whatever consumes
//! them implements [`NoteSink`].  A real MIDI port is used when one is
//! available, otherwise the null sink keeps the pipeline running silently.

// ════════════════════════════════════════════════════════════════════════════
// NoteSink trait
// ════════════════════════════════════════════════════════════════════════════

pub trait NoteSink: Send {
    fn note_on(&mut self, note: u8, velocity: u8);
    fn note_off(&mut self, note: u8);
}

// ── midir backend ─────────────────────────────────────────────────────────

pub struct MidirSink {
    conn:    midir::MidiOutputConnection,
    channel: u8,
}

impl NoteSink for MidirSink {
    fn note_on(&mut self, note: u8, velocity: u8) {
        let _ = self.conn.send(&[0x90 | (self.channel & 0x0F), note, velocity]);
    }
    fn note_off(&mut self, note: u8) {
        let _ = self.conn.send(&[0x80 | (self.channel & 0x0F), note, 0]);
    }
}

// ── null backend (used when no MIDI port is available) ────────────────────

pub struct NullSink;

impl NoteSink for NullSink {
    fn note_on(&mut self, _note: u8, _velocity: u8) {}
    fn note_off(&mut self, _note: u8) {}
}

// ════════════════════════════════════════════════════════════════════════════
// open_note_sink — enumerate ports and pick first available
// ════════════════════════════════════════════════════════════════════════════

/// Try to open the first available MIDI output port, preferring a
/// softsynth.  Falls back to [`NullSink`] with a warning if none found.
pub fn open_note_sink() -> Box<dyn NoteSink> {
    let midi_out = match midir::MidiOutput::new("chime_field") {
        Ok(m) => m,
        Err(e) => {
            log::warn!("MIDI init error: {} — using null output", e);
            return Box::new(NullSink);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        log::warn!("no MIDI output ports found — notes will be silent");
        return Box::new(NullSink);
    }

    // Prefer a softsynth if visible
    let port_idx = ports
        .iter()
        .enumerate()
        .find(|(_, p)| {
            midi_out
                .port_name(p)
                .map(|n| {
                    let n = n.to_lowercase();
                    n.contains("fluid")
                        || n.contains("timidity")
                        || n.contains("microsoft")
                        || n.contains("synth")
                })
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    let port = &ports[port_idx];
    let name = midi_out
        .port_name(port)
        .unwrap_or_else(|_| "Unknown".to_string());

    match midi_out.connect(port, "chime-play") {
        Ok(conn) => {
            log::info!("opened MIDI port: {}", name);
            Box::new(MidirSink { conn, channel: 0 })
        }
        Err(e) => {
            log::warn!("failed to connect to {}: {} — using null output", name, e);
            Box::new(NullSink)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
