//! chime_field — scripted demo entry point.
//!
//! Replays a hand sweep across a field of scale bells, printing every
//! note trigger and theory discovery, and forwarding notes to the first
//! available MIDI port.

use anyhow::Result;

use chime_field::clock::ManualClock;
use chime_field::config::FieldConfig;
use chime_field::hand::Handedness;
use chime_field::object::InteractiveObject;
use chime_field::pipeline::Pipeline;
use chime_field::sink::open_note_sink;
use chime_field::source::{HandSource, ScriptedSource};
use chime_theory::note_label;

const FRAME_MS: u64 = 33;
const SWEEP_FRAMES: usize = 90;

fn main() -> Result<()> {
    env_logger::init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Chime Field — Gesture-to-Music Interaction Demo       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware build (demo still uses the script)");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Scripted hand sweep  (use --features leap for hardware)");
    println!();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            println!("  Config: {}", path);
            FieldConfig::load(&path)?
        }
        None => FieldConfig::default(),
    };

    // A C major scale of bells strung across the frame in a shallow arc.
    let scale = [60u8, 62, 64, 65, 67, 69, 71, 72];
    let mut field: Vec<InteractiveObject> = scale
        .iter()
        .enumerate()
        .map(|(i, &midi)| {
            let x = 0.15 + 0.10 * i as f32;
            let y = 0.55 - 0.18 * (std::f32::consts::PI * i as f32 / 7.0).sin();
            InteractiveObject::new(i as u32, [x, y, 0.0], midi)
                .cooldown(config.detector.default_cooldown_ms)
        })
        .collect();

    let clock = ManualClock::new();
    let mut pipeline = Pipeline::new(&config, Box::new(clock.clone()));
    let mut sink = open_note_sink();
    let mut source =
        ScriptedSource::sweep(Handedness::Right, 0.1, 0.9, 0.5, SWEEP_FRAMES, FRAME_MS);

    println!("  Sweeping one hand across {} bells…", field.len());
    println!();

    let mut ringing: Vec<u8> = Vec::new();
    while !source.is_done() {
        let hands = source.poll();
        let report = pipeline.tick(&hands, &mut field);

        for midi in ringing.drain(..) {
            sink.note_off(midi);
        }
        for note in &report.notes {
            sink.note_on(note.midi, note.velocity);
            ringing.push(note.midi);
            println!(
                "  ♪ t={:>5}ms  {:<4} (bell {}, velocity {})",
                report.timestamp_ms,
                note_label(note.midi),
                note.object_id,
                note.velocity
            );
        }
        if let Some(snapshot) = &report.snapshot {
            for d in &snapshot.discoveries {
                println!(
                    "  {}  new {}: {} — {}",
                    d.celebration_tokens.join(" "),
                    d.kind.name(),
                    d.subtype,
                    d.message
                );
            }
        }

        clock.advance(FRAME_MS);
        std::thread::sleep(std::time::Duration::from_millis(FRAME_MS));
    }
    for midi in ringing {
        sink.note_off(midi);
    }

    println!();
    println!(
        "  Session over — {} patterns discovered.",
        pipeline.discovery_count()
    );
    Ok(())
}
