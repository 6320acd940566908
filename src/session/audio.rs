//! Buzz sound cues and the output seam the presentation layer plugs into.

use tracing::info;

use crate::config::QuizConfig;

/// Per-team pitch offset applied to the synthesized tone, so each roster
/// position gets a distinguishable buzz.
const TONE_STEP_HZ: u32 = 90;

/// Sound played when a team buzzes in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCue {
    /// The user-provided clip, as its encoded payload.
    Clip(String),
    /// Synthesized tone.
    Tone {
        /// Tone frequency in hertz.
        frequency_hz: u32,
        /// Tone duration in milliseconds.
        duration_ms: u64,
    },
}

/// Output path for buzz sounds. Implementations must return quickly; cue
/// dispatch happens on the session task and must never delay the press-order
/// update.
pub trait AudioSink: Send + Sync {
    /// (Re)initialize the output path; called at round start when sound is
    /// enabled.
    fn arm(&self) {}

    /// Emit the cue for a fresh buzz.
    fn play(&self, cue: AudioCue);
}

/// Sink that drops every cue; for sound-off embeddings and tests.
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&self, _cue: AudioCue) {}
}

/// Sink that logs cues instead of playing them; used by the headless binary.
pub struct TracingAudio;

impl AudioSink for TracingAudio {
    fn arm(&self) {
        info!("audio output armed");
    }

    fn play(&self, cue: AudioCue) {
        match cue {
            AudioCue::Clip(clip) => info!(bytes = clip.len(), "buzz clip cue"),
            AudioCue::Tone {
                frequency_hz,
                duration_ms,
            } => info!(frequency_hz, duration_ms, "buzz tone cue"),
        }
    }
}

/// Pick the cue for a buzz from the team at `team_index`, if sound is
/// enabled: the configured clip when present, otherwise a tone offset from
/// the base frequency by the roster position.
pub fn buzz_cue(config: &QuizConfig, team_index: usize) -> Option<AudioCue> {
    if !config.buzzer_sound_enabled {
        return None;
    }
    if let Some(clip) = &config.buzzer_audio_data {
        return Some(AudioCue::Clip(clip.clone()));
    }
    Some(AudioCue::Tone {
        frequency_hz: config.buzzer_tone_freq + team_index as u32 * TONE_STEP_HZ,
        duration_ms: config.buzzer_tone_ms,
    })
}
