//! Quiz configuration model: the persisted record driving headers, roster,
//! countdown length, and buzz sounds.

mod service;

pub use service::{ConfigError, ConfigService, SharedConfig};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on the number of teams in the roster.
pub const MAX_TEAMS: usize = 10;
/// Lowest accepted synthesized-tone frequency.
pub const MIN_TONE_FREQ_HZ: u32 = 100;
/// Highest accepted synthesized-tone frequency.
pub const MAX_TONE_FREQ_HZ: u32 = 4_000;
/// Shortest accepted synthesized-tone duration.
pub const MIN_TONE_MS: u64 = 50;
/// Longest accepted synthesized-tone duration.
pub const MAX_TONE_MS: u64 = 2_000;

/// A competing team.
///
/// Roster position doubles as the index space the controller reports buzz
/// events in, so the order of [`QuizConfig::teams`] is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Stable identity; survives renames and logo changes.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Encoded image payload, if one was uploaded.
    #[serde(default)]
    pub logo: Option<String>,
    /// Running score.
    #[serde(default)]
    pub score: i32,
}

impl Team {
    /// Build a fresh team with a new identity and a zeroed score.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            logo: None,
            score: 0,
        }
    }
}

/// The whole persisted configuration record.
///
/// Every field carries a default so a partially saved record (or an older
/// version of it) merges cleanly over the baked-in values on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizConfig {
    /// Main header line shown above the stage.
    pub header_title: String,
    /// Secondary header line.
    pub header_subtitle: String,
    /// Encoded image payload for the left header slot.
    pub left_logo: Option<String>,
    /// Encoded image payload for the right header slot.
    pub right_logo: Option<String>,
    /// Encoded animation payload for the center stage.
    pub main_animation_gif: Option<String>,
    /// Countdown length for one question, in seconds.
    pub question_timeout_seconds: u32,
    /// 1-based number of the question currently on stage.
    pub current_question_number: u32,
    /// Ordered roster; position is the buzz index space.
    pub teams: Vec<Team>,
    /// Whether a buzz plays a sound locally.
    pub buzzer_sound_enabled: bool,
    /// Base frequency of the synthesized buzz tone, in hertz.
    pub buzzer_tone_freq: u32,
    /// Duration of the synthesized buzz tone, in milliseconds.
    pub buzzer_tone_ms: u64,
    /// Encoded custom audio clip; takes precedence over the tone when set.
    pub buzzer_audio_data: Option<String>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            header_title: "NEON QUIZ CHAMPIONSHIP".into(),
            header_subtitle: "Grand Finale - Round 1".into(),
            left_logo: None,
            right_logo: None,
            main_animation_gif: None,
            question_timeout_seconds: 30,
            current_question_number: 1,
            teams: Vec::new(),
            buzzer_sound_enabled: false,
            buzzer_tone_freq: 800,
            buzzer_tone_ms: 200,
            buzzer_audio_data: None,
        }
    }
}

impl QuizConfig {
    /// Clamp tunables into their supported ranges, floor the question number
    /// at 1, and cap the roster at [`MAX_TEAMS`].
    pub fn normalize(&mut self) {
        self.buzzer_tone_freq = self.buzzer_tone_freq.clamp(MIN_TONE_FREQ_HZ, MAX_TONE_FREQ_HZ);
        self.buzzer_tone_ms = self.buzzer_tone_ms.clamp(MIN_TONE_MS, MAX_TONE_MS);
        self.current_question_number = self.current_question_number.max(1);
        self.teams.truncate(MAX_TEAMS);
    }
}
