//! User-configurable options, one record for the whole application.
//!
//! Every field has a documented default so a missing or partial settings
//! file always yields a usable record. Bounded numeric fields are clamped
//! on load (see [`Preferences::clamped`]), never on write.

use serde::{Deserialize, Serialize};

pub const FONT_SIZE_MIN: u32 = 8;
pub const FONT_SIZE_MAX: u32 = 24;
pub const MAX_TOKENS_MIN: u32 = 100;
pub const MAX_TOKENS_MAX: u32 = 2000;

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "Basic (1.3)".to_string()
}

fn default_theme() -> String {
    "System".to_string()
}

fn default_font_size() -> u32 {
    12
}

fn default_companion_model() -> String {
    "gemma3:1b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_typing_speed() -> u64 {
    15
}

fn default_greeting() -> String {
    "Hello! I am Orion, an AI chatbot created by OmniNode. How can I help you today?".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Active model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// "System", "Light" or "Dark".
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Chat font size in points, 8–24.
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Companion model used for auxiliary tasks (auto-titling etc.).
    #[serde(default = "default_companion_model")]
    pub companion_model: String,
    /// Sampling temperature, 0.0–1.0.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Response length cap, 100–2000.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_true")]
    pub auto_save: bool,
    #[serde(default)]
    pub sound_notifications: bool,
    #[serde(default = "default_true")]
    pub thinking_animation: bool,
    #[serde(default)]
    pub strict_mode: bool,
    /// Delay between characters of the typing animation.
    #[serde(default = "default_typing_speed")]
    pub typing_speed_ms: u64,
    #[serde(default = "default_greeting")]
    pub startup_greeting: String,
    /// Overrides the built-in system prompt when non-empty.
    #[serde(default)]
    pub system_prompt: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            model: default_model(),
            theme: default_theme(),
            font_size: default_font_size(),
            companion_model: default_companion_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            auto_save: true,
            sound_notifications: false,
            thinking_animation: true,
            strict_mode: false,
            typing_speed_ms: default_typing_speed(),
            startup_greeting: default_greeting(),
            system_prompt: String::new(),
        }
    }
}

impl Preferences {
    /// Clamp bounded numeric fields into their documented ranges. Applied
    /// when loading from disk so an edited-by-hand file cannot smuggle an
    /// out-of-range value into the UI.
    pub fn clamped(mut self) -> Self {
        self.font_size = self.font_size.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
        self.temperature = self.temperature.clamp(0.0, 1.0);
        self.max_tokens = self.max_tokens.clamp(MAX_TOKENS_MIN, MAX_TOKENS_MAX);
        self
    }
}
