//! Captioning gateway: turns aggregate snapshot statistics into a structured
//! mood narrative, via an OpenAI-compatible model with a deterministic
//! rules-based fallback.

mod openai;
mod schema;

pub use openai::{CaptionClient, CaptionError};
pub use schema::{energy_band, rules_fallback, CaptionInput, CaptionOutput, EnergyBand};
