//! Narrative Playback — a runtime for branching, choice-driven dialogue.
//!
//! Plays authored scenarios of scenes, dialogues and choices: conditions
//! gate what the player sees, effects move numeric variables, dice checks
//! add risk, and every step is published as an event for the presentation
//! layer to render.

pub mod core;
pub mod schema;
