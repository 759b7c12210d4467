//! Narrative Cinematic: data-driven cinematic playback for narrative games.
//!
//! Turns an authored narrative script into a fixed, ordered plan of beats
//! (boot glitch, narration, choices, secret reveal, exit), plays those beats
//! as a cooperative stream of render steps, and accumulates the three-axis
//! Dreamweaver alignment score that picks the branch the game commits to.

pub mod core;
pub mod schema;
