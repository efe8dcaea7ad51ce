//! Headless driver for the RTS simulation core.
//!
//! This crate has no rendering/audio/input/UI dependency of its own — it
//! loads a [`scenario::Scenario`] (a RON file), drives
//! [`rts_core::simulation::Simulation`] through a fixed-rate tick loop via
//! [`game_runner::run_game`], and reports the outcome (winner, victory
//! points, tick count). Scripted opponents come from [`strategies`].
//!
//! # Example
//!
//! ```bash
//! cargo run -p rts_headless -- run scenarios/skirmish.ron
//! ```

pub mod game_runner;
pub mod scenario;
pub mod strategies;

pub use game_runner::{run_game, GameConfig, GameResult};
pub use scenario::Scenario;
pub use strategies::Strategy;
