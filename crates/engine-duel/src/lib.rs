//! Engine Duel - drive UCI chess engines and play them against each other.
//!
//! This crate spawns UCI-compatible engines as subprocesses, talks to them
//! through a strictly synchronized request/response session, and runs
//! matches in which the engines' own evaluations decide the result.
//!
//! # Modules
//!
//! - [`channel`] - Line-oriented text channel to an engine process
//! - [`session`] - Engine session state machine (handshake, options, search)
//! - [`config`] - `arena.toml` loading and option resolution
//! - [`match_runner`] - Two-engine match orchestration
//! - [`json_output`] - JSON match records

pub mod channel;
pub mod color;
pub mod config;
pub mod json_output;
pub mod match_runner;
pub mod session;

pub use color::Color;
