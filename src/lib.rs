//! Deterministic simulation engine for idle/incremental games.
//!
//! A [`game::GameDefinition`] declares currencies, purchasable elements,
//! effects, milestones and prestige layers. A [`runtime::GameRuntime`] owns the
//! mutable [`game::GameState`] and applies ticks, purchases, clicks and
//! prestige resets. A [`simulation::Simulation`] drives a runtime with a
//! strategy until a terminal condition holds and produces a report that can be
//! judged against pacing bounds.

pub mod cli;
pub mod config;
pub mod game;
pub mod games;
pub mod persistence;
pub mod runtime;
pub mod simulation;
