//! Headless battle runner for balance testing and CI verification.
//!
//! Drives the battle engine without a presentation layer:
//!
//! - **Single runs**: fight one scenario, optionally paced in real time and
//!   rendered as ASCII, and print the battle report as JSON
//! - **Batches**: fight a scenario across many seeds in parallel and
//!   summarise win rates and battle length
//! - **Determinism checks**: fight the same seed repeatedly and compare
//!   final state hashes
//!
//! # Output
//!
//! - **stdout**: JSON (battle report or batch summary)
//! - **stderr**: logs and the ASCII view
//!
//! # Example
//!
//! ```bash
//! # Run a scenario, watching it at double speed
//! cargo run -p broadside_headless -- run --scenario scenarios/skirmish.ron --realtime --speed 2 --ascii
//!
//! # Balance batch
//! cargo run -p broadside_headless -- batch --scenario scenarios/skirmish.ron --count 1000
//! ```

pub mod ascii;
pub mod batch;
pub mod runner;
pub mod scenario;

pub use ascii::{render_ascii, AsciiConfig};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchSummary, DeterminismCheck};
pub use runner::{run_battle, PacedScheduler, RunConfig, RunError};
pub use scenario::{Scenario, ScenarioError};
