//! # clawguard
//!
//! Security scanner core for AI agent skill packages.
//!
//! A skill package is a directory with a `SKILL.md` manifest (YAML header +
//! markdown body) and optional helper scripts. `clawguard` parses the
//! package, runs a multi-layer analyzer pipeline over it, and produces a
//! structured report: classified findings, a weighted trust score with a
//! letter grade, and a PASS / CAUTION / REVIEW / BLOCK recommendation.
//! Analysis is strictly read-only; nothing from the scanned skill is ever
//! executed.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use clawguard::{config::Config, pipeline::{CancelToken, Pipeline}};
//!
//! let config = Config::load(None).expect("failed to load config");
//! let pipeline = Pipeline::new(&config).expect("failed to load rules");
//! let report = pipeline.scan(Path::new("./my-skill"), &CancelToken::new())?;
//!
//! println!("{} ({})", report.score.value, report.score.recommendation);
//! # Ok::<(), clawguard::error::ScanError>(())
//! ```
//!
//! ## Architecture
//!
//! 1. **[`parser`]** — normalize a skill directory into a [`skill::Skill`].
//! 2. **[`rules`]** — the immutable rule library (regex and pattern
//!    dialects), compiled once at startup.
//! 3. **[`analyzers`]** — independent plug-in analyzers behind the
//!    [`analyzers::Analyzer`] trait: static, pattern, AST, semantic.
//! 4. **[`pipeline`]** — parallel orchestration, dedup, ordering.
//! 5. **[`score`]** — deterministic weighted scoring with diminishing
//!    returns per category.
//! 6. **[`report`]** — the serialization contract handed to collaborators.

pub mod analyzers;
pub mod config;
pub mod error;
pub mod finding;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod score;
pub mod skill;
