//! cclog - Claude Code session logs to SQLite
//!
//! Normalizes Claude Code CLI sessions, browser exports and claude.ai web
//! exports into `sessions` / `messages` tables with FTS5 search and
//! summary views.

// Safety lints
#![deny(unsafe_code)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Panic prevention in library code
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

// Keep functions reviewable
#![warn(clippy::cognitive_complexity)]
#![warn(clippy::too_many_arguments)]
#![warn(clippy::too_many_lines)]

pub mod config;
pub mod content;
pub mod index;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod scan;
pub mod stats;
pub mod util;
pub mod web;
