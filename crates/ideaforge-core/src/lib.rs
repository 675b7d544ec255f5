//! Core types and storage for ideaforge research proposals.
//!
//! Provides the idea aggregate ([`idea::Idea`]) with its append-only snapshot history,
//! critique and refinement records, loop configuration, and JSON persistence of
//! finalized ideas.

pub mod config;
pub mod idea;
pub mod schema;
pub mod storage;
