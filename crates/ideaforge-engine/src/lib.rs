//! ideaforge engine: the critique/refine loop and everything it talks to.
//!
//! Recovers structured data from free-form model output (extraction, critique and
//! refinement builders, draft parsing), classifies critiques against thresholds,
//! and drives ideas to a terminal status. Also hosts the LLM backends, the
//! OpenAlex paper helper, and Markdown report rendering.

pub mod agent;
pub mod critique;
pub mod drafts;
pub mod events;
pub mod extract;
pub mod lifecycle;
pub mod llm;
pub mod openalex;
pub mod prompts;
pub mod refine;
pub mod report;
pub mod scoring;
