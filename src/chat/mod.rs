//! Chat front end: turns free text into a single MCP tool, prompt or resource call.

pub mod backend;
pub mod handlers;
pub mod heuristics;
pub mod intent;
pub mod llm;
pub mod router;
pub mod transport;
