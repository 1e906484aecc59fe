//! Reflect Agent — draft, search, revise.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod payload;
pub mod tools;

pub use agent::ask;
