//! Tools the revision loop can call.

pub mod registry;
pub mod search;
pub mod tool;

pub use registry::ToolRegistry;
pub use search::{McpSearchInvoker, SerpApiInvoker, search_query};
pub use tool::*;
