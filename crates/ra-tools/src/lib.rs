//! Tool Registry and built-in tool executors.
//!
//! Owns the process-wide [`ToolRegistry`] (register/resolve/list-by-category)
//! and the concrete tools the Agent Loop Engine drives through it:
//! `web_search`, `extract_page`, file I/O scoped to a per-job workspace,
//! `create_report`, and the two system tools `final_answer`/`clarification`.

pub mod builtin;
pub mod file_ops;
pub mod registry;

pub use builtin::register_builtin_tools;
pub use registry::{ToolContext, ToolExecutor, ToolRegistry};
