//! Agent Context, Streaming Sink, Agent Loop Engine, Job Queue & Lifecycle
//! Manager, SSE Fan-Out Broker, Job Executor, HTTP surface, CLI, and
//! bootstrap wiring for the research-agent gateway binary.

pub mod api;
pub mod bootstrap;
pub mod broker;
pub mod cli;
pub mod context;
pub mod engine;
pub mod executor;
pub mod queue;
pub mod state;
pub mod strategy;
pub mod stream;

pub use state::AppState;
