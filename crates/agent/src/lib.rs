//! Turn orchestration for gramclaw.
//!
//! A turn alternates between model inference and tool execution until
//! the model produces a plain text answer:
//!
//! ```text
//!   user message ──► infer ──► tool calls? ──► execute tools ──┐
//!                      ▲                                       │
//!                      └───────────────────────────────────────┘
//!                            (no tool calls ► done)
//! ```
//!
//! [`RoutingPolicy`] decides whether to continue, [`ToolInvoker`] runs
//! tool calls concurrently, and [`TurnGraph`] drives the loop.

pub mod graph;
pub mod invoker;
pub mod policy;
pub mod stream;

pub use graph::TurnGraph;
pub use invoker::ToolInvoker;
pub use policy::{Decision, RoutingPolicy};
pub use stream::TokenSink;
