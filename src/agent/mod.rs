//! Agent runtime: model resolution, streamed sessions and single-call
//! invocation.
//!
//! ```text
//! ModelRegistry ──find──▸ ModelHandle ──▸ AgentRuntime::create_session
//!                                              │
//!                    AgentInvoker ◂── TextDelta events ── AgentSession
//! ```
//!
//! [`HttpRuntime`] is the production runtime. [`fakes`] provides scripted
//! doubles for tests.

pub mod fakes;
pub mod http;
pub mod invoker;
pub mod registry;
pub mod traits;

#[allow(unused_imports)]
pub use http::{HttpRuntime, RuntimeError};
#[allow(unused_imports)]
pub use invoker::{is_failure_text, AgentInvoker, InvokeRequest, FAILURE_MARKER};
#[allow(unused_imports)]
pub use registry::{CredentialStore, ModelRegistry};
#[allow(unused_imports)]
pub use traits::{
    AgentEvent, AgentRuntime, AgentSession, EventHandler, ModelHandle, ModelResolver, Provider,
    SessionConfig, ThinkingLevel, ToolCapability,
};
