//! Agent runtime around the arbiter decision core.
//!
//! The crate supplies the collaborators the core expects at its boundary:
//! - a lexicon translator that grounds text in the concept store (`translator`)
//! - built-in operations and the default concept catalogue (`operations`)
//! - an action gate that turns a deliberation into allow/deny/degrade (`guardrails`)
//! - a per-conversation `Session` wiring them together (`runtime`)
//!
//! Nothing here phrases replies. A `Turn` is handed to whatever renders it.

pub mod guardrails;
pub mod operations;
pub mod runtime;
pub mod translator;

pub use guardrails::{ActionGate, GateDecision};
pub use operations::{builtin_registry, default_catalogue, load_store};
pub use runtime::{Attachments, Execution, Interpretation, Session, Turn};
pub use translator::LexiconTranslator;
