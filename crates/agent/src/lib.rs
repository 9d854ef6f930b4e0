//! The codeloop agent core.
//!
//! A user turn streams a model response, folds its deltas into a message
//! ([`reducer`]), repairs the tool calls it names ([`sanitize`]), runs
//! them one at a time ([`dispatch`]), and loops until the model answers
//! without tools or the round limit is hit ([`round`]). [`Agent`] is the
//! facade the CLI drives.

pub mod agent;
pub mod binding;
pub mod cancel;
pub mod confirm;
pub mod conversation;
pub mod dispatch;
pub mod prompt;
pub mod reducer;
pub mod restore;
pub mod round;
pub mod sanitize;
pub mod summary;
pub mod tokens;

pub use agent::{Agent, AgentParts};
pub use binding::{initial_binding, ModelBinding, TransportFactory};
pub use cancel::CancelToken;
pub use confirm::{AutoApprove, ConfirmDecision, ConfirmRequest, ConfirmationGate, Confirmer, OperationKind};
pub use conversation::Conversation;
pub use dispatch::{ExecutionMonitor, ToolDispatcher, TraceStage};
pub use round::{TurnOutcome, TurnSettings, CANCEL_MARKER, ROUND_LIMIT_NOTICE};
