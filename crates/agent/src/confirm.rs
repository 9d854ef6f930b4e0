//! Confirmation gating for tools that change the machine.
//!
//! `bash`, `create_file`, and `str_replace_editor` ask a [`Confirmer`]
//! before they run. An approval can cover one call, every later call of the
//! same kind, or everything, for the lifetime of the gate. A denial becomes
//! a failed tool result; the round goes on.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Bash,
    FileWrite,
}

impl OperationKind {
    fn denied_reason(self) -> &'static str {
        match self {
            Self::Bash => "Command execution cancelled by user",
            Self::FileWrite => "File operation cancelled by user",
        }
    }
}

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub kind: OperationKind,
    pub tool: String,
    /// Short human label, e.g. "Run bash command".
    pub operation: &'static str,
    /// The command or path the tool will touch.
    pub target: String,
}

impl ConfirmRequest {
    /// The request for `tool`, or `None` when the tool needs no approval.
    pub fn for_call(tool: &str, args: &Value) -> Option<Self> {
        let field = |key: &str| args.get(key).and_then(Value::as_str).unwrap_or_default().to_owned();
        let (kind, operation, target) = match tool {
            "bash" => (OperationKind::Bash, "Run bash command", field("command")),
            "create_file" => (OperationKind::FileWrite, "Create file", field("path")),
            "str_replace_editor" => (OperationKind::FileWrite, "Edit file", field("path")),
            _ => return None,
        };
        Some(Self {
            kind,
            tool: tool.to_owned(),
            operation,
            target,
        })
    }
}

/// The decision made by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmDecision {
    Approved,
    /// Approve this and every later operation of the same kind.
    ApprovedForKind,
    /// Approve everything from now on.
    ApprovedAll,
    Denied { reason: Option<String> },
}

/// Asks the user about one operation. Called inline by the dispatcher, so
/// the turn waits for the answer.
#[async_trait::async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmRequest) -> ConfirmDecision;
}

/// Approves everything without asking.
pub struct AutoApprove;

#[async_trait::async_trait]
impl Confirmer for AutoApprove {
    async fn confirm(&self, _request: &ConfirmRequest) -> ConfirmDecision {
        ConfirmDecision::Approved
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct Approvals {
    kinds: HashSet<OperationKind>,
    all: bool,
}

/// A [`Confirmer`] plus the standing approvals of one conversation.
pub struct ConfirmationGate {
    confirmer: Arc<dyn Confirmer>,
    approvals: Mutex<Approvals>,
}

impl ConfirmationGate {
    pub fn new(confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            confirmer,
            approvals: Mutex::new(Approvals::default()),
        }
    }

    /// `Err` carries the failure text handed back to the model.
    pub async fn check(&self, request: &ConfirmRequest) -> Result<(), String> {
        {
            let approvals = self.approvals.lock();
            if approvals.all || approvals.kinds.contains(&request.kind) {
                return Ok(());
            }
        }

        let decision = self.confirmer.confirm(request).await;
        tracing::info!(tool = %request.tool, target = %request.target, ?decision, "confirmation");
        match decision {
            ConfirmDecision::Approved => Ok(()),
            ConfirmDecision::ApprovedForKind => {
                self.approvals.lock().kinds.insert(request.kind);
                Ok(())
            }
            ConfirmDecision::ApprovedAll => {
                self.approvals.lock().all = true;
                Ok(())
            }
            ConfirmDecision::Denied { reason } => {
                Err(reason.unwrap_or_else(|| request.kind.denied_reason().to_owned()))
            }
        }
    }

    /// Forget standing approvals.
    pub fn reset(&self) {
        *self.approvals.lock() = Approvals::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Answers {
        queue: Mutex<VecDeque<ConfirmDecision>>,
        asked: Mutex<Vec<ConfirmRequest>>,
    }

    #[async_trait::async_trait]
    impl Confirmer for Answers {
        async fn confirm(&self, request: &ConfirmRequest) -> ConfirmDecision {
            self.asked.lock().push(request.clone());
            self.queue.lock().pop_front().unwrap_or(ConfirmDecision::Denied { reason: None })
        }
    }

    fn gate(answers: Vec<ConfirmDecision>) -> (ConfirmationGate, Arc<Answers>) {
        let confirmer = Arc::new(Answers {
            queue: Mutex::new(answers.into()),
            ..Default::default()
        });
        (ConfirmationGate::new(confirmer.clone()), confirmer)
    }

    fn bash(cmd: &str) -> ConfirmRequest {
        ConfirmRequest::for_call("bash", &json!({ "command": cmd })).unwrap()
    }

    fn write(path: &str) -> ConfirmRequest {
        ConfirmRequest::for_call("create_file", &json!({ "path": path, "content": "" })).unwrap()
    }

    #[test]
    fn only_mutating_tools_need_approval() {
        assert_eq!(bash("ls").target, "ls");
        assert_eq!(bash("ls").kind, OperationKind::Bash);
        let edit = ConfirmRequest::for_call("str_replace_editor", &json!({"path": "a.rs"})).unwrap();
        assert_eq!(edit.kind, OperationKind::FileWrite);
        assert!(ConfirmRequest::for_call("view_file", &json!({"path": "a.rs"})).is_none());
        assert!(ConfirmRequest::for_call("search", &json!({})).is_none());
    }

    #[tokio::test]
    async fn single_approval_asks_again_next_time() {
        let (gate, answers) = gate(vec![ConfirmDecision::Approved, ConfirmDecision::Approved]);
        assert!(gate.check(&bash("ls")).await.is_ok());
        assert!(gate.check(&bash("pwd")).await.is_ok());
        assert_eq!(answers.asked.lock().len(), 2);
    }

    #[tokio::test]
    async fn kind_approval_covers_only_that_kind() {
        let (gate, answers) = gate(vec![ConfirmDecision::ApprovedForKind]);
        assert!(gate.check(&bash("ls")).await.is_ok());
        assert!(gate.check(&bash("cargo fmt")).await.is_ok());
        assert_eq!(answers.asked.lock().len(), 1);

        let denied = gate.check(&write("a.txt")).await.unwrap_err();
        assert_eq!(denied, "File operation cancelled by user");
        assert_eq!(answers.asked.lock().len(), 2);
    }

    #[tokio::test]
    async fn approve_all_then_reset() {
        let (gate, answers) = gate(vec![ConfirmDecision::ApprovedAll]);
        assert!(gate.check(&write("a.txt")).await.is_ok());
        assert!(gate.check(&bash("ls")).await.is_ok());
        assert_eq!(answers.asked.lock().len(), 1);

        gate.reset();
        assert_eq!(gate.check(&bash("ls")).await.unwrap_err(), "Command execution cancelled by user");
    }

    #[tokio::test]
    async fn denial_feedback_is_passed_through() {
        let (gate, _) = gate(vec![ConfirmDecision::Denied {
            reason: Some("use git rm instead".into()),
        }]);
        assert_eq!(gate.check(&bash("rm -rf target")).await.unwrap_err(), "use git rm instead");
    }
}
