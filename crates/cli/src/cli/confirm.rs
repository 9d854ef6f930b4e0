//! Terminal prompt for tools that change the machine.

use std::io::Write;

use cl_agent::{ConfirmDecision, ConfirmRequest, Confirmer};

/// Asks on stderr and reads the answer from stdin.
pub struct TerminalConfirmer;

#[async_trait::async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, request: &ConfirmRequest) -> ConfirmDecision {
        let prompt = format!(
            "\n\x1B[33m{}: {}\x1B[0m\n  [y]es / [a]lways for this kind / [A]ll / [n]o (or type feedback): ",
            request.operation, request.target
        );
        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{prompt}");
            std::io::stderr().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not read confirmation");
                ConfirmDecision::Denied { reason: None }
            }
            Err(e) => {
                tracing::warn!(error = %e, "confirmation prompt failed");
                ConfirmDecision::Denied { reason: None }
            }
        }
    }
}

/// Anything not recognized is denial feedback for the model. An empty
/// answer (or EOF) denies.
fn parse_answer(line: &str) -> ConfirmDecision {
    match line.trim() {
        "y" | "Y" | "yes" => ConfirmDecision::Approved,
        "a" | "always" => ConfirmDecision::ApprovedForKind,
        "A" | "all" => ConfirmDecision::ApprovedAll,
        "" | "n" | "N" | "no" => ConfirmDecision::Denied { reason: None },
        feedback => ConfirmDecision::Denied {
            reason: Some(format!("Denied by user: {feedback}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_map_to_decisions() {
        assert_eq!(parse_answer("y\n"), ConfirmDecision::Approved);
        assert_eq!(parse_answer(" a \n"), ConfirmDecision::ApprovedForKind);
        assert_eq!(parse_answer("A\n"), ConfirmDecision::ApprovedAll);
        assert_eq!(parse_answer(""), ConfirmDecision::Denied { reason: None });
        assert_eq!(
            parse_answer("use cargo clean instead\n"),
            ConfirmDecision::Denied {
                reason: Some("Denied by user: use cargo clean instead".into())
            }
        );
    }
}
