//! Rough context-size estimate surfaced as `token_count` chunks.

use cl_domain::tool::Message;

/// Characters per token assumed by the estimate.
const CHARS_PER_TOKEN: usize = 4;

/// Per-message framing overhead (role, separators), in tokens.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count of `messages` as sent to the model.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| {
            let chars = m.content.chars().count()
                + m.tool_calls
                    .iter()
                    .map(|c| c.name.len() + c.arguments.chars().count())
                    .sum::<usize>();
            chars.div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_domain::tool::ToolCallRequest;

    #[test]
    fn empty_conversation_is_zero() {
        assert_eq!(estimate_tokens(&[]), 0);
    }

    #[test]
    fn counts_content_and_tool_calls() {
        let msgs = vec![
            Message::user("12345678"),
            Message::assistant_with_tools("", vec![ToolCallRequest::new("c", "bash", "{}")]),
        ];
        // 8 chars -> 2, "bash{}" 6 chars -> 2, plus overhead per message.
        assert_eq!(estimate_tokens(&msgs), 2 + 4 + 2 + 4);
    }
}
