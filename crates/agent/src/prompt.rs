//! System prompt assembly.

use std::path::Path;

/// Build the system prompt for `model`.
///
/// `custom_instructions` comes from the project instructions file and is
/// placed before the tool guidance.
pub fn build_system_prompt(
    model: &str,
    tool_names: &[&str],
    workdir: &Path,
    custom_instructions: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are {model}, an AI coding assistant working in a terminal. You help with \
         file editing, coding tasks, and system operations by calling the tools below.\n"
    );

    if let Some(instructions) = custom_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!(
            "\n=== CUSTOM_INSTRUCTIONS ===\n{instructions}\n=== END_CUSTOM_INSTRUCTIONS ===\n"
        ));
    }

    prompt.push_str("\nAvailable tools:\n");
    for name in tool_names {
        prompt.push_str(&format!("- {name}\n"));
    }

    prompt.push_str(
        "\nGuidelines:\n\
         - Look before you edit: view a file before changing it.\n\
         - Use str_replace_editor for edits to existing files and create_file only for new files.\n\
         - Call tools one step at a time; each result reflects the state after the previous call.\n\
         - When the work is done, answer the user directly with what you found or changed.\n",
    );

    prompt.push_str(&format!("\nCurrent working directory: {}\n", workdir.display()));
    prompt
}

/// Read the optional instructions file. Missing or unreadable files yield
/// `None`; only the latter is logged.
pub fn load_custom_instructions(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read custom instructions");
            None
        }
    }
}
