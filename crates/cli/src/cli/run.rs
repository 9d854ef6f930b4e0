//! `codeloop run`: one-shot execution.
//!
//! Sends a single message, streams the answer to stdout, and exits. Useful
//! for scripting and piping. Nobody is there to answer a prompt, so tools
//! run without confirmation.

use std::path::Path;
use std::sync::Arc;

use cl_domain::chat::StreamingChunk;
use cl_domain::config::Config;

use super::chat::render_chunk;
use crate::bootstrap;

pub async fn run(config: Arc<Config>, workdir: &Path, message: String, json_output: bool) -> anyhow::Result<()> {
    let agent = bootstrap::build_agent(&config, workdir, None).await?;
    let mut rx = agent.process_message_stream(message);

    while let Some(chunk) = rx.recv().await {
        let done = chunk == StreamingChunk::Done;
        if json_output {
            let line = serde_json::to_string(&chunk)
                .map_err(|e| anyhow::anyhow!("serializing chunk: {e}"))?;
            println!("{line}");
        } else {
            render_chunk(&chunk);
        }
        if done {
            break;
        }
    }
    Ok(())
}
