use anyhow::{Context, Result};
use parley_chat::{Attachment, ChatSession, Reply};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::wiring::App;

const QUIT: &str = "/quit";

pub async fn ask(app: &App, assistant_id: &str, message: &str, out: &Path) -> Result<()> {
    let mut session = ChatSession::start(app.api.as_ref(), assistant_id)
        .await
        .context("starting a conversation")?;
    let reply = app.orchestrator.respond(&mut session, message).await?;
    print_reply(&reply, out).await
}

/// Read one question per line from stdin until EOF or `/quit`.
pub async fn chat(app: &App, assistant_id: &str, out: &Path) -> Result<()> {
    let mut session = ChatSession::start(app.api.as_ref(), assistant_id)
        .await
        .context("starting a conversation")?;
    println!("Connected (thread {}). Type {QUIT} to leave.", session.thread_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == QUIT {
            break;
        }

        match app.orchestrator.respond(&mut session, line).await {
            Ok(reply) => print_reply(&reply, out).await?,
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    tracing::info!(thread_id = %session.thread_id, turns = session.history.len() / 2, "chat ended");
    Ok(())
}

async fn print_reply(reply: &Reply, out: &Path) -> Result<()> {
    println!("{}", reply.text);
    for path in save_attachments(out, reply.files.iter().chain(&reply.images)).await? {
        println!("  saved {}", path.display());
    }
    Ok(())
}

/// Write each attachment under `out`, using only the final path component of its name.
async fn save_attachments<'a>(
    out: &Path,
    attachments: impl IntoIterator<Item = &'a Attachment>,
) -> Result<Vec<PathBuf>> {
    let mut saved = Vec::new();
    for attachment in attachments {
        if saved.is_empty() {
            tokio::fs::create_dir_all(out)
                .await
                .with_context(|| format!("creating {}", out.display()))?;
        }
        let name = Path::new(&attachment.name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "attachment".into());
        let path = out.join(name);
        tokio::fs::write(&path, &attachment.bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        saved.push(path);
    }
    Ok(saved)
}
