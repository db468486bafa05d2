//! CareBot 命令行入口
//!
//! 初始化日志与配置，构建编排器，然后逐行读取标准输入作为用户消息。
//! 命令：`/clear` 重置当前对话，`/clear-memory` 清空长期记忆，`/journal <text>` 记日记，
//! `/journal` 查看日记，`/quit` 退出。单轮失败以 `[error]` 前缀输出，不结束会话。

use anyhow::Context;
use carebot::config::load_config;
use carebot::memory::JOURNAL_SAVED;
use carebot::observability;
use carebot::OrchestratorBuilder;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = match load_config(None) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Default::default()
        }
    };
    let session_id = cfg
        .app
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let orchestrator = OrchestratorBuilder::new(cfg)
        .build()
        .context("Failed to build orchestrator")?;
    tracing::info!(session_id = %session_id, "session started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        let output = match input {
            "" => None,
            "/quit" => break,
            "/clear" => {
                orchestrator.sessions().clear_session(&session_id).await;
                Some("Conversation cleared.".to_string())
            }
            "/clear-memory" => Some(match orchestrator.memory().clear_all().await {
                Ok(()) => "Long-term memory cleared.".to_string(),
                Err(e) => format!("[error] {}", e),
            }),
            "/journal" => {
                let entries = orchestrator.journal().entries(&session_id).await;
                if entries.is_empty() {
                    Some("No journal entries yet.".to_string())
                } else {
                    Some(
                        entries
                            .iter()
                            .enumerate()
                            .map(|(i, e)| format!("{}. {}", i + 1, e))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    )
                }
            }
            _ if input.starts_with("/journal ") => {
                let entry = &input["/journal ".len()..];
                Some(match orchestrator.journal().save(&session_id, entry).await {
                    Ok(true) => JOURNAL_SAVED.to_string(),
                    Ok(false) => "Nothing to save.".to_string(),
                    Err(e) => format!("[error] {}", e),
                })
            }
            _ => Some(match orchestrator.handle_turn(&session_id, input).await {
                Ok(reply) => reply.text,
                Err(e) => {
                    tracing::error!(error = %e, "turn failed");
                    format!("[error] {}", e)
                }
            }),
        };
        if let Some(text) = output {
            stdout.write_all(text.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
