//! 外部命令执行：完整缓冲 stdout/stderr 后返回，退出码 0 即成功
//!
//! 非零退出不是 `Err`；进程无法启动时退出码记为 -1，原因写入 stderr。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::heal::{FailureContext, HealOutcome, Healer};

/// 一次执行的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn spawn_failure(reason: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: reason.into(),
        }
    }
}

/// 执行抽象；测试中用假实现计数
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, tool: &str, args: &str, cwd: &Path) -> RunOutput;
}

/// 按空白拆分参数，双引号内的空白保留（引号本身去掉）
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for c in args.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    out.push(std::mem::take(&mut cur));
                    has_token = false;
                }
            }
            c => {
                cur.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        out.push(cur);
    }
    out
}

/// 真实进程执行（tokio::process）
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, tool: &str, args: &str, cwd: &Path) -> RunOutput {
        tracing::info!(tool = %tool, args = %args, cwd = %cwd.display(), "run");
        let output = Command::new(tool)
            .args(split_args(args))
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await;
        match output {
            Ok(o) => {
                let out = RunOutput {
                    exit_code: o.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&o.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&o.stderr).to_string(),
                };
                if !out.success() {
                    tracing::warn!(tool = %tool, exit = out.exit_code, "command failed");
                }
                out
            }
            Err(e) => {
                tracing::warn!(tool = %tool, error = %e, "spawn failed");
                RunOutput::spawn_failure(format!("Failed to spawn '{}': {}", tool, e))
            }
        }
    }
}

/// 带自愈的执行：失败后交给 Healer，至多重跑一次
pub struct HealingRunner {
    runner: Arc<dyn CommandRunner>,
    healer: Arc<Healer>,
}

impl HealingRunner {
    pub fn new(runner: Arc<dyn CommandRunner>, healer: Arc<Healer>) -> Self {
        Self { runner, healer }
    }

    pub async fn run(&self, tool: &str, args: &str, cwd: &Path) -> RunOutput {
        self.runner.run(tool, args, cwd).await
    }

    /// 返回最后一次执行的结果
    pub async fn run_with_heal(&self, tool: &str, args: &str, cwd: &Path, context: &str) -> RunOutput {
        let first = self.runner.run(tool, args, cwd).await;
        if first.success() {
            return first;
        }
        let failure = FailureContext {
            tool: tool.to_string(),
            args: args.to_string(),
            cwd: PathBuf::from(cwd),
            context: context.to_string(),
            stdout: first.stdout.clone(),
            stderr: first.stderr.clone(),
        };
        match self.healer.try_heal(&failure).await {
            HealOutcome::Retry { args: new_args, action } => {
                tracing::info!(tool = %tool, action = %action, args = %new_args, "heal: retrying once");
                self.runner.run(tool, &new_args, cwd).await
            }
            HealOutcome::Advisory(note) => {
                tracing::info!(tool = %tool, note = %note, "heal: advisory only");
                first
            }
            HealOutcome::NoFix => {
                tracing::info!(tool = %tool, context = %context, "heal: no known fix");
                first
            }
        }
    }
}
