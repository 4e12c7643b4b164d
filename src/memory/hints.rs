//! 自愈 hint 日志：每次分类都追加一行 JSON，只写不改

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::memory::repository::Repository;

pub const HINTS_KEY: &str = "healer_hints.jsonl";

/// 一条自愈记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hint {
    pub ts: DateTime<Local>,
    pub context: String,
    pub tool: String,
    pub args: String,
    pub stderr: String,
    pub action: String,
}

/// 按字符截断，超出时追加 " ..."
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str(" ...");
    out
}

pub struct HintLog {
    repo: Arc<dyn Repository>,
    max_stderr_chars: usize,
}

impl HintLog {
    pub fn new(repo: Arc<dyn Repository>, max_stderr_chars: usize) -> Self {
        Self {
            repo,
            max_stderr_chars,
        }
    }

    /// 追加一条记录；写盘失败只记 warn，不影响调用方
    pub fn record(&self, context: &str, tool: &str, args: &str, stderr: &str, action: &str) {
        let hint = Hint {
            ts: Local::now(),
            context: context.to_string(),
            tool: tool.to_string(),
            args: args.to_string(),
            stderr: truncate_chars(stderr, self.max_stderr_chars),
            action: action.to_string(),
        };
        let line = match serde_json::to_string(&hint) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "hint serialize failed");
                return;
            }
        };
        if let Err(e) = self.repo.append(HINTS_KEY, &line) {
            tracing::warn!(error = %e, "hint append failed");
        }
    }

    /// 最近 n 条（跳过无法解析的行）
    pub fn tail(&self, n: usize) -> Vec<Hint> {
        let raw = match self.repo.get(HINTS_KEY) {
            Ok(Some(raw)) => raw,
            _ => return Vec::new(),
        };
        let all: Vec<Hint> = raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        let skip = all.len().saturating_sub(n);
        all.into_iter().skip(skip).collect()
    }
}
