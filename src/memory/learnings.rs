//! 学习日志：自测结果写入 learning.jsonl，控制面板收到的命令写入 logs/history.jsonl
//!
//! 两者都是只追加的 JSON Lines；写盘失败只记日志，不影响命令循环。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::repository::Repository;

pub const LEARNING_KEY: &str = "learning.jsonl";
pub const HISTORY_KEY: &str = "logs/history.jsonl";

/// 一次自测的记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEntry {
    pub ts: DateTime<Utc>,
    pub title: String,
    pub keys: Vec<String>,
    pub url: String,
    pub ok: bool,
    pub status: u16,
    pub bytes: usize,
    pub notes: Vec<String>,
}

/// 一条收到的命令
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub cmd: String,
}

fn append_json<T: Serialize>(repo: &dyn Repository, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => {
            if let Err(e) = repo.append(key, &line) {
                tracing::warn!(key = %key, error = %e, "append failed");
            }
        }
        Err(e) => tracing::warn!(key = %key, error = %e, "serialize failed"),
    }
}

fn read_lines<T: for<'de> Deserialize<'de>>(repo: &dyn Repository, key: &str) -> Vec<T> {
    match repo.get(key) {
        Ok(Some(raw)) => raw
            .lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect(),
        _ => Vec::new(),
    }
}

pub struct LearningLog {
    repo: Arc<dyn Repository>,
}

impl LearningLog {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub fn record(&self, entry: &LearningEntry) {
        append_json(self.repo.as_ref(), LEARNING_KEY, entry);
        tracing::info!(
            title = %entry.title,
            url = %entry.url,
            ok = entry.ok,
            "self-test {}",
            if entry.ok { "OK" } else { "FAIL" }
        );
        if !entry.notes.is_empty() {
            tracing::info!(notes = %entry.notes.join(" | "), "self-test notes");
        }
    }

    pub fn entries(&self) -> Vec<LearningEntry> {
        read_lines(self.repo.as_ref(), LEARNING_KEY)
    }
}

pub struct HistoryLog {
    repo: Arc<dyn Repository>,
}

impl HistoryLog {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub fn record(&self, cmd: &str) {
        let entry = HistoryEntry {
            ts: Utc::now(),
            cmd: cmd.to_string(),
        };
        append_json(self.repo.as_ref(), HISTORY_KEY, &entry);
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        read_lines(self.repo.as_ref(), HISTORY_KEY)
    }
}
