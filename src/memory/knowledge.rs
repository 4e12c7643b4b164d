//! 知识库：每次联网诊断写成一个 markdown 文件，文件名为时间戳 + 清洗后的查询

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::memory::repository::Repository;

pub const KNOWLEDGE_PREFIX: &str = "knowledge/";

/// 一条诊断建议（标题、来源、可执行动作、摘要）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeArticle {
    pub title: String,
    pub url: String,
    pub actions: Vec<String>,
    pub summary: String,
}

/// 文件名里查询部分的上限，保证整体不超过文件系统的 255 字节
const MAX_QUERY_NAME_CHARS: usize = 80;

/// 文件名用：只保留字母、数字、`-`、`_`，转小写
pub fn safe_file_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

pub struct KnowledgeBase {
    repo: Arc<dyn Repository>,
}

impl KnowledgeBase {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// 渲染一次诊断会话
    pub fn render(query: &str, context: &str, articles: &[KnowledgeArticle], offline: bool) -> String {
        let mut md = String::new();
        if offline {
            md.push_str(&format!("# Research (offline): {}\n", query));
        } else {
            md.push_str(&format!("# Research: {}\n", query));
        }
        md.push_str(&format!("- Context: {}\n", context));
        md.push_str(&format!("- Time: {}\n", Utc::now().format("%Y-%m-%d %H:%M:%SZ")));
        for a in articles {
            md.push_str(&format!("\n## {}\n{}\n\n**Proposed actions:**\n", a.title, a.url));
            for act in &a.actions {
                md.push_str(&format!("- {}\n", act));
            }
            md.push_str(&format!("\n{}\n", a.summary));
        }
        md
    }

    /// 保存会话，返回写入的 key；空会话不落盘
    pub fn save_session(
        &self,
        query: &str,
        context: &str,
        articles: &[KnowledgeArticle],
        offline: bool,
    ) -> Result<Option<String>> {
        if articles.is_empty() {
            return Ok(None);
        }
        let suffix = if offline { "_offline" } else { "" };
        let key = format!(
            "{}{}_{}{}.md",
            KNOWLEDGE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            safe_file_name(query).chars().take(MAX_QUERY_NAME_CHARS).collect::<String>(),
            suffix
        );
        self.repo
            .put(&key, &Self::render(query, context, articles, offline))?;
        tracing::info!(key = %key, offline, "research saved");
        Ok(Some(key))
    }

    /// 最新的 n 个文件名（时间戳前缀保证字典序即时间序）
    pub fn latest(&self, n: usize) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .repo
            .list(KNOWLEDGE_PREFIX)?
            .into_iter()
            .filter(|k| k.ends_with(".md"))
            .collect();
        keys.sort_by(|a, b| b.cmp(a));
        keys.truncate(n);
        Ok(keys
            .into_iter()
            .map(|k| k.trim_start_matches(KNOWLEDGE_PREFIX).to_string())
            .collect())
    }
}
