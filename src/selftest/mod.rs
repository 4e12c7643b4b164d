//! 自测：轮询生成物的地址，检查页面结构与静态资源，结果写入 learning.jsonl
//!
//! 每项检查各自记一条 note，互不短路；`ok` 只由可达、大小、标题、控件四项决定。

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;

use chrono::Utc;
use reqwest::Client;

use crate::catalog::GeneratorDefinition;
use crate::config::SelfTestSection;
use crate::memory::{LearningEntry, LearningLog};
use crate::tools::RunOutput;

const PROBED_ASSETS: &[&str] = &["style.css", "app.js"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_POLL_BUDGET: Duration = Duration::from_secs(1);

/// 按标题（忽略大小写）要求的控件 id
const REQUIRED_IDS: &[(&str, &[&str])] = &[
    ("calculator", &["a", "b", "op", "calc"]),
    ("timer", &["clock", "start", "stop", "reset"]),
    ("wallet", &["amount", "type", "add", "balance", "list"]),
    ("notes", &["pad"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestResult {
    pub ok: bool,
    pub status: u16,
    pub bytes: usize,
    pub notes: Vec<String>,
}

pub fn required_ids(title: &str) -> &'static [&'static str] {
    let t = title.trim().to_lowercase();
    REQUIRED_IDS
        .iter()
        .find(|(name, _)| *name == t)
        .map(|(_, ids)| *ids)
        .unwrap_or(&[])
}

/// 缺失的控件 id（`id="x"`，忽略大小写）
pub fn missing_ids(html: &str, title: &str) -> Vec<&'static str> {
    let lower = html.to_lowercase();
    required_ids(title)
        .iter()
        .copied()
        .filter(|id| !lower.contains(&format!("id=\"{}\"", id)))
        .collect()
}

fn title_found(html: &str, title: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains(&title.to_lowercase()) || lower.contains("<title>") || lower.contains("<h1")
}

/// style.css 是否带上了主题变量
fn check_style(wwwroot: &Path, notes: &mut Vec<String>) {
    let css = match std::fs::read_to_string(wwwroot.join("style.css")) {
        Ok(css) => css,
        Err(_) => {
            notes.push("style.css: file missing".to_string());
            return;
        }
    };
    if !css.contains(":root") || !css.contains("--accent") {
        notes.push("style: css variables not found".to_string());
    }
    let compact: String = css.chars().filter(|c| !c.is_whitespace()).collect();
    if !compact.contains("font-family:var(--font)") {
        notes.push("style: font var not applied".to_string());
    }
}

pub struct SelfTester {
    client: Client,
    cfg: SelfTestSection,
    log: LearningLog,
}

impl SelfTester {
    pub fn new(cfg: SelfTestSection, log: LearningLog) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, cfg, log }
    }

    fn record(&self, def: &GeneratorDefinition, url: &str, result: &SelfTestResult) {
        let mut keys = vec![def.key.clone()];
        for t in &def.triggers {
            if !keys.iter().any(|k| k.eq_ignore_ascii_case(t)) {
                keys.push(t.clone());
            }
        }
        self.log.record(&LearningEntry {
            ts: Utc::now(),
            title: def.title.clone(),
            keys,
            url: url.to_string(),
            ok: result.ok,
            status: result.status,
            bytes: result.bytes,
            notes: result.notes.clone(),
        });
    }

    /// 整个轮询的时间上限：attempts × delay_ms，至少 1 秒
    fn poll_budget(&self) -> Duration {
        Duration::from_millis(u64::from(self.cfg.attempts) * self.cfg.delay_ms).max(MIN_POLL_BUDGET)
    }

    /// 轮询直到拿到成功响应；返回 (状态码, 正文) 或最后一次非成功状态
    async fn poll(&self, url: &str) -> Result<(u16, String), Option<u16>> {
        let deadline = Instant::now() + self.poll_budget();
        let mut last_status = None;
        for attempt in 0..self.cfg.attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(url = %url, attempt, "self-test poll budget spent");
                break;
            }
            match self.client.get(url).timeout(remaining.min(REQUEST_TIMEOUT)).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::debug!(url = %url, attempt, "host responded");
                    return Ok((status, body));
                }
                Ok(resp) => last_status = Some(resp.status().as_u16()),
                Err(_) => {}
            }
            tokio::time::sleep(Duration::from_millis(self.cfg.delay_ms)).await;
        }
        Err(last_status)
    }

    async fn probe_asset(&self, base: &str, wwwroot: &Path, name: &str, notes: &mut Vec<String>) {
        if !wwwroot.join(name).exists() {
            notes.push(format!("{}: file missing in wwwroot", name));
            return;
        }
        match self.client.get(format!("{}{}", base, name)).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => notes.push(format!("{}: HTTP {}", name, resp.status().as_u16())),
            Err(_) => notes.push(format!("{}: request failed", name)),
        }
    }

    /// 检查托管在 `url` 的页面；wwwroot 是它的静态文件目录
    pub async fn evaluate(&self, url: &str, def: &GeneratorDefinition, wwwroot: &Path) -> SelfTestResult {
        let base = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        };

        let (status, html) = match self.poll(&base).await {
            Ok(found) => found,
            Err(last) => {
                let mut notes = vec!["Host not responding".to_string()];
                if let Some(s) = last {
                    notes.push(format!("HTTP {}", s));
                }
                let result = SelfTestResult {
                    ok: false,
                    status: 0,
                    bytes: 0,
                    notes,
                };
                self.record(def, &base, &result);
                return result;
            }
        };

        let mut notes = Vec::new();
        let bytes = html.len();
        if status != 200 {
            notes.push(format!("HTTP {}", status));
        }
        if bytes < self.cfg.min_bytes {
            notes.push("HTML too small".to_string());
        }
        let title_hit = title_found(&html, &def.title);
        if !title_hit {
            notes.push("Title/H1 not found".to_string());
        }
        let missing = missing_ids(&html, &def.title);
        if !missing.is_empty() {
            let list: Vec<String> = missing.iter().map(|id| format!("#{}", id)).collect();
            notes.push(format!(
                "{}: UI controls missing ({})",
                def.title.to_lowercase(),
                list.join(", ")
            ));
        }
        check_style(wwwroot, &mut notes);
        for asset in PROBED_ASSETS {
            self.probe_asset(&base, wwwroot, asset, &mut notes).await;
        }

        let result = SelfTestResult {
            ok: status == 200 && bytes >= self.cfg.min_bytes && title_hit && missing.is_empty(),
            status,
            bytes,
            notes,
        };
        self.record(def, &base, &result);
        result
    }

    /// 控制台产物：退出码 0，且输出包含期望文本（忽略大小写）；没有期望时输出非空即可
    pub fn evaluate_console(&self, def: &GeneratorDefinition, run: &RunOutput, expected: Option<&str>) -> SelfTestResult {
        let stdout = run.stdout.trim();
        let mut notes = Vec::new();
        if !run.success() {
            notes.push(format!("exit code {}", run.exit_code));
        }
        let output_ok = match expected {
            Some(text) => {
                let hit = stdout.to_lowercase().contains(&text.to_lowercase());
                if !hit {
                    notes.push(format!("expected output not found: {}", text));
                }
                hit
            }
            None => {
                if stdout.is_empty() {
                    notes.push("empty output".to_string());
                }
                !stdout.is_empty()
            }
        };
        let result = SelfTestResult {
            ok: run.success() && output_ok,
            status: 0,
            bytes: stdout.len(),
            notes,
        };
        self.record(def, "console", &result);
        result
    }
}
