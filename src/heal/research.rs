//! 联网诊断：失败文本 → 搜索查询 → 抓取页面 → 挖出可执行命令 → 写知识库
//!
//! 网络与解析错误全部在下层吞掉，这里只会得到更少的结果；一无所获时退回离线表。

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::config::ResearchSection;
use crate::memory::{KnowledgeArticle, KnowledgeBase};
use crate::tools::{CommandPolicy, WebSource};

use super::offline;

const FALLBACK_TOKENS: usize = 6;
const SUMMARY_LINES: usize = 60;

/// 诊断接口；Healer 与命令路由只依赖它
#[async_trait]
pub trait Diagnose: Send + Sync {
    async fn diagnose(&self, context: &str, stdout: &str, stderr: &str) -> Vec<KnowledgeArticle>;
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// 由失败文本构造查询；优先级：编译错误码 > HTTP 状态 > 已知签名 > manual: 主题 > 前几个词
pub fn build_query(context: &str, stdout: &str, stderr: &str) -> String {
    static CS: OnceLock<Regex> = OnceLock::new();
    static HTTP: OnceLock<Regex> = OnceLock::new();
    static MANUAL: OnceLock<Regex> = OnceLock::new();
    static WORD: OnceLock<Regex> = OnceLock::new();

    let all = format!("{} {} {}", stderr, stdout, context);
    if let Some(m) = cached(&CS, r"CS\d{4}").find(&all) {
        return format!("{} fix", m.as_str());
    }
    if let Some(m) = cached(&HTTP, r"HTTP\s*\d{3}").find(&all) {
        return format!("{} error fix", m.as_str());
    }
    let lower = all.to_lowercase();
    if lower.contains("only one usage of each socket address") {
        return "kestrel Only one usage of each socket address fix".to_string();
    }
    if lower.contains("address already in use") {
        return "vite address already in use port fix".to_string();
    }
    if let Some(c) = cached(&MANUAL, r"(?i)^manual:\s*(.+)$").captures(context.trim()) {
        let topic = c[1].trim();
        if !topic.is_empty() {
            return topic.to_string();
        }
    }
    let mut seen = HashSet::new();
    cached(&WORD, r"[A-Za-z][A-Za-z0-9\-\._]{2,}")
        .find_iter(&all)
        .map(|m| m.as_str())
        .filter(|w| seen.insert(w.to_string()))
        .take(FALLBACK_TOKENS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 从页面文本中挖出可执行命令（白名单首词、无控制字符），找不到时给出 `#fix:` 建议
pub fn extract_actions(text: &str, policy: &CommandPolicy, max: usize) -> Vec<String> {
    static DOTNET: OnceLock<Regex> = OnceLock::new();
    static NODE: OnceLock<Regex> = OnceLock::new();
    let dotnet = cached(&DOTNET, r"(?i)\b(dotnet\s+[^\r\n]+)");
    let node = cached(&NODE, r"(?i)\b(npm\s+[^\r\n]+|npx\s+[^\r\n]+)");

    let mut found: Vec<String> = dotnet
        .captures_iter(text)
        .chain(node.captures_iter(text))
        .map(|c| c[1].trim().to_string())
        .filter(|cmd| policy.is_safe(cmd))
        .collect();

    if found.is_empty() {
        if text.contains("CS1513") {
            found.push("#fix: Add missing '}' brace (CS1513)".to_string());
        }
        if text.to_lowercase().contains("address already in use") {
            found.push("#fix: Change dev server port".to_string());
        }
    }

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|a| seen.insert(a.to_lowercase()))
        .take(max)
        .collect()
}

/// 前若干个非空行，总长超限时截断并追加 " …"
pub fn summarize(text: &str, max_chars: usize) -> String {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(SUMMARY_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    let mut out: String = joined.chars().take(max_chars).collect();
    out.push_str(" …");
    out
}

pub struct Researcher {
    web: Arc<dyn WebSource>,
    knowledge: KnowledgeBase,
    policy: CommandPolicy,
    cfg: ResearchSection,
}

impl Researcher {
    pub fn new(
        web: Arc<dyn WebSource>,
        knowledge: KnowledgeBase,
        policy: CommandPolicy,
        cfg: ResearchSection,
    ) -> Self {
        Self {
            web,
            knowledge,
            policy,
            cfg,
        }
    }

    fn save(&self, query: &str, context: &str, articles: &[KnowledgeArticle], offline: bool) {
        if let Err(e) = self.knowledge.save_session(query, context, articles, offline) {
            tracing::warn!(query = %query, error = %e, "knowledge save failed");
        }
    }
}

#[async_trait]
impl Diagnose for Researcher {
    async fn diagnose(&self, context: &str, stdout: &str, stderr: &str) -> Vec<KnowledgeArticle> {
        let query = build_query(context, stdout, stderr);
        if query.trim().is_empty() {
            return Vec::new();
        }
        tracing::info!(query = %query, context = %context, "research started");

        let hits = self.web.search(&query, self.cfg.max_hits).await;
        let mut articles = Vec::new();
        for hit in hits.into_iter().take(self.cfg.max_hits) {
            let Some(text) = self.web.fetch_text(&hit.url).await else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            let actions = extract_actions(&text, &self.policy, self.cfg.max_actions);
            if actions.is_empty() {
                continue;
            }
            articles.push(KnowledgeArticle {
                title: hit.title,
                url: hit.url,
                actions,
                summary: summarize(&text, self.cfg.summary_chars),
            });
        }

        if !articles.is_empty() {
            tracing::info!(query = %query, articles = articles.len(), "research found advice");
            self.save(&query, context, &articles, false);
            return articles;
        }

        let fallback = offline::lookup(&query);
        if fallback.is_empty() {
            tracing::info!(query = %query, "research: nothing found");
        } else {
            tracing::info!(query = %query, "research: using offline table");
            self.save(&query, context, &fallback, true);
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::repository::MemoryRepository;
    use crate::memory::Repository;
    use crate::tools::SearchHit;
    use std::collections::HashMap;

    fn policy() -> CommandPolicy {
        CommandPolicy::new(&["dotnet".to_string(), "npm".to_string(), "npx".to_string()])
    }

    #[test]
    fn test_query_priority_order() {
        assert_eq!(
            build_query("proj:build", "", "Program.cs(12,1): error CS1513: } expected; HTTP 500"),
            "CS1513 fix"
        );
        assert_eq!(build_query("web", "", "got HTTP 404 from server"), "HTTP 404 error fix");
        assert_eq!(
            build_query("web:run", "", "Only one usage of each socket address is normally permitted"),
            "kestrel Only one usage of each socket address fix"
        );
        assert_eq!(
            build_query("vite:dev", "Error: listen EADDRINUSE: address already in use", ""),
            "vite address already in use port fix"
        );
        assert_eq!(build_query("manual: dotnet watch hot reload", "", ""), "dotnet watch hot reload");
    }

    #[test]
    fn test_query_fallback_takes_distinct_words() {
        let q = build_query("ctx", "", "error error: the the missing missing package foo.bar x1 baz qux zed");
        assert_eq!(q, "error the missing package foo.bar baz");
        assert!(build_query("", "", "").is_empty());
        assert!(build_query("", "", "?? 12 !!").is_empty());
    }

    #[test]
    fn test_extract_actions_filters_unsafe_and_dedupes() {
        let text = "Run this:\n  dotnet restore\nthen DOTNET RESTORE\nnpm install vite\nnpx kill-port 5173; rm -rf /\ndotnet build > log.txt\n";
        let actions = extract_actions(text, &policy(), 6);
        assert_eq!(actions, vec!["dotnet restore", "npm install vite"]);
    }

    #[test]
    fn test_extract_actions_falls_back_to_fix_notes() {
        let actions = extract_actions("error CS1513: } expected", &policy(), 6);
        assert_eq!(actions, vec!["#fix: Add missing '}' brace (CS1513)"]);
        assert!(extract_actions("nothing useful", &policy(), 6).is_empty());
    }

    #[test]
    fn test_summary_is_capped() {
        let text = "  first  \n\n second \n".to_string() + &"x".repeat(2000);
        let s = summarize(&text, 100);
        assert!(s.starts_with("first\nsecond\n"));
        assert!(s.ends_with(" …"));
        assert_eq!(s.chars().count(), 102);
    }

    struct FakeWeb {
        hits: Vec<SearchHit>,
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl WebSource for FakeWeb {
        async fn search(&self, _query: &str, take: usize) -> Vec<SearchHit> {
            self.hits.iter().take(take).cloned().collect()
        }

        async fn fetch_text(&self, url: &str) -> Option<String> {
            self.pages.get(url).cloned()
        }
    }

    fn researcher(web: FakeWeb, repo: Arc<dyn Repository>) -> Researcher {
        Researcher::new(
            Arc::new(web),
            KnowledgeBase::new(repo),
            policy(),
            ResearchSection::default(),
        )
    }

    #[tokio::test]
    async fn test_online_advice_is_saved() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let hit = |u: &str| SearchHit {
            title: format!("page {}", u),
            url: u.to_string(),
            snippet: String::new(),
        };
        let mut pages = HashMap::new();
        pages.insert("https://a.example/".to_string(), "To fix it run\ndotnet restore\n".to_string());
        pages.insert("https://b.example/".to_string(), "no commands here".to_string());
        let web = FakeWeb {
            hits: vec![hit("https://a.example/"), hit("https://b.example/"), hit("https://c.example/")],
            pages,
        };
        let r = researcher(web, repo.clone());
        let advice = r.diagnose("proj:build", "", "error NU1101: package missing").await;
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].actions, vec!["dotnet restore"]);
        let saved = repo.list("knowledge/").unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].ends_with("_offline.md"));
    }

    #[tokio::test]
    async fn test_offline_table_when_nothing_found() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let web = FakeWeb {
            hits: Vec::new(),
            pages: HashMap::new(),
        };
        let r = researcher(web, repo.clone());
        let advice = r.diagnose("proj:build", "", "Program.cs(3,2): error CS1513: } expected").await;
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].title, "CS1513: } expected");
        let saved = repo.list("knowledge/").unwrap();
        assert!(saved[0].ends_with("_offline.md"));
    }

    #[tokio::test]
    async fn test_empty_failure_text_yields_nothing() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let web = FakeWeb {
            hits: Vec::new(),
            pages: HashMap::new(),
        };
        let r = researcher(web, repo.clone());
        assert!(r.diagnose("", "", "").await.is_empty());
        assert!(repo.list("knowledge/").unwrap().is_empty());
    }
}
