//! 网页搜索与抓取：多个搜索后端（抓取 HTML 结果页）+ 页面正文提取
//!
//! 后端解析是纯函数，匹配不到时返回空列表；网络错误一律记日志后吞掉。

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;

use crate::config::ResearchSection;

const SNIPPET_WINDOW: usize = 350;
const SNIPPET_CHARS: usize = 220;
const RELATED_CHARS: usize = 200;

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// 属性值里的常见实体
pub fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// 片段转纯文本：去标签、解实体、折叠空白
pub fn fragment_text(html: &str) -> String {
    let text = match from_read(html.as_bytes(), 10_000) {
        Ok(t) => t,
        Err(_) => {
            static TAGS: OnceLock<Regex> = OnceLock::new();
            decode_entities(&cached(&TAGS, r"<[^>]+>").replace_all(html, " "))
        }
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 按字符截断，超出时追加 " …"
fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str(" …");
    out
}

/// 向下对齐到字符边界
fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// 命中位置前后各取一段，转文本后截断
fn snippet_around(html: &str, idx: usize) -> String {
    let start = floor_boundary(html, idx.saturating_sub(SNIPPET_WINDOW));
    let end = floor_boundary(html, idx + SNIPPET_WINDOW);
    clip(&fragment_text(&html[start..end]), SNIPPET_CHARS)
}

/// 广告跳转、内部脚本等无用链接
pub fn is_bad_url(url: &str) -> bool {
    let u = url.trim();
    u.is_empty()
        || u.to_lowercase().starts_with("about:")
        || u.contains("duckduckgo.com/y.js")
        || u.contains("/r.js")
}

/// 搜索后端：给出结果页 URL，并从结果页 HTML 中解析命中
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn search_url(&self, query: &str) -> String;
    fn parse(&self, html: &str, page_url: &str) -> Vec<SearchHit>;
}

pub struct DuckDuckGoHtml;

impl SearchBackend for DuckDuckGoHtml {
    fn name(&self) -> &'static str {
        "duckduckgo-html"
    }

    fn search_url(&self, query: &str) -> String {
        format!("https://duckduckgo.com/html/?q={}", urlencoding::encode(query))
    }

    fn parse(&self, html: &str, _page_url: &str) -> Vec<SearchHit> {
        static RX: OnceLock<Regex> = OnceLock::new();
        let rx = cached(
            &RX,
            r#"(?is)<a[^>]*class="result__a"[^>]*href="(?P<u>https?://[^"]+)"[^>]*>(?P<t>.*?)</a>"#,
        );
        rx.captures_iter(html)
            .filter_map(|c| {
                let whole = c.get(0)?;
                let url = decode_entities(&c["u"]);
                if is_bad_url(&url) {
                    return None;
                }
                Some(SearchHit {
                    title: fragment_text(&c["t"]),
                    url,
                    snippet: snippet_around(html, whole.start()),
                })
            })
            .collect()
    }
}

pub struct DuckDuckGoLite;

impl SearchBackend for DuckDuckGoLite {
    fn name(&self) -> &'static str {
        "duckduckgo-lite"
    }

    fn search_url(&self, query: &str) -> String {
        format!("https://lite.duckduckgo.com/lite/?q={}", urlencoding::encode(query))
    }

    fn parse(&self, html: &str, _page_url: &str) -> Vec<SearchHit> {
        static RX: OnceLock<Regex> = OnceLock::new();
        let rx = cached(&RX, r#"(?is)<a[^>]*href="(?P<u>https?://[^"]+)"[^>]*>(?P<t>.*?)</a>"#);
        rx.captures_iter(html)
            .filter_map(|c| {
                let url = decode_entities(&c["u"]);
                let title = fragment_text(&c["t"]);
                if is_bad_url(&url) || title.is_empty() {
                    return None;
                }
                Some(SearchHit {
                    title,
                    url,
                    snippet: String::new(),
                })
            })
            .collect()
    }
}

pub struct Bing;

impl SearchBackend for Bing {
    fn name(&self) -> &'static str {
        "bing"
    }

    fn search_url(&self, query: &str) -> String {
        format!("https://www.bing.com/search?q={}", urlencoding::encode(query))
    }

    fn parse(&self, html: &str, page_url: &str) -> Vec<SearchHit> {
        static LI: OnceLock<Regex> = OnceLock::new();
        static A: OnceLock<Regex> = OnceLock::new();
        static P: OnceLock<Regex> = OnceLock::new();
        static ANS: OnceLock<Regex> = OnceLock::new();
        let li_rx = cached(&LI, r#"(?is)<li[^>]*class="b_algo"[^>]*>(?P<li>.+?)</li>"#);
        let a_rx = cached(&A, r#"(?is)<h2>\s*<a[^>]*href="(?P<u>https?://[^"]+)"[^>]*>(?P<t>.*?)</a>"#);
        let p_rx = cached(&P, r"(?is)<p[^>]*>(?P<p>.*?)</p>");
        let ans_rx = cached(&ANS, r#"(?is)<div[^>]*class="b_ans"[^>]*>(?P<blk>.+?)</div>"#);

        let mut hits: Vec<SearchHit> = li_rx
            .captures_iter(html)
            .filter_map(|li| {
                let body = li.name("li")?.as_str();
                let a = a_rx.captures(body)?;
                let url = decode_entities(&a["u"]);
                if is_bad_url(&url) {
                    return None;
                }
                let snippet = p_rx
                    .captures(body)
                    .map(|p| fragment_text(&p["p"]))
                    .unwrap_or_default();
                Some(SearchHit {
                    title: fragment_text(&a["t"]),
                    url,
                    snippet,
                })
            })
            .collect();

        // 相关问答块：以结果页本身为链接
        for blk in ans_rx.captures_iter(html) {
            let text = fragment_text(&blk["blk"]);
            if text.chars().count() > 20 {
                hits.push(SearchHit {
                    title: "Related".to_string(),
                    url: page_url.to_string(),
                    snippet: clip(&text, RELATED_CHARS),
                });
            }
        }
        hits
    }
}

/// 按 URL（忽略大小写）去重后加入，超过上限不再加入
pub fn push_unique(list: &mut Vec<SearchHit>, hit: SearchHit, take: usize) {
    if list.len() >= take {
        return;
    }
    if list.iter().any(|h| h.url.eq_ignore_ascii_case(&hit.url)) {
        return;
    }
    list.push(hit);
}

/// 从响应头或页面 meta 中找字符集
pub fn detect_charset(content_type: Option<&str>, head: &[u8]) -> Option<String> {
    static RX: OnceLock<Regex> = OnceLock::new();
    let rx = cached(&RX, r#"(?i)charset\s*=\s*["']?([\w\-]+)"#);
    if let Some(ct) = content_type {
        if let Some(c) = rx.captures(ct) {
            return Some(c[1].to_string());
        }
    }
    let probe = String::from_utf8_lossy(&head[..head.len().min(4096)]);
    rx.captures(&probe).map(|c| c[1].to_string())
}

/// 按字符集解码，未知字符集按 UTF-8
pub fn decode_body(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|c| encoding_rs::Encoding::for_label(c.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// 去掉 script/style/注释后转纯文本
pub fn html_to_text(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    let s = cached(&SCRIPT, r"(?is)<script\b[^>]*>.*?</script>").replace_all(html, "");
    let s = cached(&STYLE, r"(?is)<style\b[^>]*>.*?</style>").replace_all(&s, "");
    let s = cached(&COMMENT, r"(?s)<!--.*?-->").replace_all(&s, "");
    match from_read(s.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => fragment_text(&s),
    }
}

fn truncate(s: String, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s
    }
}

/// 搜索与抓取的来源；诊断逻辑只依赖这个接口
#[async_trait]
pub trait WebSource: Send + Sync {
    async fn search(&self, query: &str, take: usize) -> Vec<SearchHit>;
    /// 页面正文；任何失败返回 None
    async fn fetch_text(&self, url: &str) -> Option<String>;
}

/// 搜索与抓取客户端
pub struct WebClient {
    client: Client,
    backends: Vec<Box<dyn SearchBackend>>,
    sites: Vec<String>,
    max_page_chars: usize,
}

impl WebClient {
    pub fn new(cfg: &ResearchSection) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,uk;q=0.8"));
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            client,
            backends: vec![Box::new(DuckDuckGoHtml), Box::new(DuckDuckGoLite), Box::new(Bing)],
            sites: cfg.sites.clone(),
            max_page_chars: cfg.max_page_chars,
        }
    }

    /// 查询变体：原样、加 site: 限定
    pub fn variants(&self, query: &str) -> Vec<String> {
        std::iter::once(query.to_string())
            .chain(self.sites.iter().map(|s| format!("{} site:{}", query, s)))
            .collect()
    }

    async fn get_string(&self, url: &str) -> Option<String> {
        match self.client.get(url).send().await {
            Ok(resp) => match resp.text().await {
                Ok(body) => Some(body),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "read body failed");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "search request failed");
                None
            }
        }
    }
}

#[async_trait]
impl WebSource for WebClient {
    /// 依次尝试各变体与后端，凑够 take 条即停
    async fn search(&self, query: &str, take: usize) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        'variants: for q in self.variants(query) {
            for backend in &self.backends {
                if hits.len() >= take {
                    break 'variants;
                }
                let url = backend.search_url(&q);
                let Some(html) = self.get_string(&url).await else {
                    continue;
                };
                let found = backend.parse(&html, &url);
                tracing::debug!(backend = backend.name(), query = %q, found = found.len(), "search backend");
                for hit in found {
                    push_unique(&mut hits, hit, take);
                }
            }
        }
        if hits.is_empty() {
            tracing::info!(query = %query, "search: no results");
        }
        hits
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let resp = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "fetch failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::debug!(url = %url, status = %resp.status(), "fetch non-success");
            return None;
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "fetch body failed");
                return None;
            }
        };
        let charset = detect_charset(content_type.as_deref(), &bytes);
        let raw = decode_body(&bytes, charset.as_deref());
        let is_html = content_type
            .as_deref()
            .map_or(false, |ct| ct.to_lowercase().contains("html"));
        let text = if is_html { html_to_text(&raw) } else { raw };
        Some(truncate(text, self.max_page_chars))
    }
}
