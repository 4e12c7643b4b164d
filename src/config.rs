//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MASON__*` 覆盖（双下划线表示嵌套，如 `MASON__PANEL__PORT=9000`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub panel: PanelSection,
    #[serde(default)]
    pub toolchain: ToolchainSection,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub healer: HealerSection,
    #[serde(default)]
    pub research: ResearchSection,
    #[serde(default)]
    pub selftest: SelfTestSection,
}

/// [app] 段：工作目录、收件箱轮询间隔
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// 工作区根目录，未设置时用 ./Projects/Workspace
    pub workspace_root: Option<PathBuf>,
    /// 收件箱为空时的休眠间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            workspace_root: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// [panel] 段：控制面板监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct PanelSection {
    #[serde(default = "default_panel_host")]
    pub host: String,
    #[serde(default = "default_panel_port")]
    pub port: u16,
}

impl Default for PanelSection {
    fn default() -> Self {
        Self {
            host: default_panel_host(),
            port: default_panel_port(),
        }
    }
}

fn default_panel_host() -> String {
    "127.0.0.1".to_string()
}

fn default_panel_port() -> u16 {
    8765
}

/// [toolchain] 段：构建/运行生成物所用的外部程序与端口
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainSection {
    #[serde(default = "default_program")]
    pub program: String,
    /// 生成的 Web 宿主首选端口
    #[serde(default = "default_web_port")]
    pub default_port: u16,
    /// 从首选端口往上探测的次数，用尽后交给系统分配
    #[serde(default = "default_port_scan_attempts")]
    pub port_scan_attempts: u16,
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            default_port: default_web_port(),
            port_scan_attempts: default_port_scan_attempts(),
        }
    }
}

fn default_program() -> String {
    "dotnet".to_string()
}

fn default_web_port() -> u16 {
    5173
}

fn default_port_scan_attempts() -> u16 {
    50
}

/// [resolver] 段：相似度阈值
///
/// `persist_threshold` 决定相似度命中时是否立即写入同义词缓存；默认等于 okay 阈值。
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSection {
    #[serde(default = "default_strong_threshold")]
    pub strong_threshold: f64,
    #[serde(default = "default_okay_threshold")]
    pub okay_threshold: f64,
    #[serde(default = "default_okay_threshold")]
    pub persist_threshold: f64,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            strong_threshold: default_strong_threshold(),
            okay_threshold: default_okay_threshold(),
            persist_threshold: default_okay_threshold(),
        }
    }
}

fn default_strong_threshold() -> f64 {
    0.42
}

fn default_okay_threshold() -> f64 {
    0.28
}

/// [healer] 段：允许执行的「安全」命令（仅首词）与依赖恢复类命令
#[derive(Debug, Clone, Deserialize)]
pub struct HealerSection {
    #[serde(default = "default_safe_tools")]
    pub safe_tools: Vec<String>,
    /// 成功后可以直接重试原命令的命令前缀
    #[serde(default = "default_restore_commands")]
    pub restore_commands: Vec<String>,
    #[serde(default = "default_force_flag")]
    pub force_flag: String,
    /// 写入 hint 日志的 stderr 最大字符数
    #[serde(default = "default_hint_stderr_chars")]
    pub hint_stderr_chars: usize,
}

impl Default for HealerSection {
    fn default() -> Self {
        Self {
            safe_tools: default_safe_tools(),
            restore_commands: default_restore_commands(),
            force_flag: default_force_flag(),
            hint_stderr_chars: default_hint_stderr_chars(),
        }
    }
}

fn default_safe_tools() -> Vec<String> {
    vec!["dotnet".into(), "npm".into(), "npx".into()]
}

fn default_restore_commands() -> Vec<String> {
    vec!["dotnet restore".into(), "npm install".into(), "npm ci".into()]
}

fn default_force_flag() -> String {
    "--force".to_string()
}

fn default_hint_stderr_chars() -> usize {
    800
}

/// [research] 段：联网诊断的超时、结果数量与各类截断上限
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchSection {
    #[serde(default = "default_research_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_hits")]
    pub max_hits: usize,
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
    /// 追加 `site:` 的查询变体
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_research_timeout_secs(),
            max_hits: default_max_hits(),
            max_page_chars: default_max_page_chars(),
            summary_chars: default_summary_chars(),
            max_actions: default_max_actions(),
            sites: default_sites(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_research_timeout_secs() -> u64 {
    25
}

fn default_max_hits() -> usize {
    6
}

fn default_max_page_chars() -> usize {
    120_000
}

fn default_summary_chars() -> usize {
    900
}

fn default_max_actions() -> usize {
    6
}

fn default_sites() -> Vec<String> {
    vec!["stackoverflow.com".into(), "learn.microsoft.com".into()]
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string()
}

/// [selftest] 段：轮询次数、间隔与最小响应体
#[derive(Debug, Clone, Deserialize)]
pub struct SelfTestSection {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_min_bytes")]
    pub min_bytes: usize,
}

impl Default for SelfTestSection {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
            min_bytes: default_min_bytes(),
        }
    }
}

fn default_attempts() -> u32 {
    40
}

fn default_delay_ms() -> u64 {
    250
}

fn default_min_bytes() -> usize {
    50
}

/// 从 config 目录加载配置，环境变量 MASON__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MASON__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MASON")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
