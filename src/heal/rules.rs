//! 自愈规则表：有序的 (判定, 动作) 列表，首个生效的动作决定结果
//!
//! 判定是纯函数，只看失败上下文；动作由 `Healer::apply` 按 `RuleKind` 分派。

use std::sync::OnceLock;

use regex::Regex;

use super::FailureContext;

/// 规则判定需要的配置
pub struct RuleEnv<'a> {
    pub force_flag: &'a str,
    pub program: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// 模板目标已存在：追加强制参数重试
    ForceOverwrite,
    /// 缺少 Node.js 等运行时：仅提示
    MissingRuntime,
    /// 缺少 SDK / 目标框架：仅提示
    MissingSdk,
    /// 构建失败：先恢复依赖，成功则原样重试
    RestoreThenRetry,
    /// 「创建应用」类上下文：顺手学习生成器 key，不影响结果
    LearnGenerator,
    /// 端口被占用：换空闲端口重试
    PortInUse,
    /// 兜底：联网诊断并执行至多一条安全命令
    WebResearch,
}

pub struct HealRule {
    pub name: &'static str,
    pub kind: RuleKind,
    pub matches: fn(&FailureContext, &RuleEnv) -> bool,
}

fn target_exists(f: &FailureContext, env: &RuleEnv) -> bool {
    (f.stderr.contains("templating-exit-codes#73")
        || f.stderr.contains("Creating this template will make changes to existing files"))
        && !f.args.contains(env.force_flag)
}

fn runtime_missing(f: &FailureContext, _env: &RuleEnv) -> bool {
    f.context.starts_with("vite:")
        && (f.stderr.contains("'node' is not recognized")
            || f.stderr.contains("not recognized as an internal or external command")
            || f.stderr.contains("node: command not found"))
}

fn sdk_missing(f: &FailureContext, _env: &RuleEnv) -> bool {
    f.stderr.contains("The framework") && f.stderr.contains("was not found")
}

fn build_failed(f: &FailureContext, env: &RuleEnv) -> bool {
    f.tool.eq_ignore_ascii_case(env.program) && f.args.trim_start().starts_with("build")
}

fn create_intent(f: &FailureContext, _env: &RuleEnv) -> bool {
    static RX: OnceLock<Regex> = OnceLock::new();
    let rx = RX.get_or_init(|| Regex::new(r"(?i)(create|створ|зроби)").expect("static regex"));
    f.context.starts_with("proj:new") || rx.is_match(&f.context)
}

pub fn port_in_use(f: &FailureContext, _env: &RuleEnv) -> bool {
    let text = format!("{}\n{}", f.stderr, f.stdout);
    text.to_lowercase().contains("address already in use")
        || text.contains("Only one usage of each socket address")
}

fn always(_f: &FailureContext, _env: &RuleEnv) -> bool {
    true
}

/// 默认规则顺序
pub fn default_rules() -> Vec<HealRule> {
    vec![
        HealRule {
            name: "target-exists",
            kind: RuleKind::ForceOverwrite,
            matches: target_exists,
        },
        HealRule {
            name: "runtime-missing",
            kind: RuleKind::MissingRuntime,
            matches: runtime_missing,
        },
        HealRule {
            name: "sdk-missing",
            kind: RuleKind::MissingSdk,
            matches: sdk_missing,
        },
        HealRule {
            name: "build-failed",
            kind: RuleKind::RestoreThenRetry,
            matches: build_failed,
        },
        HealRule {
            name: "create-intent",
            kind: RuleKind::LearnGenerator,
            matches: create_intent,
        },
        HealRule {
            name: "port-in-use",
            kind: RuleKind::PortInUse,
            matches: port_in_use,
        },
        HealRule {
            name: "web-research",
            kind: RuleKind::WebResearch,
            matches: always,
        },
    ]
}
