//! 命令路由：有序的 (名称, 解析函数) 表，第一个解析成功的决定命令
//!
//! 顺序即优先级，例如含 "console" 的请求永远不会落到建应用分支。

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    /// 最近的自愈 hint
    ShowHints,
    /// 运行当前等级的第一个课程任务
    LearningTask,
    /// 针对主题的手动联网研究
    Learn(String),
    ShowKnowledge,
    /// 用最近 hint 的 stderr 做一次诊断
    Diagnose,
    OpenLast,
    Console(String),
    BuildApp(String),
    FreeForm(String),
    NoHandler,
}

struct Route {
    name: &'static str,
    parse: fn(&str) -> Option<Command>,
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn exit(cmd: &str) -> Option<Command> {
    cmd.trim().eq_ignore_ascii_case("exit").then_some(Command::Exit)
}

fn show_hints(cmd: &str) -> Option<Command> {
    static RX: OnceLock<Regex> = OnceLock::new();
    cached(&RX, r"(?i)^(покажи|show)\s+(навчання|learning|hints)\s*$")
        .is_match(cmd)
        .then_some(Command::ShowHints)
}

fn learning_task(cmd: &str) -> Option<Command> {
    static START: OnceLock<Regex> = OnceLock::new();
    static NEXT: OnceLock<Regex> = OnceLock::new();
    let start = cached(&START, r"(?i)^(почати|старт)\s+навчання$|^(?i:start\s+learning)$");
    let next = cached(&NEXT, r"(?i)^(наступне\s+навчальне\s+завдання|next\s+learning\s+task)$");
    (start.is_match(cmd) || next.is_match(cmd)).then_some(Command::LearningTask)
}

fn learn(cmd: &str) -> Option<Command> {
    static RX: OnceLock<Regex> = OnceLock::new();
    let c = cached(&RX, r"(?i)^(навчайся|learn)\s*:\s*(.+)$").captures(cmd)?;
    Some(Command::Learn(c[2].trim().to_string()))
}

fn show_knowledge(cmd: &str) -> Option<Command> {
    static RX: OnceLock<Regex> = OnceLock::new();
    cached(&RX, r"(?i)^(покажи\s+знання|show\s+knowledge)$")
        .is_match(cmd)
        .then_some(Command::ShowKnowledge)
}

fn diagnose(cmd: &str) -> Option<Command> {
    static RX: OnceLock<Regex> = OnceLock::new();
    cached(&RX, r"(?i)^(діагностуй|diagnose)$")
        .is_match(cmd)
        .then_some(Command::Diagnose)
}

fn open_last(cmd: &str) -> Option<Command> {
    static RX: OnceLock<Regex> = OnceLock::new();
    cached(&RX, r"(?i)^(відкрий.*браузер|open.*browser|open\s+last)\s*$")
        .is_match(cmd)
        .then_some(Command::OpenLast)
}

fn console(cmd: &str) -> Option<Command> {
    let lower = cmd.to_lowercase();
    (lower.contains("консоль") || lower.contains("console")).then(|| Command::Console(cmd.to_string()))
}

fn build_app(cmd: &str) -> Option<Command> {
    static RX: OnceLock<Regex> = OnceLock::new();
    let rx = cached(
        &RX,
        r"(?i)^\s*(?:(?:зроби|створи|create|make)\s+)?(?P<what>[\p{L}0-9\-\s]+?)(?:\s+і\s+запусти\s+у\s+браузері|\s+and\s+run\s+in\s+browser)?\s*$",
    );
    let what = rx.captures(cmd)?.name("what")?.as_str().trim().to_string();
    (!what.is_empty()).then_some(Command::BuildApp(what))
}

fn free_form(cmd: &str) -> Option<Command> {
    static RX: OnceLock<Regex> = OnceLock::new();
    let reserved = cached(&RX, r"(?i)^(exit|show|покажи|build|збери|open|відкрий|init\s+git|git\s+init)\b");
    let what = cmd.trim();
    (what.chars().count() >= 4 && !reserved.is_match(what)).then(|| Command::FreeForm(what.to_string()))
}

const ROUTES: &[Route] = &[
    Route { name: "exit", parse: exit },
    Route { name: "show-hints", parse: show_hints },
    Route { name: "learning-task", parse: learning_task },
    Route { name: "learn", parse: learn },
    Route { name: "show-knowledge", parse: show_knowledge },
    Route { name: "diagnose", parse: diagnose },
    Route { name: "open-last", parse: open_last },
    Route { name: "console", parse: console },
    Route { name: "build-app", parse: build_app },
    Route { name: "free-form", parse: free_form },
];

/// 输入应已经过 `input::normalize`
pub fn route(cmd: &str) -> Command {
    for r in ROUTES {
        if let Some(command) = (r.parse)(cmd) {
            tracing::debug!(route = r.name, "command routed");
            return command;
        }
    }
    Command::NoHandler
}
