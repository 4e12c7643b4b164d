//! 关键词启发式：有序表，第一条命中者胜

use crate::catalog::{builtin, GeneratorDefinition};

/// 一条启发式规则：任一关键词是短语（小写）的子串即命中
pub struct HeuristicRule {
    pub key: &'static str,
    pub keywords: &'static [&'static str],
    pub build: fn() -> GeneratorDefinition,
}

/// 顺序即优先级
pub const RULES: &[HeuristicRule] = &[
    HeuristicRule {
        key: "wallet",
        keywords: &["гаманець", "wallet", "баланс", "витрати", "доходи"],
        build: builtin::wallet,
    },
    HeuristicRule {
        key: "notes",
        keywords: &["нотат", "заміт", "notes", "note", "editor", "редактор", "блокнот"],
        build: builtin::notes,
    },
    HeuristicRule {
        key: "timer",
        keywords: &["таймер", "timer", "stopwatch", "секундомер"],
        build: builtin::timer,
    },
    HeuristicRule {
        key: "pomodoro",
        keywords: &["помідор", "pomodoro"],
        build: builtin::pomodoro,
    },
    HeuristicRule {
        key: "converter",
        keywords: &["конвертер", "converter", "валюта", "currency", "курс"],
        build: builtin::converter,
    },
    HeuristicRule {
        key: "counter",
        keywords: &["лічильник", "counter", "increment"],
        build: builtin::counter,
    },
    HeuristicRule {
        key: "calculator",
        keywords: &["калькулятор", "calculator", "calc"],
        build: builtin::calculator,
    },
];

/// 第一条命中的规则
pub fn match_rule(phrase: &str) -> Option<&'static HeuristicRule> {
    let p = phrase.to_lowercase();
    RULES
        .iter()
        .find(|r| r.keywords.iter().any(|k| p.contains(k)))
}

/// 启发式推断生成器
pub fn infer(phrase: &str) -> Option<GeneratorDefinition> {
    match_rule(phrase).map(|r| (r.build)())
}
