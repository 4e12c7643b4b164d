//! 自愈：对失败的外部命令按规则表分类，最多提出一次重试
//!
//! `try_heal` 从不返回错误；每个生效的分支都追加一条 hint，没有可用修复时记 "no-known-fix"。

#[cfg(test)]
pub(crate) mod fakes;
pub mod offline;
pub mod research;
pub mod rules;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::catalog::GeneratorCatalog;
use crate::config::{HealerSection, ToolchainSection};
use crate::memory::{truncate_chars, HintLog};
use crate::tools::{net, CommandPolicy, CommandRunner};

pub use research::{Diagnose, Researcher};
pub use rules::{default_rules, HealRule, RuleEnv, RuleKind};

/// 一次失败执行的全部上下文
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub tool: String,
    pub args: String,
    pub cwd: PathBuf,
    /// 调用方给的语境标签，如 "web:new:Calculator"、"proj:build"
    pub context: String,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealOutcome {
    /// 用新参数重跑一次
    Retry { args: String, action: String },
    /// 只给出提示，不重跑
    Advisory(String),
    NoFix,
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

pub struct Healer {
    runner: Arc<dyn CommandRunner>,
    diagnose: Arc<dyn Diagnose>,
    catalog: Arc<GeneratorCatalog>,
    hints: HintLog,
    policy: CommandPolicy,
    cfg: HealerSection,
    toolchain: ToolchainSection,
    rules: Vec<HealRule>,
}

impl Healer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        diagnose: Arc<dyn Diagnose>,
        catalog: Arc<GeneratorCatalog>,
        hints: HintLog,
        cfg: HealerSection,
        toolchain: ToolchainSection,
    ) -> Self {
        Self {
            runner,
            diagnose,
            catalog,
            hints,
            policy: CommandPolicy::new(&cfg.safe_tools),
            cfg,
            toolchain,
            rules: default_rules(),
        }
    }

    pub fn hints(&self) -> &HintLog {
        &self.hints
    }

    fn hint(&self, f: &FailureContext, action: &str) {
        self.hints.record(&f.context, &f.tool, &f.args, &f.stderr, action);
    }

    /// 按规则顺序逐条判定；动作返回 None 表示继续看下一条
    pub async fn try_heal(&self, f: &FailureContext) -> HealOutcome {
        let env = RuleEnv {
            force_flag: &self.cfg.force_flag,
            program: &self.toolchain.program,
        };
        for rule in &self.rules {
            if !(rule.matches)(f, &env) {
                continue;
            }
            tracing::debug!(rule = rule.name, context = %f.context, "heal rule matched");
            if let Some(outcome) = self.apply(rule.kind, f).await {
                return outcome;
            }
        }
        tracing::info!(
            tool = %f.tool,
            stderr = %truncate_chars(f.stderr.trim(), self.cfg.hint_stderr_chars),
            "no known fix"
        );
        self.hint(f, "no-known-fix");
        HealOutcome::NoFix
    }

    async fn apply(&self, kind: RuleKind, f: &FailureContext) -> Option<HealOutcome> {
        match kind {
            RuleKind::ForceOverwrite => {
                let action = format!("append {}", self.cfg.force_flag);
                self.hint(f, &action);
                Some(HealOutcome::Retry {
                    args: format!("{} {}", f.args.trim_end(), self.cfg.force_flag),
                    action,
                })
            }
            RuleKind::MissingRuntime => {
                let note = "install Node.js (LTS) and make sure `node` is on PATH";
                self.hint(f, "install Node.js");
                tracing::warn!(context = %f.context, "{}", note);
                Some(HealOutcome::Advisory(note.to_string()))
            }
            RuleKind::MissingSdk => {
                let note = "install the .NET SDK / runtime named in the error";
                self.hint(f, "install .NET SDK");
                tracing::warn!(context = %f.context, "{}", note);
                Some(HealOutcome::Advisory(note.to_string()))
            }
            RuleKind::RestoreThenRetry => self.restore(f).await,
            RuleKind::LearnGenerator => {
                self.learn_generator(f);
                None
            }
            RuleKind::PortInUse => Some(self.change_port(f)),
            RuleKind::WebResearch => self.research(f).await,
        }
    }

    async fn restore(&self, f: &FailureContext) -> Option<HealOutcome> {
        let args = format!("restore \"{}\"", f.cwd.display());
        let out = self.runner.run(&f.tool, &args, &f.cwd).await;
        self.hint(f, &format!("{} restore (exit={})", f.tool, out.exit_code));
        if out.success() {
            Some(HealOutcome::Retry {
                args: f.args.clone(),
                action: format!("{} restore", f.tool),
            })
        } else {
            None
        }
    }

    /// 从语境末段与输出中挑一个词作为生成器 key；失败只记日志
    fn learn_generator(&self, f: &FailureContext) {
        static WORD: OnceLock<Regex> = OnceLock::new();
        let rx = cached(
            &WORD,
            r"(?i)(калькулятор|calculator|todo|to-?do|timer|таймер|[\p{L}0-9\-_]{3,})",
        );
        let tail = f.context.rsplit(':').next().unwrap_or("");
        let text = format!("{} {} {}", tail, f.stdout, f.stderr);
        let Some(m) = rx.find(&text) else {
            return;
        };
        let word = m.as_str().to_lowercase();
        let learned = match self.catalog.try_resolve(&word) {
            Ok(Some(def)) => Ok(def.key),
            Ok(None) => self.catalog.learn_unknown(&word).map(|d| d.key),
            Err(e) => Err(e),
        };
        match learned {
            Ok(key) => self.hint(f, &format!("learn-generator: {}", key)),
            Err(e) => tracing::warn!(word = %word, error = %e, "learn generator failed"),
        }
    }

    fn change_port(&self, f: &FailureContext) -> HealOutcome {
        static URLS: OnceLock<Regex> = OnceLock::new();
        static PORT: OnceLock<Regex> = OnceLock::new();
        let current = cached(&PORT, r"--urls\s+\S*?:(\d+)")
            .captures(&f.args)
            .and_then(|c| c[1].parse::<u16>().ok());
        let exclude: Vec<u16> = current.into_iter().collect();
        let port = net::find_free(
            self.toolchain.default_port,
            self.toolchain.port_scan_attempts,
            &exclude,
        );
        let base = cached(&URLS, r"--urls\s+\S+").replace_all(&f.args, "");
        let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
        let args = format!("{} --urls http://localhost:{}", base, port)
            .trim()
            .to_string();
        let action = format!("changed port to {}", port);
        self.hint(f, &action);
        HealOutcome::Retry { args, action }
    }

    fn is_restore(&self, command: &str) -> bool {
        let lower = command.to_lowercase();
        self.cfg
            .restore_commands
            .iter()
            .any(|r| lower.starts_with(&r.to_lowercase()))
    }

    /// 联网诊断；逐条建议执行命令
    async fn research(&self, f: &FailureContext) -> Option<HealOutcome> {
        let advice = self.diagnose.diagnose(&f.context, &f.stdout, &f.stderr).await;
        if advice.is_empty() {
            return None;
        }
        let fixes: Vec<&str> = advice
            .iter()
            .flat_map(|a| a.actions.iter())
            .map(String::as_str)
            .filter(|a| a.starts_with("#fix:"))
            .collect();
        for fix in &fixes {
            tracing::info!(advice = %fix, "research suggestion");
        }

        // 每条建议至多执行一条白名单命令；首个成功的恢复类命令触发重跑
        let mut last_action = None;
        for article in &advice {
            let Some((tool, args)) = article.actions.iter().find_map(|a| self.policy.split(a)) else {
                continue;
            };
            let cmdline = format!("{} {}", tool, args).trim().to_string();
            let out = self.runner.run(tool, args, &f.cwd).await;
            let action = format!("web-advice: {} (exit={})", cmdline, out.exit_code);
            self.hint(f, &action);
            if out.success() && self.is_restore(&cmdline) {
                return Some(HealOutcome::Retry {
                    args: f.args.clone(),
                    action,
                });
            }
            last_action = Some(action);
        }
        if let Some(action) = last_action {
            return Some(HealOutcome::Advisory(action));
        }

        if fixes.is_empty() {
            return None;
        }
        let note = fixes.join("; ");
        self.hint(f, &note);
        Some(HealOutcome::Advisory(note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::fakes::{FakeDiagnose, FakeRunner};
    use crate::memory::repository::MemoryRepository;
    use crate::memory::{KnowledgeArticle, Repository};
    use crate::tools::{HealingRunner, RunOutput};
    use std::net::{Ipv4Addr, TcpListener};
    use std::path::Path;
    use std::sync::atomic::Ordering;

    fn fail(stderr: &str) -> RunOutput {
        RunOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn ok() -> RunOutput {
        RunOutput::default()
    }

    struct Fixture {
        repo: Arc<dyn Repository>,
        runner: Arc<FakeRunner>,
        diagnose: Arc<FakeDiagnose>,
        healer: Arc<Healer>,
    }

    fn fixture(script: fn(&str, &str) -> RunOutput, advice: Vec<KnowledgeArticle>, toolchain: ToolchainSection) -> Fixture {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let runner = FakeRunner::new(script);
        let diagnose = FakeDiagnose::new(advice);
        let healer = Arc::new(Healer::new(
            runner.clone(),
            diagnose.clone(),
            Arc::new(GeneratorCatalog::new(repo.clone())),
            HintLog::new(repo.clone(), 800),
            HealerSection::default(),
            toolchain,
        ));
        Fixture {
            repo,
            runner,
            diagnose,
            healer,
        }
    }

    fn failure(tool: &str, args: &str, context: &str, stderr: &str) -> FailureContext {
        FailureContext {
            tool: tool.into(),
            args: args.into(),
            cwd: PathBuf::from("."),
            context: context.into(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[tokio::test]
    async fn test_unmatched_failure_is_no_fix_with_hint() {
        let fx = fixture(|_, _| fail("boom"), Vec::new(), ToolchainSection::default());
        let outcome = fx.healer.try_heal(&failure("npm", "test", "misc", "boom")).await;
        assert_eq!(outcome, HealOutcome::NoFix);
        assert_eq!(fx.diagnose.calls.load(Ordering::SeqCst), 1);
        let hints = fx.healer.hints().tail(10);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].action, "no-known-fix");
        assert!(fx.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_target_retries_with_force_only() {
        fn script(_tool: &str, args: &str) -> RunOutput {
            if args.ends_with("--force") {
                ok()
            } else {
                fail("Creating this template will make changes to existing files")
            }
        }
        let fx = fixture(script, Vec::new(), ToolchainSection::default());
        let heal = HealingRunner::new(fx.runner.clone(), fx.healer.clone());
        let args = r#"new web -n "Calc" -o "Playground/Calc""#;
        let out = heal.run_with_heal("dotnet", args, Path::new("."), "web:new:Calc").await;
        assert!(out.success());
        let calls = fx.runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, format!("{} --force", args));
    }

    #[tokio::test]
    async fn test_port_in_use_picks_a_different_free_port() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let busy = held.local_addr().unwrap().port();
        let toolchain = ToolchainSection {
            default_port: busy,
            port_scan_attempts: 5,
            ..ToolchainSection::default()
        };
        let fx = fixture(|_, _| fail("address already in use"), Vec::new(), toolchain);
        let args = format!("run --urls http://localhost:{}", busy);
        let outcome = fx
            .healer
            .try_heal(&failure("dotnet", &args, "web:run", "Failed to bind: address already in use"))
            .await;
        let HealOutcome::Retry { args: new_args, .. } = outcome else {
            panic!("expected retry, got {:?}", outcome);
        };
        assert_eq!(new_args.matches("--urls").count(), 1);
        let port: u16 = new_args.rsplit(':').next().unwrap().parse().unwrap();
        assert_ne!(port, busy);
        assert!(new_args.starts_with("run --urls http://localhost:"));
    }

    #[tokio::test]
    async fn test_run_with_heal_never_runs_more_than_twice() {
        let fx = fixture(|_, _| fail("address already in use"), Vec::new(), ToolchainSection::default());
        let heal = HealingRunner::new(fx.runner.clone(), fx.healer.clone());
        let out = heal.run_with_heal("dotnet", "run", Path::new("."), "web:run").await;
        assert!(!out.success());
        assert_eq!(fx.runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_build_failure_restores_then_retries_unchanged() {
        fn script(_tool: &str, args: &str) -> RunOutput {
            if args.starts_with("restore") {
                ok()
            } else {
                fail("error NU1101: Unable to find package")
            }
        }
        let fx = fixture(script, Vec::new(), ToolchainSection::default());
        let heal = HealingRunner::new(fx.runner.clone(), fx.healer.clone());
        heal.run_with_heal("dotnet", "build \"App\"", Path::new("."), "proj:build").await;
        let calls = fx.runner.calls();
        let builds: Vec<_> = calls.iter().filter(|(_, a)| a.starts_with("build")).collect();
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].1, builds[1].1);
        assert!(calls[1].1.starts_with("restore"));
        let hints = fx.healer.hints().tail(10);
        assert_eq!(hints[0].action, "dotnet restore (exit=0)");
    }

    #[tokio::test]
    async fn test_web_advice_runs_one_safe_command() {
        let advice = vec![KnowledgeArticle {
            title: "NU1101".into(),
            url: "https://example.org/".into(),
            actions: vec![
                "#fix: clear caches".into(),
                "npm install; rm -rf /".into(),
                "npm install".into(),
                "dotnet restore".into(),
            ],
            summary: String::new(),
        }];
        let fx = fixture(|tool, _| if tool == "npm" { ok() } else { fail("x") }, advice, ToolchainSection::default());
        let outcome = fx.healer.try_heal(&failure("npx", "vite build", "vite:build", "x")).await;
        assert!(matches!(outcome, HealOutcome::Retry { ref args, .. } if args == "vite build"));
        assert_eq!(fx.runner.calls(), vec![("npm".to_string(), "install".to_string())]);
        let hints = fx.healer.hints().tail(10);
        assert_eq!(hints.last().unwrap().action, "web-advice: npm install (exit=0)");
    }

    fn advice_with(actions: &[&str]) -> KnowledgeArticle {
        KnowledgeArticle {
            title: "advice".into(),
            url: "https://example.org/".into(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn test_web_advice_tries_each_article_until_a_restore_succeeds() {
        let advice = vec![advice_with(&["dotnet --info"]), advice_with(&["dotnet restore"])];
        let fx = fixture(|_, _| ok(), advice, ToolchainSection::default());
        let outcome = fx.healer.try_heal(&failure("npx", "vite build", "vite:build", "x")).await;
        assert_eq!(
            outcome,
            HealOutcome::Retry {
                args: "vite build".into(),
                action: "web-advice: dotnet restore (exit=0)".into(),
            }
        );
        assert_eq!(
            fx.runner.calls(),
            vec![
                ("dotnet".to_string(), "--info".to_string()),
                ("dotnet".to_string(), "restore".to_string()),
            ]
        );
        let actions: Vec<String> = fx.healer.hints().tail(10).into_iter().map(|h| h.action).collect();
        assert!(actions.contains(&"web-advice: dotnet --info (exit=0)".to_string()));
    }

    #[tokio::test]
    async fn test_web_advice_without_restore_reports_last_command() {
        let advice = vec![advice_with(&["dotnet --info"]), advice_with(&["#fix: x", "npm --version"])];
        let fx = fixture(|_, _| ok(), advice, ToolchainSection::default());
        let outcome = fx.healer.try_heal(&failure("npx", "vite build", "vite:build", "x")).await;
        assert_eq!(outcome, HealOutcome::Advisory("web-advice: npm --version (exit=0)".into()));
        assert_eq!(fx.runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_runtime_is_advisory_without_retry() {
        let fx = fixture(
            |_, _| fail("'node' is not recognized as an internal or external command"),
            Vec::new(),
            ToolchainSection::default(),
        );
        let heal = HealingRunner::new(fx.runner.clone(), fx.healer.clone());
        let out = heal.run_with_heal("npm", "run dev", Path::new("."), "vite:dev").await;
        assert!(!out.success());
        assert_eq!(fx.runner.calls().len(), 1);
        assert_eq!(fx.diagnose.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_context_learns_generator_and_continues() {
        let fx = fixture(|_, _| fail("x"), Vec::new(), ToolchainSection::default());
        let outcome = fx
            .healer
            .try_heal(&failure("dotnet", "new web", "proj:new:weatherapp", "unexpected"))
            .await;
        assert_eq!(outcome, HealOutcome::NoFix);
        let catalog = GeneratorCatalog::new(fx.repo.clone());
        assert!(catalog.get("weatherapp").unwrap().is_some());
        let actions: Vec<String> = fx.healer.hints().tail(10).into_iter().map(|h| h.action).collect();
        assert_eq!(actions, vec!["learn-generator: weatherapp", "no-known-fix"]);
    }
}
