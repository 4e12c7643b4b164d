//! 主控循环：从收件箱取命令，规范化、路由、分派到各处理器
//!
//! 单消费者；收件箱空时按 `poll_interval_ms` 休眠，关闭 token 取消后退出。
//! 建应用流程：解析 → 建宿主 → 套样式 → 写文件 → 启动 → 自测 → 必要时换定义修复一次。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::artifact::{ConsoleBuilder, HostedApp, StyleStore, WebHost};
use crate::catalog::{ArtifactKind, GeneratorCatalog, GeneratorDefinition};
use crate::config::AppConfig;
use crate::core::input::normalize;
use crate::core::router::{route, Command};
use crate::core::session::Session;
use crate::core::shutdown::{ShutdownManager, ShutdownReason};
use crate::core::Result;
use crate::heal::{Diagnose, Healer};
use crate::memory::{
    CurriculumStore, HintLog, KnowledgeArticle, KnowledgeBase, LearningLog, ProgressStore, Repository,
    SynonymStore,
};
use crate::resolver::{heuristics, IntentResolver};
use crate::selftest::{SelfTestResult, SelfTester};
use crate::tools::{CommandRunner, HealingRunner};

const HINTS_SHOWN: usize = 50;
const KNOWLEDGE_SHOWN: usize = 10;
const DIAGNOSE_HINTS: usize = 20;

/// 处理一条命令后的回应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Exit,
    Text(String),
}

/// 自测失败或标题退化时的补救来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// 只用关键词规则
    Heuristic,
    /// 规则无结果时退到内置 todo
    HeuristicOrTodo,
}

/// 一次建应用流程的结果
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub key: String,
    pub url: Option<String>,
    pub ok: bool,
    pub notes: Vec<String>,
}

impl BuildReport {
    fn summary(&self) -> String {
        let verdict = if self.ok { "ok" } else { "failed" };
        let mut line = format!("{} [{}]", self.key, verdict);
        if let Some(url) = &self.url {
            line.push_str(&format!(" {}", url));
        }
        if !self.notes.is_empty() {
            line.push_str(&format!(" ({})", self.notes.join("; ")));
        }
        line
    }
}

fn render_advice(articles: &[KnowledgeArticle]) -> String {
    if articles.is_empty() {
        return "no advice found".to_string();
    }
    articles
        .iter()
        .map(|a| {
            let mut line = format!("{} <{}>", a.title, a.url);
            if !a.actions.is_empty() {
                line.push_str(&format!(" try: {}", a.actions.join(" | ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Agent {
    resolver: IntentResolver,
    catalog: Arc<GeneratorCatalog>,
    synonyms: Arc<SynonymStore>,
    healer: Arc<Healer>,
    diagnose: Arc<dyn Diagnose>,
    host: WebHost,
    console: ConsoleBuilder,
    tester: Arc<SelfTester>,
    styles: StyleStore,
    knowledge: KnowledgeBase,
    progress: ProgressStore,
    curriculum: CurriculumStore,
    session: Session,
    shutdown: ShutdownManager,
    poll_interval: Duration,
}

impl Agent {
    /// 按配置组装全部组件；`runner` 与 `diagnose` 由调用方提供（真实进程 / 联网研究，或测试替身）
    pub fn new(
        cfg: &AppConfig,
        repo: Arc<dyn Repository>,
        workspace: PathBuf,
        runner: Arc<dyn CommandRunner>,
        diagnose: Arc<dyn Diagnose>,
        shutdown: ShutdownManager,
    ) -> Self {
        let catalog = Arc::new(GeneratorCatalog::new(repo.clone()));
        let synonyms = Arc::new(SynonymStore::new(repo.clone()));
        let healer = Arc::new(Healer::new(
            runner.clone(),
            diagnose.clone(),
            catalog.clone(),
            HintLog::new(repo.clone(), cfg.healer.hint_stderr_chars),
            cfg.healer.clone(),
            cfg.toolchain.clone(),
        ));
        let healing = Arc::new(HealingRunner::new(runner, healer.clone()));
        let tester = Arc::new(SelfTester::new(cfg.selftest.clone(), LearningLog::new(repo.clone())));

        Self {
            resolver: IntentResolver::new(catalog.clone(), synonyms.clone(), cfg.resolver.clone()),
            catalog,
            synonyms,
            healer,
            diagnose,
            host: WebHost::new(healing.clone(), workspace.clone(), cfg.toolchain.clone()),
            console: ConsoleBuilder::new(
                healing,
                tester.clone(),
                workspace.clone(),
                cfg.toolchain.program.clone(),
            ),
            tester,
            styles: StyleStore::new(repo.clone()),
            knowledge: KnowledgeBase::new(repo.clone()),
            progress: ProgressStore::new(repo.clone()),
            curriculum: CurriculumStore::new(repo),
            session: Session::restore(&workspace),
            shutdown,
            poll_interval: Duration::from_millis(cfg.app.poll_interval_ms.max(1)),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// 消费收件箱直到 `exit`、关闭信号或发送端全部断开
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<String>) {
        let token = self.shutdown.token();
        tracing::info!(interval_ms = self.poll_interval.as_millis() as u64, "command loop started");
        loop {
            if token.is_cancelled() {
                break;
            }
            match inbox.try_recv() {
                Ok(raw) => match self.handle(&raw).await {
                    Reply::Exit => {
                        self.shutdown.shutdown(ShutdownReason::ExitCommand);
                        break;
                    }
                    Reply::Text(text) => tracing::info!("{}", text),
                },
                Err(TryRecvError::Empty) => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("inbox closed");
                    break;
                }
            }
        }
        tracing::info!("command loop stopped");
    }

    /// 处理一条原始输入
    pub async fn handle(&mut self, raw: &str) -> Reply {
        let cmd = normalize(raw);
        if cmd.is_empty() {
            return Reply::Text(String::new());
        }
        tracing::info!(cmd = %cmd, "command received");

        let result = match route(&cmd) {
            Command::Exit => return Reply::Exit,
            Command::ShowHints => Ok(self.show_hints()),
            Command::LearningTask => self.learning_task().await,
            Command::Learn(topic) => Ok(self.learn(&topic).await),
            Command::ShowKnowledge => self.show_knowledge(),
            Command::Diagnose => Ok(self.diagnose_recent().await),
            Command::OpenLast => Ok(self.open_last()),
            Command::Console(phrase) => self.console_app(&phrase).await.map(|r| r.summary()),
            Command::BuildApp(phrase) => self
                .build_app(&phrase, Repair::HeuristicOrTodo)
                .await
                .map(|r| r.summary()),
            Command::FreeForm(phrase) => self
                .build_app(&phrase, Repair::Heuristic)
                .await
                .map(|r| r.summary()),
            Command::NoHandler => Ok(format!("No handler for: {}", cmd)),
        };
        match result {
            Ok(text) => Reply::Text(text),
            Err(e) => {
                tracing::error!(cmd = %cmd, error = %e, "command failed");
                Reply::Text(format!("error: {}", e))
            }
        }
    }

    fn bump(&self, key: &str, ok: bool) {
        if let Err(e) = self.progress.bump(key, ok) {
            tracing::warn!(key = %key, error = %e, "progress update failed");
        }
    }

    fn remember_phrase(&self, phrase: &str, key: &str) {
        if let Err(e) = self.synonyms.add(phrase, key) {
            tracing::warn!(phrase = %phrase, error = %e, "synonym not saved");
        }
    }

    fn show_hints(&self) -> String {
        let hints = self.healer.hints().tail(HINTS_SHOWN);
        if hints.is_empty() {
            return "no hints yet".to_string();
        }
        hints
            .iter()
            .map(|h| format!("{} [{}] {} {} => {}", h.ts, h.context, h.tool, h.args, h.action))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn show_knowledge(&self) -> Result<String> {
        let files = self.knowledge.latest(KNOWLEDGE_SHOWN)?;
        if files.is_empty() {
            return Ok("no knowledge yet".to_string());
        }
        Ok(files.join("\n"))
    }

    fn open_last(&self) -> String {
        match &self.session.last_url {
            Some(url) => format!("last app: {}", url),
            None => "nothing built yet".to_string(),
        }
    }

    async fn learn(&self, topic: &str) -> String {
        let articles = self.diagnose.diagnose(&format!("manual:{}", topic), "", "").await;
        render_advice(&articles)
    }

    /// 把最近几条 hint 的 stderr 拼起来诊断一次
    async fn diagnose_recent(&self) -> String {
        let stderr = self
            .healer
            .hints()
            .tail(DIAGNOSE_HINTS)
            .into_iter()
            .map(|h| h.stderr)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if stderr.is_empty() {
            return "nothing to diagnose".to_string();
        }
        let articles = self.diagnose.diagnose("auto:diagnose", "", &stderr).await;
        render_advice(&articles)
    }

    pub async fn console_app(&mut self, phrase: &str) -> Result<BuildReport> {
        let outcome = self.console.run(phrase, self.session.last_console.as_deref()).await?;
        if let Some(dir) = &outcome.project_dir {
            self.session.last_console = Some(dir.clone());
        }
        self.bump("console", outcome.result.ok);
        Ok(BuildReport {
            key: "console".to_string(),
            url: None,
            ok: outcome.result.ok,
            notes: outcome.result.notes,
        })
    }

    fn repair_candidate(&self, phrase: &str, repair: Repair) -> Option<GeneratorDefinition> {
        if let Some(def) = heuristics::infer(phrase) {
            return Some(def);
        }
        match repair {
            Repair::Heuristic => None,
            Repair::HeuristicOrTodo => self.catalog.try_resolve("todo").unwrap_or_else(|e| {
                tracing::warn!(error = %e, "todo fallback unavailable");
                None
            }),
        }
    }

    /// 套样式并写入 wwwroot，返回实际写入的定义
    fn publish(&self, app: &HostedApp, phrase: &str, mut def: GeneratorDefinition) -> Result<GeneratorDefinition> {
        let style = self.styles.resolve(phrase, &def.title);
        style.apply(&mut def);
        self.host.write_files(&app.wwwroot, &def)?;
        Ok(def)
    }

    async fn check(&self, app: &HostedApp, def: &GeneratorDefinition) -> SelfTestResult {
        self.tester.evaluate(&app.url, def, &app.wwwroot).await
    }

    /// 建应用与自由描述共用的流程
    pub async fn build_app(&mut self, phrase: &str, repair: Repair) -> Result<BuildReport> {
        let decision = self.resolver.decide(phrase);
        match decision.definition.kind {
            ArtifactKind::Console => return self.console_app(phrase).await,
            ArtifactKind::HostedWeb => {}
        }
        tracing::info!(phrase = %phrase, key = %decision.key, path = ?decision.path, "generator chosen");

        let Some(app) = self.host.ensure(&decision.definition.title).await? else {
            self.bump(&decision.key, false);
            return Ok(BuildReport {
                key: decision.key,
                url: None,
                ok: false,
                notes: vec!["web host could not be created".to_string()],
            });
        };
        let degenerate = decision.definition.title.eq_ignore_ascii_case("App");
        let written = self.publish(&app, phrase, decision.definition.clone())?;
        // 宿主在后台运行，修复时只改 wwwroot 里的文件
        drop(self.host.start(&app));
        let first = self.check(&app, &written).await;
        self.bump(&decision.key, first.ok);
        if first.ok {
            self.remember_phrase(phrase, &decision.key);
        }

        let mut report = BuildReport {
            key: decision.key,
            url: Some(app.url.clone()),
            ok: first.ok,
            notes: first.notes,
        };

        if !report.ok || degenerate {
            if let Some(fallback) = self.repair_candidate(phrase, repair) {
                tracing::info!(from = %report.key, to = %fallback.key, "repairing with another generator");
                let key = fallback.key.clone();
                let written = self.publish(&app, phrase, fallback)?;
                let second = self.check(&app, &written).await;
                self.bump(&key, second.ok);
                if second.ok {
                    self.remember_phrase(phrase, &key);
                    report = BuildReport {
                        key,
                        url: report.url,
                        ok: true,
                        notes: second.notes,
                    };
                } else {
                    tracing::warn!(key = %key, notes = ?second.notes, "repair did not pass self-test");
                    report.notes.extend(second.notes);
                }
            }
        }

        self.session.remember_web(&app.url, &app.project_dir);
        Ok(report)
    }

    /// 执行一个课程任务，返回是否成功
    async fn run_task(&mut self, task: &str) -> Result<bool> {
        let report = match route(&normalize(task)) {
            Command::Console(phrase) => self.console_app(&phrase).await?,
            Command::BuildApp(phrase) => self.build_app(&phrase, Repair::HeuristicOrTodo).await?,
            Command::FreeForm(phrase) => self.build_app(&phrase, Repair::Heuristic).await?,
            other => {
                tracing::warn!(task = %task, command = ?other, "curriculum task is not buildable");
                return Ok(false);
            }
        };
        Ok(report.ok)
    }

    async fn learning_task(&mut self) -> Result<String> {
        let level = self.curriculum.current_level()?;
        let tasks = self.curriculum.tasks(level)?;
        let Some(task) = tasks.first().cloned() else {
            return Ok(format!("no tasks for level {}", level));
        };
        tracing::info!(level, task = %task, "learning task started");

        let ok = self.run_task(&task).await?;
        self.bump(&format!("level:{}", level), ok);
        if !ok {
            let advice = self.learn(&task).await;
            return Ok(format!("task failed: {}\n{}", task, advice));
        }

        self.curriculum.mark_done(level, &task)?;
        if self.curriculum.tasks(level)?.is_empty() {
            self.curriculum.level_up(level + 1, &format!("level {} complete", level))?;
            return Ok(format!("task done: {} (level {} reached)", task, level + 1));
        }
        Ok(format!("task done: {}", task))
    }
}
