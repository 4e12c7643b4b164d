//! 控制台产物：复用或新建控制台项目，写入输出指定文本的程序，构建运行后核对输出

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::Local;
use regex::Regex;

use crate::catalog::builtin;
use crate::core::Result;
use crate::selftest::{SelfTestResult, SelfTester};
use crate::tools::HealingRunner;

use super::host::{write_files, PLAYGROUND_DIR};

pub const LAST_CONSOLE_FILE: &str = "last_console_path.txt";
const DEFAULT_GREETING: &str = "Hello from Mason!";

/// `prints "..."` / `що виводить "..."` 中的文本
pub fn expected_output(phrase: &str) -> Option<String> {
    static RX: OnceLock<Regex> = OnceLock::new();
    let rx = RX.get_or_init(|| {
        Regex::new(r#"(?i)(?:що\s+виводить|prints?)\s+"([^"]+)""#).expect("static regex")
    });
    rx.captures(phrase).map(|c| c[1].to_string())
}

#[derive(Debug)]
pub struct ConsoleOutcome {
    pub project_dir: Option<PathBuf>,
    pub result: SelfTestResult,
}

fn failed(project_dir: Option<PathBuf>, note: String) -> ConsoleOutcome {
    ConsoleOutcome {
        project_dir,
        result: SelfTestResult {
            ok: false,
            status: 0,
            bytes: 0,
            notes: vec![note],
        },
    }
}

pub struct ConsoleBuilder {
    runner: Arc<HealingRunner>,
    tester: Arc<SelfTester>,
    workspace: PathBuf,
    program: String,
}

impl ConsoleBuilder {
    pub fn new(runner: Arc<HealingRunner>, tester: Arc<SelfTester>, workspace: PathBuf, program: String) -> Self {
        Self {
            runner,
            tester,
            workspace,
            program,
        }
    }

    /// 优先使用会话里记住的目录，其次指针文件
    pub fn known_project(&self, remembered: Option<&Path>) -> Option<PathBuf> {
        if let Some(dir) = remembered.filter(|d| d.is_dir()) {
            return Some(dir.to_path_buf());
        }
        let saved = std::fs::read_to_string(self.workspace.join(LAST_CONSOLE_FILE)).ok()?;
        let dir = PathBuf::from(saved.trim());
        dir.is_dir().then_some(dir)
    }

    async fn create_project(&self) -> Result<Option<PathBuf>> {
        let playground = self.workspace.join(PLAYGROUND_DIR);
        std::fs::create_dir_all(&playground)?;
        let dir = playground.join(format!("ConsoleApp_{}", Local::now().format("%H%M%S")));
        let args = format!("new console -o \"{}\"", dir.display());
        let out = self
            .runner
            .run_with_heal(&self.program, &args, &self.workspace, "console:new")
            .await;
        if !out.success() {
            tracing::warn!(stderr = %out.stderr.trim(), "console project not created");
            return Ok(None);
        }
        std::fs::create_dir_all(&dir)?;
        std::fs::write(self.workspace.join(LAST_CONSOLE_FILE), dir.display().to_string())?;
        Ok(Some(dir))
    }

    pub async fn run(&self, phrase: &str, remembered: Option<&Path>) -> Result<ConsoleOutcome> {
        let dir = match self.known_project(remembered) {
            Some(dir) => dir,
            None => match self.create_project().await? {
                Some(dir) => dir,
                None => return Ok(failed(None, "console project could not be created".to_string())),
            },
        };

        let expected = expected_output(phrase);
        let def = builtin::console(
            "Console",
            expected.as_deref().unwrap_or(DEFAULT_GREETING),
        );
        write_files(&dir, &def)?;

        let build = self
            .runner
            .run_with_heal(&self.program, "build", &dir, "proj:build")
            .await;
        if !build.success() {
            return Ok(failed(Some(dir), format!("build failed (exit={})", build.exit_code)));
        }
        let run = self
            .runner
            .run_with_heal(&self.program, "run", &dir, "console:run")
            .await;
        let result = self.tester.evaluate_console(&def, &run, expected.as_deref());
        Ok(ConsoleOutcome {
            project_dir: Some(dir),
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelfTestSection;
    use crate::heal::fakes::{healing_runner, FakeRunner};
    use crate::memory::repository::MemoryRepository;
    use crate::memory::{LearningLog, Repository};
    use crate::tools::RunOutput;

    fn builder(dir: &Path, script: fn(&str, &str) -> RunOutput) -> (ConsoleBuilder, Arc<FakeRunner>) {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let runner = FakeRunner::new(script);
        let tester = Arc::new(SelfTester::new(SelfTestSection::default(), LearningLog::new(repo.clone())));
        (
            ConsoleBuilder::new(healing_runner(repo, runner.clone()), tester, dir.to_path_buf(), "dotnet".into()),
            runner,
        )
    }

    #[test]
    fn test_expected_output_phrases() {
        assert_eq!(
            expected_output("створи консольну програму що виводить \"Привіт\"").as_deref(),
            Some("Привіт")
        );
        assert_eq!(expected_output("console app that prints \"hi there\"").as_deref(), Some("hi there"));
        assert_eq!(expected_output("console app"), None);
    }

    #[tokio::test]
    async fn test_new_project_is_created_built_and_checked() {
        let dir = tempfile::tempdir().unwrap();
        let (b, runner) = builder(dir.path(), |_, args| {
            if args == "run" {
                RunOutput {
                    exit_code: 0,
                    stdout: "Hi there\n".into(),
                    stderr: String::new(),
                }
            } else {
                RunOutput::default()
            }
        });
        let outcome = b.run("console that prints \"hi there\"", None).await.unwrap();
        assert!(outcome.result.ok, "{:?}", outcome.result.notes);
        let project = outcome.project_dir.unwrap();
        let program = std::fs::read_to_string(project.join("Program.cs")).unwrap();
        assert!(program.contains("hi there"));
        let pointer = std::fs::read_to_string(dir.path().join(LAST_CONSOLE_FILE)).unwrap();
        assert_eq!(PathBuf::from(pointer), project);
        let args: Vec<String> = runner.calls().into_iter().map(|(_, a)| a).collect();
        assert!(args[0].starts_with("new console -o"));
        assert_eq!(&args[1..], &["build".to_string(), "run".to_string()]);
    }

    #[tokio::test]
    async fn test_remembered_project_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("Playground/ConsoleApp_old");
        std::fs::create_dir_all(&existing).unwrap();
        let (b, runner) = builder(dir.path(), |_, _| RunOutput {
            exit_code: 0,
            stdout: "Hello from Mason!".into(),
            stderr: String::new(),
        });
        let outcome = b.run("console", Some(&existing)).await.unwrap();
        assert!(outcome.result.ok);
        assert_eq!(outcome.project_dir.as_deref(), Some(existing.as_path()));
        assert!(runner.calls().iter().all(|(_, a)| !a.starts_with("new")));
    }
}
