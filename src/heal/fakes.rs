//! 测试替身：记录调用的执行器与固定返回的诊断

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Diagnose, Healer};
use crate::catalog::GeneratorCatalog;
use crate::config::{HealerSection, ToolchainSection};
use crate::memory::{HintLog, KnowledgeArticle, Repository};
use crate::tools::{CommandRunner, HealingRunner, RunOutput};

/// 记录每次调用，按脚本给出结果
pub struct FakeRunner {
    calls: Mutex<Vec<(String, String)>>,
    script: fn(&str, &str) -> RunOutput,
}

impl FakeRunner {
    pub fn new(script: fn(&str, &str) -> RunOutput) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script,
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, tool: &str, args: &str, _cwd: &Path) -> RunOutput {
        self.calls
            .lock()
            .unwrap()
            .push((tool.to_string(), args.to_string()));
        (self.script)(tool, args)
    }
}

pub struct FakeDiagnose {
    pub advice: Vec<KnowledgeArticle>,
    pub calls: AtomicUsize,
}

impl FakeDiagnose {
    pub fn new(advice: Vec<KnowledgeArticle>) -> Arc<Self> {
        Arc::new(Self {
            advice,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Diagnose for FakeDiagnose {
    async fn diagnose(&self, _context: &str, _stdout: &str, _stderr: &str) -> Vec<KnowledgeArticle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.advice.clone()
    }
}

/// 带默认配置、无联网建议的自愈执行器
pub fn healing_runner(repo: Arc<dyn Repository>, runner: Arc<FakeRunner>) -> Arc<HealingRunner> {
    let healer = Healer::new(
        runner.clone(),
        FakeDiagnose::new(Vec::new()),
        Arc::new(GeneratorCatalog::new(repo.clone())),
        HintLog::new(repo, 800),
        HealerSection::default(),
        ToolchainSection::default(),
    );
    Arc::new(HealingRunner::new(runner, Arc::new(healer)))
}
