//! Mason 入口：加载配置、准备工作区、启动控制面板并运行主控循环

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use mason::config::load_config;
use mason::core::{Agent, ShutdownManager, ShutdownReason};
use mason::heal::Researcher;
use mason::integrations::{serve, PanelState};
use mason::memory::{FileRepository, HistoryLog, KnowledgeBase, Repository};
use mason::observability;
use mason::tools::{CommandPolicy, CommandRunner, ProcessRunner, WebClient, WebSource};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 可选参数：额外的配置文件
    let cfg = load_config(std::env::args().nth(1).map(PathBuf::from)).context("Failed to load config")?;

    let workspace = cfg
        .app
        .workspace_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("Projects").join("Workspace"));
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;
    tracing::info!(workspace = %workspace.display(), "workspace ready");

    let repo: Arc<dyn Repository> = Arc::new(FileRepository::new(&workspace));
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let web: Arc<dyn WebSource> = Arc::new(WebClient::new(&cfg.research));
    let researcher = Arc::new(Researcher::new(
        web,
        KnowledgeBase::new(repo.clone()),
        CommandPolicy::new(&cfg.healer.safe_tools),
        cfg.research.clone(),
    ));

    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let panel_state = Arc::new(PanelState {
        inbox: inbox_tx,
        history: HistoryLog::new(repo.clone()),
    });
    let panel_cfg = cfg.panel.clone();
    let token = shutdown.token();
    let panel = tokio::spawn(async move {
        if let Err(e) = serve(&panel_cfg, panel_state, token).await {
            tracing::error!(error = %e, "control panel failed");
        }
    });

    let agent = Agent::new(&cfg, repo, workspace, runner, researcher, (*shutdown).clone());
    agent.run(inbox_rx).await;

    shutdown.shutdown(ShutdownReason::ExitCommand);
    panel.await.context("Control panel task panicked")?;
    Ok(())
}
