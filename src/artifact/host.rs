//! Web 宿主：为生成物创建一个只托管静态文件的 Web 项目，写入页面，后台启动
//!
//! 目录布局：`<workspace>/Playground/<App>/`，其中 `wwwroot/` 放页面，`last_url.txt` 记录地址。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::catalog::GeneratorDefinition;
use crate::config::ToolchainSection;
use crate::core::Result;
use crate::tools::{net, HealingRunner, RunOutput};

pub const PLAYGROUND_DIR: &str = "Playground";
pub const LAST_URL_FILE: &str = "last_url.txt";

const PROGRAM_CS: &str = "var builder = WebApplication.CreateBuilder(args);
var app = builder.Build();
app.UseDefaultFiles();
app.UseStaticFiles();
app.Run();
";

/// 项目名：只留字母数字 `_` `-` `.`，空则 "App"，数字开头加 "App_"
pub fn sanitize_id(s: &str) -> String {
    let clean: String = s
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    if clean.is_empty() {
        return "App".to_string();
    }
    if clean.chars().next().map_or(false, |c| c.is_ascii_digit()) {
        return format!("App_{}", clean);
    }
    clean
}

/// 已托管的生成物
#[derive(Debug, Clone)]
pub struct HostedApp {
    pub name: String,
    pub project_dir: PathBuf,
    pub wwwroot: PathBuf,
    pub url: String,
}

fn launch_settings(url: &str) -> String {
    let json = serde_json::json!({
        "profiles": {
            "MasonApp": {
                "commandName": "Project",
                "dotnetRunMessages": true,
                "applicationUrl": url
            }
        }
    });
    serde_json::to_string_pretty(&json).unwrap_or_default()
}

pub struct WebHost {
    runner: Arc<HealingRunner>,
    workspace: PathBuf,
    toolchain: ToolchainSection,
}

impl WebHost {
    pub fn new(runner: Arc<HealingRunner>, workspace: PathBuf, toolchain: ToolchainSection) -> Self {
        Self {
            runner,
            workspace,
            toolchain,
        }
    }

    pub fn playground(&self) -> PathBuf {
        self.workspace.join(PLAYGROUND_DIR)
    }

    /// 标题去空格后清洗；目录已存在时依次追加 2、3…
    pub fn unique_name(&self, title: &str) -> String {
        let base = sanitize_id(&title.replace(' ', ""));
        let mut name = base.clone();
        let mut idx = 2;
        while self.playground().join(&name).exists() {
            name = format!("{}{}", base, idx);
            idx += 1;
        }
        name
    }

    /// 创建宿主项目；工具链失败（含自愈后）返回 None
    pub async fn ensure(&self, title: &str) -> Result<Option<HostedApp>> {
        let port = net::find_free(self.toolchain.default_port, self.toolchain.port_scan_attempts, &[]);
        let name = self.unique_name(title);
        let project_dir = self.playground().join(&name);
        std::fs::create_dir_all(self.playground())?;

        let args = format!("new web -n \"{}\" -o \"{}\"", name, project_dir.display());
        let out = self
            .runner
            .run_with_heal(&self.toolchain.program, &args, &self.workspace, &format!("web:new:{}", name))
            .await;
        if !out.success() {
            tracing::warn!(app = %name, exit = out.exit_code, "web host not created");
            return Ok(None);
        }

        let url = format!("http://localhost:{}", port);
        std::fs::create_dir_all(&project_dir)?;
        std::fs::write(project_dir.join("Program.cs"), PROGRAM_CS)?;
        let props = project_dir.join("Properties");
        std::fs::create_dir_all(&props)?;
        std::fs::write(props.join("launchSettings.json"), launch_settings(&url))?;
        let wwwroot = project_dir.join("wwwroot");
        std::fs::create_dir_all(&wwwroot)?;
        std::fs::write(project_dir.join(LAST_URL_FILE), &url)?;
        tracing::info!(app = %name, url = %url, "web host ready");

        Ok(Some(HostedApp {
            name,
            project_dir,
            wwwroot,
            url,
        }))
    }

    /// 把定义里的文件写进 wwwroot（覆盖）
    pub fn write_files(&self, wwwroot: &Path, def: &GeneratorDefinition) -> Result<()> {
        write_files(wwwroot, def)
    }

    /// 后台 `run --urls <url>`，主循环另行轮询地址
    pub fn start(&self, app: &HostedApp) -> JoinHandle<RunOutput> {
        let runner = self.runner.clone();
        let program = self.toolchain.program.clone();
        let args = format!("run --urls {}", app.url);
        let dir = app.project_dir.clone();
        let context = format!("web:run:{}", app.name);
        tokio::spawn(async move {
            let out = runner.run_with_heal(&program, &args, &dir, &context).await;
            if !out.success() {
                tracing::warn!(context = %context, exit = out.exit_code, "web host exited with failure");
            }
            out
        })
    }
}

/// 文件名只允许单层相对路径
pub fn write_files(dir: &Path, def: &GeneratorDefinition) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for (name, body) in &def.files {
        let rel = Path::new(name);
        if rel.is_absolute() || rel.components().any(|c| !matches!(c, std::path::Component::Normal(_))) {
            tracing::warn!(file = %name, "skipping file outside target dir");
            continue;
        }
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, body)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::heal::fakes::{healing_runner, FakeRunner};
    use crate::memory::repository::MemoryRepository;

    fn host(dir: &Path, script: fn(&str, &str) -> RunOutput) -> (WebHost, Arc<FakeRunner>) {
        let runner = FakeRunner::new(script);
        let heal = healing_runner(Arc::new(MemoryRepository::new()), runner.clone());
        (
            WebHost::new(heal, dir.to_path_buf(), ToolchainSection::default()),
            runner,
        )
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("Calculator"), "Calculator");
        assert_eq!(sanitize_id("My App!"), "MyApp");
        assert_eq!(sanitize_id("2048"), "App_2048");
        assert_eq!(sanitize_id("???"), "App");
        assert_eq!(sanitize_id("Таймер"), "Таймер");
    }

    #[test]
    fn test_unique_name_skips_existing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let (h, _) = host(dir.path(), |_, _| RunOutput::default());
        assert_eq!(h.unique_name("Pomodoro Timer"), "PomodoroTimer");
        std::fs::create_dir_all(h.playground().join("PomodoroTimer")).unwrap();
        std::fs::create_dir_all(h.playground().join("PomodoroTimer2")).unwrap();
        assert_eq!(h.unique_name("Pomodoro Timer"), "PomodoroTimer3");
    }

    #[tokio::test]
    async fn test_ensure_writes_host_files() {
        let dir = tempfile::tempdir().unwrap();
        let (h, runner) = host(dir.path(), |_, _| RunOutput::default());
        let app = h.ensure("Calculator").await.unwrap().unwrap();
        assert_eq!(app.name, "Calculator");
        assert!(app.url.starts_with("http://localhost:"));
        assert!(app.wwwroot.is_dir());
        let program = std::fs::read_to_string(app.project_dir.join("Program.cs")).unwrap();
        assert!(program.contains("UseStaticFiles"));
        let pointer = std::fs::read_to_string(app.project_dir.join(LAST_URL_FILE)).unwrap();
        assert_eq!(pointer, app.url);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.starts_with("new web -n \"Calculator\""));

        h.write_files(&app.wwwroot, &builtin::calculator()).unwrap();
        assert!(app.wwwroot.join("index.html").exists());
        assert!(app.wwwroot.join("app.js").exists());
    }

    #[tokio::test]
    async fn test_failed_toolchain_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let (h, _) = host(dir.path(), |_, _| RunOutput::spawn_failure("no dotnet"));
        assert!(h.ensure("Timer").await.unwrap().is_none());
    }

    #[test]
    fn test_write_files_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut def = builtin::notes();
        def.files.insert("../evil.txt".into(), "x".into());
        write_files(&dir.path().join("www"), &def).unwrap();
        assert!(!dir.path().join("evil.txt").exists());
        assert!(dir.path().join("www/index.html").exists());
    }
}
