//! 会话状态：最近一次成功的产物，由命令循环持有并以 `&mut` 传给各处理器
//!
//! 启动时从工作区里的指针文件恢复。

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::artifact::{LAST_CONSOLE_FILE, LAST_URL_FILE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub last_url: Option<String>,
    /// 最近一个 Web 产物的项目目录
    pub last_artifact: Option<PathBuf>,
    pub last_console: Option<PathBuf>,
}

impl Session {
    /// 最新的 last_url.txt 与 last_console_path.txt
    pub fn restore(workspace: &Path) -> Self {
        let mut session = Session::default();

        let newest = WalkDir::new(workspace)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == LAST_URL_FILE)
            .filter_map(|e| {
                let modified = e.metadata().ok()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((modified, e.into_path()))
            })
            .max_by_key(|(modified, _)| *modified);
        if let Some((_, path)) = newest {
            if let Ok(url) = std::fs::read_to_string(&path) {
                let url = url.trim();
                if !url.is_empty() {
                    session.last_url = Some(url.to_string());
                    session.last_artifact = path.parent().map(Path::to_path_buf);
                }
            }
        }

        if let Ok(saved) = std::fs::read_to_string(workspace.join(LAST_CONSOLE_FILE)) {
            let dir = PathBuf::from(saved.trim());
            if !saved.trim().is_empty() && dir.is_dir() {
                session.last_console = Some(dir);
            }
        }

        tracing::debug!(?session, "session restored");
        session
    }

    pub fn remember_web(&mut self, url: &str, project_dir: &Path) {
        self.last_url = Some(url.to_string());
        self.last_artifact = Some(project_dir.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_reads_pointer_files() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("Playground/Timer");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join(LAST_URL_FILE), "http://localhost:5174\n").unwrap();
        let console = dir.path().join("Playground/ConsoleApp_101010");
        std::fs::create_dir_all(&console).unwrap();
        std::fs::write(dir.path().join(LAST_CONSOLE_FILE), console.display().to_string()).unwrap();

        let s = Session::restore(dir.path());
        assert_eq!(s.last_url.as_deref(), Some("http://localhost:5174"));
        assert_eq!(s.last_artifact.as_deref(), Some(app.as_path()));
        assert_eq!(s.last_console.as_deref(), Some(console.as_path()));
    }

    #[test]
    fn test_empty_workspace_gives_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Session::restore(dir.path()), Session::default());
        assert_eq!(Session::restore(&dir.path().join("missing")), Session::default());
    }
}
