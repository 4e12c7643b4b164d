//! 键值持久化：工作区内所有状态文件（目录、同义词、hint 日志、知识库等）都经由此接口读写
//!
//! key 是相对工作区的路径（`generators/calculator.json`、`healer_hints.jsonl`）。
//! 不做加锁：写入者只有单消费者的命令循环与控制面板（后者只追加 history）。

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use walkdir::WalkDir;

use crate::core::{AgentError, Result};

/// 存储抽象：get / put / append / list
pub trait Repository: Send + Sync {
    /// 读取整个值；不存在时返回 None
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// 覆盖写入
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// 追加一行（自动补换行）
    fn append(&self, key: &str, line: &str) -> Result<()>;

    /// 列出以 prefix 开头的所有 key，按字典序排序
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// 读取并按 JSON 解析；不存在或解析失败时返回 None（损坏文件视同缺失）
pub fn read_json<T: serde::de::DeserializeOwned>(
    repo: &dyn Repository,
    key: &str,
) -> Result<Option<T>> {
    Ok(repo.get(key)?.and_then(|raw| match serde_json::from_str::<T>(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "ignoring unreadable json");
            None
        }
    }))
}

/// 以缩进格式写入 JSON
pub fn write_json<T: serde::Serialize>(repo: &dyn Repository, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    repo.put(key, &raw)
}

/// 校验 key：非空、相对路径、不含 `..`
fn validate_key(key: &str) -> Result<&str> {
    let trimmed = key.trim_start_matches("./");
    if trimmed.is_empty() {
        return Err(AgentError::InvalidKey(key.to_string()));
    }
    let path = Path::new(trimmed);
    for c in path.components() {
        match c {
            Component::Normal(_) => {}
            _ => return Err(AgentError::InvalidKey(key.to_string())),
        }
    }
    Ok(trimmed)
}

/// 以工作区目录为根的文件存储
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// key 对应的绝对路径
    pub fn path_of(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }

    /// 前缀里最后一个 `/` 之前的目录；工作区里的其余目录（如 Playground 的构建产物）不遍历
    fn walk_root(&self, prefix: &str) -> PathBuf {
        match prefix.rfind('/') {
            Some(idx) => self.root.join(&prefix[..idx]),
            None => self.root.clone(),
        }
    }

    fn ensure_parent(path: &Path) -> std::io::Result<()> {
        if let Some(p) = path.parent() {
            std::fs::create_dir_all(p)?;
        }
        Ok(())
    }
}

impl Repository for FileRepository {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_of(key)?;
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_of(key)?;
        Self::ensure_parent(&path)?;
        std::fs::write(&path, value)?;
        Ok(())
    }

    fn append(&self, key: &str, line: &str) -> Result<()> {
        let path = self.path_of(key)?;
        Self::ensure_parent(&path)?;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        f.write_all(line.trim_end_matches('\n').as_bytes())?;
        f.write_all(b"\n")?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.walk_root(prefix);
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys: Vec<String> = WalkDir::new(&base)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            })
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// 内存存储：测试与无盘场景
#[derive(Debug, Default)]
pub struct MemoryRepository {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Repository for MemoryRepository {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let key = validate_key(key)?;
        Ok(self.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let key = validate_key(key)?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn append(&self, key: &str, line: &str) -> Result<()> {
        let key = validate_key(key)?;
        let mut map = self.lock();
        let entry = map.entry(key.to_string()).or_default();
        entry.push_str(line.trim_end_matches('\n'));
        entry.push('\n');
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
