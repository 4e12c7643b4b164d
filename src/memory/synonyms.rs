//! 同义词缓存：短语 → 规范 key
//!
//! 只做精确匹配（仅去掉首尾空白），不做大小写归一或词干化，近似说法各自独立学习。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::memory::repository::{read_json, write_json, Repository};

pub const SYNONYMS_KEY: &str = "generators/synonyms.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SynonymFile {
    #[serde(default)]
    items: BTreeMap<String, String>,
}

/// 持久化的短语缓存；每次写入整文件覆盖，后写者胜
pub struct SynonymStore {
    repo: Arc<dyn Repository>,
}

impl SynonymStore {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    fn load(&self) -> Result<SynonymFile> {
        Ok(read_json::<SynonymFile>(self.repo.as_ref(), SYNONYMS_KEY)?.unwrap_or_default())
    }

    /// 精确查找
    pub fn try_get(&self, phrase: &str) -> Result<Option<String>> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return Ok(None);
        }
        Ok(self.load()?.items.get(phrase).cloned())
    }

    /// 写入或覆盖映射；相同映射重复写入无副作用
    pub fn add(&self, phrase: &str, key: &str) -> Result<()> {
        let phrase = phrase.trim();
        if phrase.is_empty() || key.trim().is_empty() {
            return Ok(());
        }
        let mut file = self.load()?;
        if file.items.get(phrase).map(String::as_str) == Some(key) {
            return Ok(());
        }
        file.items.insert(phrase.to_string(), key.to_string());
        tracing::debug!(phrase = %phrase, key = %key, "synonym learned");
        write_json(self.repo.as_ref(), SYNONYMS_KEY, &file)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
