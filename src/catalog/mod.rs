//! 生成器目录：规范 key → 生成器定义，每个定义一个 `generators/<key>.json`
//!
//! 枚举顺序固定为 key 的字典序，所以同分时总是 key 较小者胜出。

pub mod builtin;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::memory::repository::{write_json, Repository};
use crate::memory::synonyms::SYNONYMS_KEY;
use crate::memory::safe_file_name;

pub const GENERATORS_PREFIX: &str = "generators/";

/// 产物类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// 由生成的 Web 宿主项目提供的静态页面
    #[default]
    HostedWeb,
    /// 控制台程序，验证其标准输出
    Console,
}

/// 生成器定义：规范 key、标题、触发短语、文件内容（文件名 → 内容）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorDefinition {
    #[serde(default)]
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub kind: ArtifactKind,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// 短语 → 合法 key（字母数字 `-` `_`，小写；空则 "app"）
pub fn canonical_key_for(phrase: &str) -> String {
    let k = safe_file_name(phrase);
    if k.is_empty() {
        "app".to_string()
    } else {
        k
    }
}

fn storage_key(key: &str) -> String {
    format!("{}{}.json", GENERATORS_PREFIX, key)
}

pub struct GeneratorCatalog {
    repo: Arc<dyn Repository>,
}

impl GeneratorCatalog {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// 写入缺失的预置生成器；已存在的不覆盖（用户可能改过）
    pub fn ensure_builtin(&self) -> Result<()> {
        for def in builtin::seeded() {
            let k = storage_key(&def.key);
            if self.repo.get(&k)?.is_none() {
                write_json(self.repo.as_ref(), &k, &def)?;
                tracing::debug!(key = %def.key, "builtin generator seeded");
            }
        }
        Ok(())
    }

    /// 按 key 覆盖写入
    pub fn save(&self, def: &GeneratorDefinition) -> Result<()> {
        let key = canonical_key_for(&def.key);
        let mut stored = def.clone();
        stored.key = key.clone();
        write_json(self.repo.as_ref(), &storage_key(&key), &stored)?;
        tracing::info!(key = %key, title = %def.title, "generator saved");
        Ok(())
    }

    /// 直接按规范 key 读取
    pub fn get(&self, key: &str) -> Result<Option<GeneratorDefinition>> {
        let raw = match self.repo.get(&storage_key(&canonical_key_for(key)))? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Ok(Self::parse(key, &raw))
    }

    fn parse(fallback_key: &str, raw: &str) -> Option<GeneratorDefinition> {
        match serde_json::from_str::<GeneratorDefinition>(raw) {
            Ok(mut def) => {
                if def.key.is_empty() {
                    def.key = canonical_key_for(fallback_key);
                }
                Some(def)
            }
            Err(e) => {
                tracing::warn!(key = %fallback_key, error = %e, "skipping unreadable generator");
                None
            }
        }
    }

    /// 全部定义，按 key 字典序
    pub fn list(&self) -> Result<Vec<GeneratorDefinition>> {
        let mut out = Vec::new();
        for k in self.repo.list(GENERATORS_PREFIX)? {
            if k == SYNONYMS_KEY || !k.ends_with(".json") {
                continue;
            }
            let name = k
                .trim_start_matches(GENERATORS_PREFIX)
                .trim_end_matches(".json");
            if name.contains('/') {
                continue;
            }
            if let Some(raw) = self.repo.get(&k)? {
                if let Some(def) = Self::parse(name, &raw) {
                    out.push(def);
                }
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    /// 规范 key 或触发短语的精确匹配（忽略大小写）
    pub fn try_resolve(&self, key: &str) -> Result<Option<GeneratorDefinition>> {
        let wanted = key.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        let all = self.list()?;
        if let Some(def) = all.iter().find(|d| d.key.to_lowercase() == wanted) {
            return Ok(Some(def.clone()));
        }
        Ok(all
            .into_iter()
            .find(|d| d.triggers.iter().any(|t| t.trim().to_lowercase() == wanted)))
    }

    /// 按短语打分匹配：触发词全等 3 > 短语包含触发词 2 > 某个词等于触发词 1
    pub fn try_resolve_by_phrase(&self, phrase: &str) -> Result<Option<GeneratorDefinition>> {
        let p = phrase.trim().to_lowercase();
        if p.is_empty() {
            return Ok(None);
        }
        let tokens: Vec<&str> = p
            .split(|c: char| c == ' ' || c == '-' || c == '_')
            .filter(|t| !t.is_empty())
            .collect();

        let mut best: Option<(u8, GeneratorDefinition)> = None;
        for def in self.list()? {
            let mut score = 0u8;
            for trigger in &def.triggers {
                let t = trigger.trim().to_lowercase();
                if t.is_empty() {
                    continue;
                }
                let s = if t == p {
                    3
                } else if p.contains(&t) {
                    2
                } else if tokens.iter().any(|tok| *tok == t) {
                    1
                } else {
                    0
                };
                score = score.max(s);
            }
            if score == 3 {
                return Ok(Some(def));
            }
            if score > 0 && best.as_ref().map_or(true, |(b, _)| score > *b) {
                best = Some((score, def));
            }
        }
        Ok(best.map(|(_, d)| d))
    }

    /// 为未知短语生成并保存最小骨架
    pub fn learn_unknown(&self, phrase: &str) -> Result<GeneratorDefinition> {
        let key = canonical_key_for(phrase);
        let def = builtin::scaffold(&key, phrase);
        self.save(&def)?;
        tracing::info!(key = %key, "new generator scaffolded");
        Ok(def)
    }
}
