//! 技能进度：按 key 记录成功/失败次数，level = min(10, successes / 3)
//!
//! 仅作遥测参考，不参与任何决策。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::memory::repository::{read_json, write_json, Repository};

pub const PROGRESS_KEY: &str = "skill_progress.json";
const MAX_LEVEL: u32 = 10;
const SUCCESSES_PER_LEVEL: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillProgress {
    pub key: String,
    pub successes: u32,
    pub failures: u32,
    pub level: u32,
}

impl SkillProgress {
    fn recompute_level(&mut self) {
        self.level = (self.successes / SUCCESSES_PER_LEVEL).min(MAX_LEVEL);
    }
}

pub struct ProgressStore {
    repo: Arc<dyn Repository>,
}

impl ProgressStore {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub fn load(&self) -> Result<BTreeMap<String, SkillProgress>> {
        Ok(read_json(self.repo.as_ref(), PROGRESS_KEY)?.unwrap_or_default())
    }

    /// 记录一次结果并返回更新后的进度
    pub fn bump(&self, key: &str, ok: bool) -> Result<SkillProgress> {
        let mut map = self.load()?;
        let entry = map.entry(key.to_string()).or_insert_with(|| SkillProgress {
            key: key.to_string(),
            ..Default::default()
        });
        if ok {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.recompute_level();
        let updated = entry.clone();
        write_json(self.repo.as_ref(), PROGRESS_KEY, &map)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::repository::MemoryRepository;

    #[test]
    fn test_level_grows_every_three_successes_and_caps() {
        let store = ProgressStore::new(Arc::new(MemoryRepository::new()));
        let mut last = SkillProgress::default();
        for _ in 0..2 {
            last = store.bump("calculator", true).unwrap();
        }
        assert_eq!(last.level, 0);
        last = store.bump("calculator", true).unwrap();
        assert_eq!(last.level, 1);
        for _ in 0..40 {
            last = store.bump("calculator", true).unwrap();
        }
        assert_eq!(last.level, 10);
    }

    #[test]
    fn test_failures_do_not_change_level() {
        let store = ProgressStore::new(Arc::new(MemoryRepository::new()));
        store.bump("timer", false).unwrap();
        let p = store.bump("timer", false).unwrap();
        assert_eq!(p.failures, 2);
        assert_eq!(p.level, 0);
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
