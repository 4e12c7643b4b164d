//! 学习计划：levels.json 记录当前等级（最小 1），curriculum.json 记录每级的任务列表

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::memory::repository::{read_json, write_json, Repository};

pub const LEVELS_KEY: &str = "levels.json";
pub const CURRICULUM_KEY: &str = "curriculum.json";

#[derive(Debug, Serialize, Deserialize)]
struct Levels {
    current_level: u32,
}

type Curriculum = BTreeMap<String, Vec<String>>;

pub struct CurriculumStore {
    repo: Arc<dyn Repository>,
}

impl CurriculumStore {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub fn current_level(&self) -> Result<u32> {
        Ok(read_json::<Levels>(self.repo.as_ref(), LEVELS_KEY)?
            .map(|l| l.current_level.max(1))
            .unwrap_or(1))
    }

    pub fn set_level(&self, level: u32) -> Result<()> {
        write_json(
            self.repo.as_ref(),
            LEVELS_KEY,
            &Levels {
                current_level: level.max(1),
            },
        )
    }

    fn load(&self) -> Result<Curriculum> {
        Ok(read_json(self.repo.as_ref(), CURRICULUM_KEY)?.unwrap_or_default())
    }

    pub fn tasks(&self, level: u32) -> Result<Vec<String>> {
        Ok(self.load()?.remove(&level.to_string()).unwrap_or_default())
    }

    /// 移除完成的任务：优先精确（忽略大小写）匹配，否则移除第一项，避免措辞差异导致卡住
    pub fn mark_done(&self, level: u32, task: &str) -> Result<()> {
        let mut doc = self.load()?;
        let list = match doc.get_mut(&level.to_string()) {
            Some(l) if !l.is_empty() => l,
            _ => return Ok(()),
        };
        let wanted = task.trim().to_lowercase();
        let idx = list
            .iter()
            .position(|t| t.trim().to_lowercase() == wanted)
            .unwrap_or(0);
        list.remove(idx);
        write_json(self.repo.as_ref(), CURRICULUM_KEY, &doc)
    }

    pub fn level_up(&self, to: u32, reason: &str) -> Result<()> {
        tracing::info!(level = to, after = %reason, "level up");
        self.set_level(to)
    }
}
