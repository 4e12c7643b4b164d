//! 记忆层：工作区内的持久化状态
//!
//! 所有存储都经由 [`Repository`]（文件或内存实现），上层逻辑不直接碰文件系统。

pub mod curriculum;
pub mod hints;
pub mod knowledge;
pub mod learnings;
pub mod progress;
pub mod repository;
pub mod synonyms;

pub use curriculum::CurriculumStore;
pub use hints::{truncate_chars, Hint, HintLog};
pub use knowledge::{safe_file_name, KnowledgeArticle, KnowledgeBase};
pub use learnings::{HistoryLog, LearningEntry, LearningLog};
pub use progress::{ProgressStore, SkillProgress};
pub use repository::{read_json, write_json, FileRepository, MemoryRepository, Repository};
pub use synonyms::SynonymStore;
