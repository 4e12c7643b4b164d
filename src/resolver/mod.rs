//! 意图解析：任意短语 → 生成器定义
//!
//! 顺序：同义词缓存 → 关键词启发式 → 词袋相似度 → 骨架兜底。`decide` 是全函数：
//! 存储出错时记 warn 并进入下一步，最后一步即使写盘失败也返回内存中的骨架。

pub mod heuristics;
pub mod similarity;

use std::sync::Arc;

use crate::catalog::{builtin, canonical_key_for, GeneratorCatalog, GeneratorDefinition};
use crate::config::ResolverSection;
use crate::core::Result;
use crate::memory::SynonymStore;

use similarity::{cosine, term_vector, tokenize};

/// 相似度命中的置信档
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Strong,
    Okay,
}

/// 本次解析走的路径
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionPath {
    Cache,
    Heuristic,
    Similarity { score: f64, confidence: Confidence },
    Scaffold,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub definition: GeneratorDefinition,
    pub key: String,
    pub path: ResolutionPath,
}

fn soft<T>(r: Result<Option<T>>, step: &str) -> Option<T> {
    r.unwrap_or_else(|e| {
        tracing::warn!(step = %step, error = %e, "resolver step failed, falling through");
        None
    })
}

/// 参与相似度计算的文本：标题、触发词、文件名与内容
fn corpus_blob(def: &GeneratorDefinition) -> String {
    let mut blob = String::new();
    blob.push_str(&def.title);
    blob.push('\n');
    for t in &def.triggers {
        blob.push_str(t);
        blob.push('\n');
    }
    for (name, body) in &def.files {
        blob.push_str(name);
        blob.push('\n');
        blob.push_str(body);
        blob.push('\n');
    }
    blob
}

pub struct IntentResolver {
    catalog: Arc<GeneratorCatalog>,
    synonyms: Arc<SynonymStore>,
    thresholds: ResolverSection,
}

impl IntentResolver {
    pub fn new(
        catalog: Arc<GeneratorCatalog>,
        synonyms: Arc<SynonymStore>,
        thresholds: ResolverSection,
    ) -> Self {
        Self {
            catalog,
            synonyms,
            thresholds,
        }
    }

    pub fn catalog(&self) -> &GeneratorCatalog {
        &self.catalog
    }

    pub fn synonyms(&self) -> &SynonymStore {
        &self.synonyms
    }

    /// 解析短语；总能返回一个定义
    pub fn decide(&self, phrase: &str) -> Decision {
        if let Err(e) = self.catalog.ensure_builtin() {
            tracing::warn!(error = %e, "builtin seeding failed");
        }

        if let Some(d) = self.from_cache(phrase) {
            return d;
        }
        if let Some(d) = self.from_heuristics(phrase) {
            return d;
        }
        if let Some(d) = self.from_similarity(phrase) {
            return d;
        }
        self.scaffold(phrase)
    }

    fn remember(&self, phrase: &str, key: &str) {
        if let Err(e) = self.synonyms.add(phrase, key) {
            tracing::warn!(phrase = %phrase, error = %e, "synonym write failed");
        }
    }

    fn from_cache(&self, phrase: &str) -> Option<Decision> {
        let key = soft(self.synonyms.try_get(phrase), "cache")?;
        match soft(self.catalog.try_resolve(&key), "cache-resolve") {
            Some(def) => {
                tracing::info!(phrase = %phrase, key = %def.key, "resolved from synonym cache");
                Some(Decision {
                    key: def.key.clone(),
                    definition: def,
                    path: ResolutionPath::Cache,
                })
            }
            None => {
                tracing::warn!(phrase = %phrase, key = %key, "stale synonym, re-resolving");
                None
            }
        }
    }

    fn from_heuristics(&self, phrase: &str) -> Option<Decision> {
        let rule = heuristics::match_rule(phrase)?;
        let def = match soft(self.catalog.get(rule.key), "heuristic-get") {
            Some(stored) => stored,
            None => {
                let built = (rule.build)();
                if let Err(e) = self.catalog.save(&built) {
                    tracing::warn!(key = %rule.key, error = %e, "heuristic generator not saved");
                }
                built
            }
        };
        self.remember(phrase, rule.key);
        tracing::info!(phrase = %phrase, key = %rule.key, "resolved by heuristic");
        Some(Decision {
            key: rule.key.to_string(),
            definition: def,
            path: ResolutionPath::Heuristic,
        })
    }

    /// 与目录中每个定义算余弦，取最大；同分保留先出现者（key 字典序）
    pub fn best_match(&self, phrase: &str) -> Option<(GeneratorDefinition, f64)> {
        let query = term_vector(tokenize(phrase));
        if query.is_empty() {
            return None;
        }
        let defs = soft(self.catalog.list().map(Some), "similarity-list")?;
        let mut best: Option<(GeneratorDefinition, f64)> = None;
        for def in defs {
            let score = cosine(&query, &term_vector(tokenize(&corpus_blob(&def))));
            if score > best.as_ref().map_or(0.0, |(_, s)| *s) {
                best = Some((def, score));
            }
        }
        best
    }

    fn from_similarity(&self, phrase: &str) -> Option<Decision> {
        let (def, score) = self.best_match(phrase)?;
        if score < self.thresholds.okay_threshold {
            tracing::debug!(phrase = %phrase, best = %def.key, score, "similarity below threshold");
            return None;
        }
        let confidence = if score >= self.thresholds.strong_threshold {
            Confidence::Strong
        } else {
            Confidence::Okay
        };
        if score >= self.thresholds.persist_threshold {
            self.remember(phrase, &def.key);
        }
        tracing::info!(phrase = %phrase, key = %def.key, score, ?confidence, "resolved by similarity");
        Some(Decision {
            key: def.key.clone(),
            definition: def,
            path: ResolutionPath::Similarity { score, confidence },
        })
    }

    fn scaffold(&self, phrase: &str) -> Decision {
        let key = canonical_key_for(phrase);
        let def = match soft(self.catalog.get(&key), "scaffold-get") {
            // key 已被占用时沿用现有定义，保持一个 key 一个定义
            Some(existing) => existing,
            None => self.catalog.learn_unknown(phrase).unwrap_or_else(|e| {
                tracing::warn!(key = %key, error = %e, "scaffold not saved");
                builtin::scaffold(&key, phrase)
            }),
        };
        self.remember(phrase, &key);
        tracing::info!(phrase = %phrase, key = %key, "resolved by scaffold");
        Decision {
            key,
            definition: def,
            path: ResolutionPath::Scaffold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::repository::MemoryRepository;
    use crate::memory::Repository;

    fn resolver_with(repo: Arc<dyn Repository>) -> IntentResolver {
        IntentResolver::new(
            Arc::new(GeneratorCatalog::new(repo.clone())),
            Arc::new(SynonymStore::new(repo)),
            ResolverSection::default(),
        )
    }

    fn resolver() -> IntentResolver {
        resolver_with(Arc::new(MemoryRepository::new()))
    }

    #[test]
    fn test_calculator_resolves_to_builtin_then_from_cache() {
        let r = resolver();
        let first = r.decide("calculator");
        assert_eq!(first.key, "calculator");
        assert_eq!(first.definition.title, "Calculator");
        assert_ne!(first.path, ResolutionPath::Cache);

        let second = r.decide("calculator");
        assert_eq!(second.key, "calculator");
        assert_eq!(second.path, ResolutionPath::Cache);
    }

    #[test]
    fn test_decide_is_total_for_odd_input() {
        let r = resolver();
        for phrase in ["", "   ", "?!", "a", "the of and", "погода на завтра"] {
            let d = r.decide(phrase);
            assert!(!d.key.is_empty(), "empty key for {:?}", phrase);
            assert!(!d.definition.title.is_empty());
        }
    }

    #[test]
    fn test_repeat_phrase_uses_cache_on_every_path() {
        let r = resolver();
        for phrase in ["my wallet", "weather station dashboard"] {
            let a = r.decide(phrase);
            let b = r.decide(phrase);
            assert_eq!(a.key, b.key);
            assert_eq!(b.path, ResolutionPath::Cache);
        }
    }

    #[test]
    fn test_heuristic_hit_is_persisted_immediately() {
        let r = resolver();
        let d = r.decide("простий секундомер");
        assert_eq!(d.path, ResolutionPath::Heuristic);
        assert_eq!(d.key, "timer");
        assert_eq!(r.synonyms().try_get("простий секундомер").unwrap().as_deref(), Some("timer"));
    }

    #[test]
    fn test_similarity_hit_over_threshold() {
        let r = resolver();
        r.catalog()
            .save(&GeneratorDefinition {
                key: "weather".into(),
                title: "Weather".into(),
                triggers: vec!["weather forecast".into()],
                kind: Default::default(),
                files: Default::default(),
            })
            .unwrap();
        let d = r.decide("forecast weather today");
        assert_eq!(d.key, "weather");
        assert!(matches!(
            d.path,
            ResolutionPath::Similarity {
                confidence: Confidence::Strong,
                ..
            }
        ));
        assert_eq!(
            r.synonyms().try_get("forecast weather today").unwrap().as_deref(),
            Some("weather")
        );
    }

    #[test]
    fn test_raised_persist_threshold_defers_learning() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let r = IntentResolver::new(
            Arc::new(GeneratorCatalog::new(repo.clone())),
            Arc::new(SynonymStore::new(repo)),
            ResolverSection {
                persist_threshold: 1.1,
                ..ResolverSection::default()
            },
        );
        r.catalog()
            .save(&GeneratorDefinition {
                key: "weather".into(),
                title: "Weather".into(),
                triggers: vec!["weather forecast".into()],
                kind: Default::default(),
                files: Default::default(),
            })
            .unwrap();
        let d = r.decide("weather forecast tomorrow");
        assert_eq!(d.key, "weather");
        assert!(r.synonyms().try_get("weather forecast tomorrow").unwrap().is_none());
    }

    #[test]
    fn test_unknown_phrase_is_scaffolded_and_cataloged() {
        let r = resolver();
        let d = r.decide("weather station");
        assert_eq!(d.path, ResolutionPath::Scaffold);
        assert_eq!(d.key, "weatherstation");
        assert!(r.catalog().get("weatherstation").unwrap().is_some());
    }

    #[test]
    fn test_stale_synonym_falls_through() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let r = resolver_with(repo.clone());
        r.synonyms().add("my gadget", "deleted-key").unwrap();
        let d = r.decide("my gadget");
        assert_ne!(d.path, ResolutionPath::Cache);
        assert_ne!(d.key, "deleted-key");
    }

    #[test]
    fn test_uninformative_phrase_has_no_best_match() {
        let r = resolver();
        r.catalog().ensure_builtin().unwrap();
        assert!(r.best_match("please make the app").is_none());
    }
}
