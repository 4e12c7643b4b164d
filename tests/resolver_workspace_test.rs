//! 意图解析 + 生成器目录 + 同义词缓存，跑在真实文件工作区上

use std::path::Path;
use std::sync::Arc;

use mason::catalog::{ArtifactKind, GeneratorCatalog};
use mason::config::ResolverSection;
use mason::memory::{FileRepository, Repository, SynonymStore};
use mason::resolver::{IntentResolver, ResolutionPath};

fn resolver(root: &Path) -> IntentResolver {
    let repo: Arc<dyn Repository> = Arc::new(FileRepository::new(root));
    IntentResolver::new(
        Arc::new(GeneratorCatalog::new(repo.clone())),
        Arc::new(SynonymStore::new(repo)),
        ResolverSection::default(),
    )
}

#[test]
fn test_builtins_are_seeded_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let r = resolver(dir.path());
    let d = r.decide("calculator");
    assert_eq!(d.key, "calculator");
    assert_eq!(d.definition.kind, ArtifactKind::HostedWeb);
    for key in ["calculator", "todo", "timer"] {
        assert!(
            dir.path().join(format!("generators/{}.json", key)).is_file(),
            "{} not seeded",
            key
        );
    }
}

#[test]
fn test_learned_phrase_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first = resolver(dir.path()).decide("simple calc please");
    assert_eq!(first.key, "calculator");
    assert_eq!(first.path, ResolutionPath::Heuristic);
    assert!(dir.path().join("generators/synonyms.json").is_file());

    let again = resolver(dir.path()).decide("simple calc please");
    assert_eq!(again.key, "calculator");
    assert_eq!(again.path, ResolutionPath::Cache);
}

#[test]
fn test_unknown_phrase_becomes_a_catalog_entry() {
    let dir = tempfile::tempdir().unwrap();
    let d = resolver(dir.path()).decide("weather station");
    assert_eq!(d.path, ResolutionPath::Scaffold);
    assert!(dir.path().join("generators/weatherstation.json").is_file());

    // 重启后由缓存直接命中同一个定义
    let again = resolver(dir.path()).decide("weather station");
    assert_eq!(again.key, "weatherstation");
    assert_eq!(again.path, ResolutionPath::Cache);
    assert_eq!(again.definition.title, d.definition.title);
}

#[test]
fn test_catalog_listing_skips_the_synonym_file() {
    let dir = tempfile::tempdir().unwrap();
    let r = resolver(dir.path());
    r.decide("мій гаманець");
    let keys: Vec<String> = r.catalog().list().unwrap().into_iter().map(|d| d.key).collect();
    assert!(keys.contains(&"wallet".to_string()));
    assert!(!keys.iter().any(|k| k == "synonyms"));
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
