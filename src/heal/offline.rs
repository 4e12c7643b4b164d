//! 离线知识表：联网诊断一无所获时按查询中的已知子串给出建议

use crate::memory::KnowledgeArticle;

struct OfflineEntry {
    needles: &'static [&'static str],
    title: &'static str,
    url: &'static str,
    actions: &'static [&'static str],
    summary: &'static str,
}

const TABLE: &[OfflineEntry] = &[
    OfflineEntry {
        needles: &["cs1513"],
        title: "CS1513: } expected",
        url: "https://learn.microsoft.com/dotnet/csharp/language-reference/compiler-messages/cs1513",
        actions: &["#fix: Add missing '}' brace (CS1513)", "dotnet build"],
        summary: "The compiler reached the end of a block without a closing brace. \
                  Check the last edited method or class and add the missing '}'.",
    },
    OfflineEntry {
        needles: &[
            "only one usage of each socket address",
            "address already in use",
            "kestrel",
        ],
        title: "Kestrel: port in use",
        url: "https://learn.microsoft.com/aspnet/core/fundamentals/servers/kestrel",
        actions: &["#fix: Change dev server port", "dotnet run --urls http://localhost:0"],
        summary: "Another process already listens on the requested port. \
                  Stop it or start the app on a different port with --urls.",
    },
];

/// 按查询（忽略大小写）匹配离线条目，可能命中多条
pub fn lookup(query: &str) -> Vec<KnowledgeArticle> {
    let q = query.to_lowercase();
    TABLE
        .iter()
        .filter(|e| e.needles.iter().any(|n| q.contains(n)))
        .map(|e| KnowledgeArticle {
            title: e.title.to_string(),
            url: e.url.to_string(),
            actions: e.actions.iter().map(|a| a.to_string()).collect(),
            summary: e.summary.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_signatures_have_offline_advice() {
        let cs = lookup("CS1513 fix");
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].title, "CS1513: } expected");
        assert!(cs[0].actions.contains(&"dotnet build".to_string()));

        let port = lookup("kestrel Only one usage of each socket address fix");
        assert_eq!(port.len(), 1);
        assert!(port[0].actions[1].contains("--urls"));
    }

    #[test]
    fn test_unknown_query_has_nothing() {
        assert!(lookup("weather station").is_empty());
    }
}
