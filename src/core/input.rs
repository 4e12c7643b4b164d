//! 输入清洗：面板与命令行粘贴来的文本常带引号、智能引号、转义与多余空白

/// 成对的外层引号
const ENCLOSING: &[(char, char)] = &[('"', '"'), ('«', '»'), ('“', '”')];

/// 统一成 ASCII 双引号的字符
const SMART_QUOTES: &[char] = &['«', '»', '“', '”', '„'];

pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim();
    for (open, close) in ENCLOSING {
        if s.chars().count() >= 2 && s.starts_with(*open) && s.ends_with(*close) {
            s = s[open.len_utf8()..s.len() - close.len_utf8()].trim();
            break;
        }
    }
    let s: String = s
        .chars()
        .map(|c| if SMART_QUOTES.contains(&c) { '"' } else { c })
        .collect();
    let s = s.replace("\\\"", "\"");
    s.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_one_pair_of_enclosing_quotes() {
        assert_eq!(normalize("  \"create calculator\"  "), "create calculator");
        assert_eq!(normalize("«зроби таймер»"), "зроби таймер");
        assert_eq!(normalize("“todo”"), "todo");
        assert_eq!(normalize("\"\"x\"\""), "\"x\"");
    }

    #[test]
    fn test_smart_quotes_escapes_and_spaces() {
        assert_eq!(
            normalize("консоль що   виводить „Привіт“"),
            "консоль що виводить \"Привіт\""
        );
        assert_eq!(normalize(r#"prints \"hi\""#), "prints \"hi\"");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("\""), "\"");
    }
}
