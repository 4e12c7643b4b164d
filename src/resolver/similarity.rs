//! 词袋相似度：分词 → 去停用词 → 词频向量 → 余弦

use std::collections::HashMap;

/// 乌克兰语停用词（含常见动词祈使式）
const STOP_UA: &[&str] = &[
    "і", "й", "та", "або", "чи", "а", "у", "в", "на", "до", "за", "з", "із", "що", "це", "той",
    "ця", "будь", "будь-який", "будь-яка", "зроби", "створи", "створити", "зробити", "додай",
    "run", "make", "create", "and", "open",
];

const STOP_EN: &[&str] = &[
    "the", "a", "an", "to", "in", "on", "for", "of", "and", "or", "with", "this", "that", "please",
    "app", "program", "run", "make", "create", "open",
];

/// 乌克兰语特有字母，出现即按乌克兰语处理
const UA_MARKERS: &[char] = &['і', 'ї', 'є', 'ґ'];

pub type TermVector = HashMap<String, u32>;

/// 小写、非字母数字视为分隔符、按语言去停用词、丢弃单字符
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let raw: Vec<&str> = lowered.split_whitespace().collect();
    let is_ua = raw
        .iter()
        .any(|t| t.chars().any(|c| UA_MARKERS.contains(&c)));
    let stop = if is_ua { STOP_UA } else { STOP_EN };
    raw.into_iter()
        .filter(|t| t.chars().count() >= 2 && !stop.contains(t))
        .map(str::to_string)
        .collect()
}

pub fn term_vector<I: IntoIterator<Item = String>>(tokens: I) -> TermVector {
    let mut v = TermVector::new();
    for t in tokens {
        *v.entry(t).or_insert(0) += 1;
    }
    v
}

/// 任一向量为空时为 0
pub fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    let mut dot = 0.0;
    let mut na = 0.0;
    for (k, &va) in a {
        let va = f64::from(va);
        na += va * va;
        if let Some(&vb) = b.get(k) {
            dot += va * f64::from(vb);
        }
    }
    let nb: f64 = b.values().map(|&v| f64::from(v) * f64::from(v)).sum();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
