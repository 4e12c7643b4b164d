//! 风格引擎：从短语关键词推断主题/字体/圆角等，按标题缓存到 style_prefs.json，并注入到页面
//!
//! 强调色色相由短语与标题的稳定哈希得出，同一请求总得到同一配色。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::GeneratorDefinition;
use crate::core::Result;
use crate::memory::{read_json, write_json, Repository};

pub const STYLE_PREFS_KEY: &str = "style_prefs.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Font {
    Mono,
    Serif,
    Rounded,
    Modern,
    System,
}

impl Font {
    pub fn stack(self) -> &'static str {
        match self {
            Font::Mono => "ui-monospace, SFMono-Regular, Menlo, Consolas, \"Liberation Mono\", monospace",
            Font::Serif => "ui-serif, Georgia, Cambria, \"Times New Roman\", Times, serif",
            Font::Rounded => "\"Segoe UI Rounded\", \"SF Pro Rounded\", ui-sans-serif, system-ui, Segoe UI, Roboto, Ubuntu, Helvetica, Arial, sans-serif",
            Font::Modern => "\"Inter\", \"SF Pro Text\", ui-sans-serif, system-ui, Segoe UI, Roboto, Ubuntu, Helvetica, Arial, sans-serif",
            Font::System => "ui-sans-serif, system-ui, Segoe UI, Roboto, Ubuntu, Helvetica, Arial, sans-serif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub theme: Theme,
    pub font: Font,
    pub radius: u32,
    pub soft_shadow: bool,
    pub accent_hue: u32,
    pub density: f64,
}

/// 稳定色相 0..360
pub fn hue_from(text: &str) -> u32 {
    let mut h: i32 = 0;
    for ch in text.chars() {
        h = h.wrapping_mul(31) ^ (ch as i32);
    }
    h.wrapping_abs().rem_euclid(360) as u32
}

fn any(p: &str, words: &[&str]) -> bool {
    words.iter().any(|w| p.contains(w))
}

/// 只看关键词的推断，不读缓存
pub fn infer(phrase: &str, title: &str) -> StyleProfile {
    let p = phrase.to_lowercase();
    let theme = if any(&p, &["dark", "темн", "нічн"]) {
        Theme::Dark
    } else if any(&p, &["light", "світл"]) {
        Theme::Light
    } else {
        Theme::Auto
    };
    let font = if any(&p, &["mono", "консоль", "код"]) {
        Font::Mono
    } else if any(&p, &["serif", "класич"]) {
        Font::Serif
    } else if any(&p, &["rounded", "скругл", "дружн"]) {
        Font::Rounded
    } else if any(&p, &["elegant", "modern", "преміум"]) {
        Font::Modern
    } else {
        Font::System
    };
    let radius = if any(&p, &["neumorph", "glass", "rounded"]) {
        16
    } else if any(&p, &["material", "apple", "ios"]) {
        12
    } else {
        10
    };
    let density = if any(&p, &["compact", "щільн"]) {
        0.95
    } else if any(&p, &["spacious", "простор"]) {
        1.1
    } else {
        1.0
    };
    StyleProfile {
        theme,
        font,
        radius,
        soft_shadow: any(&p, &["neumorph", "glass", "premium", "преміум"]),
        accent_hue: hue_from(&format!("{}|{}", phrase, title)),
        density,
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StyleMap {
    #[serde(default)]
    items: BTreeMap<String, StyleProfile>,
}

/// 每个标题学到的风格
pub struct StyleStore {
    repo: Arc<dyn Repository>,
}

impl StyleStore {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    fn load(&self) -> Result<StyleMap> {
        Ok(read_json(self.repo.as_ref(), STYLE_PREFS_KEY)?.unwrap_or_default())
    }

    pub fn get(&self, title: &str) -> Result<Option<StyleProfile>> {
        Ok(self.load()?.items.get(title).cloned())
    }

    pub fn put(&self, title: &str, profile: &StyleProfile) -> Result<()> {
        let mut map = self.load()?;
        map.items.insert(title.to_string(), profile.clone());
        write_json(self.repo.as_ref(), STYLE_PREFS_KEY, &map)
    }

    /// 已缓存则直接返回，否则推断并记住；存储失败时仍返回推断结果
    pub fn resolve(&self, phrase: &str, title: &str) -> StyleProfile {
        match self.get(title) {
            Ok(Some(saved)) => return saved,
            Ok(None) => {}
            Err(e) => tracing::warn!(title = %title, error = %e, "style prefs unreadable"),
        }
        let profile = infer(phrase, title);
        if let Err(e) = self.put(title, &profile) {
            tracing::warn!(title = %title, error = %e, "style prefs not saved");
        }
        profile
    }
}

impl StyleProfile {
    pub fn color_scheme(&self) -> &'static str {
        match self.theme {
            Theme::Dark => "dark",
            Theme::Light => "light",
            Theme::Auto => "light dark",
        }
    }

    /// CSS 变量声明（不含 `:root{}` 外壳）
    pub fn css_vars(&self) -> String {
        let dark = self.theme == Theme::Dark;
        let (bg, card, border, text, ctrl_bg) = if dark {
            ("#0f1115", "#151922", "#242a36", "#e5e7eb", "#0f1115")
        } else {
            ("#f7f7f8", "#ffffff", "#e5e7eb", "#111111", "#ffffff")
        };
        let shadow = if self.soft_shadow {
            "0 10px 30px rgba(0,0,0,.15)"
        } else {
            "0 2px 10px rgba(0,0,0,.06)"
        };
        let hue = self.accent_hue % 360;
        format!(
            "\n  --bg: {bg};\n  --card: {card};\n  --border: {border};\n  --text: {text};\n  --ctrl-bg: {ctrl_bg};\n  --accent: hsl({hue} 70% 55%);\n  --accent-hover: hsl({hue} 70% 48%);\n  --radius: {}px;\n  --shadow: {shadow};\n  --density: {};\n  --font: {};\n",
            self.radius.clamp(6, 20),
            self.density,
            self.font.stack()
        )
    }

    pub fn base_css(&self) -> String {
        format!(
            "*{{box-sizing:border-box}}\n:root{{{}}}\n\
body{{font-family:var(--font); background:var(--bg); color:var(--text); margin:0; padding:calc(28px*var(--density))}}\n\
.card{{max-width:800px; margin:0 auto; background:var(--card); border:1px solid var(--border); border-radius:var(--radius); padding:calc(18px*var(--density)); box-shadow:var(--shadow)}}\n\
input,select,button,textarea{{padding:calc(10px*var(--density)) calc(12px*var(--density)); border-radius:var(--radius); border:1px solid var(--border); background:var(--ctrl-bg); color:var(--text)}}\n\
button{{background:var(--accent); color:#fff; border-color:transparent}}\n\
button:hover{{background:var(--accent-hover)}}\n\
.row{{display:flex; gap:12px; align-items:center; margin:10px 0}}\n\
h1{{margin:0 0 12px 0; font-size:22px}}\n\
.hint{{color:#7a7f87; font-size:13px}}\n",
            self.css_vars()
        )
    }

    /// 注入 color-scheme meta 与基础样式；只作用于带 index.html 的 Web 生成物
    pub fn apply(&self, def: &mut GeneratorDefinition) {
        if let Some(html) = def.files.get_mut("index.html") {
            if !html.contains("color-scheme") {
                *html = html.replacen(
                    "<head>",
                    &format!("<head>\n<meta name=\"color-scheme\" content=\"{}\">", self.color_scheme()),
                    1,
                );
            }
        } else {
            return;
        }
        let css = match def.files.get("style.css") {
            Some(app_css) => format!("{}\n\n/* --- app css --- */\n{}", self.base_css(), app_css),
            None => self.base_css(),
        };
        def.files.insert("style.css".to_string(), css);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::memory::repository::MemoryRepository;

    #[test]
    fn test_keywords_drive_profile() {
        let s = infer("dark compact glass calculator", "Calculator");
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.radius, 16);
        assert!(s.soft_shadow);
        assert!((s.density - 0.95).abs() < f64::EPSILON);

        let plain = infer("calculator", "Calculator");
        assert_eq!(plain.theme, Theme::Auto);
        assert_eq!(plain.font, Font::System);
        assert_eq!(plain.radius, 10);
        assert_eq!(plain.color_scheme(), "light dark");

        assert_eq!(infer("світлий класичний таймер", "Timer").font, Font::Serif);
        assert_eq!(infer("світлий класичний таймер", "Timer").theme, Theme::Light);
    }

    #[test]
    fn test_hue_is_stable_and_bounded() {
        assert_eq!(hue_from("calculator|Calculator"), hue_from("calculator|Calculator"));
        for s in ["", "a", "темний калькулятор|Calculator", &"x".repeat(500)] {
            assert!(hue_from(s) < 360);
        }
        assert_eq!(hue_from(""), 0);
    }

    #[test]
    fn test_store_remembers_first_style_per_title() {
        let store = StyleStore::new(Arc::new(MemoryRepository::new()));
        let first = store.resolve("dark timer", "Timer");
        let second = store.resolve("light timer", "Timer");
        assert_eq!(first, second);
        assert_eq!(second.theme, Theme::Dark);
        assert_eq!(store.get("Calculator").unwrap(), None);
    }

    #[test]
    fn test_apply_injects_meta_and_prepends_base_css() {
        let mut def = builtin::calculator();
        let original_css = def.files["style.css"].clone();
        let style = infer("dark calculator", "Calculator");
        style.apply(&mut def);
        let html = &def.files["index.html"];
        assert!(html.contains("<meta name=\"color-scheme\" content=\"dark\">"));
        let css = &def.files["style.css"];
        assert!(css.starts_with("*{box-sizing:border-box}\n:root{"));
        assert!(css.contains("--accent: hsl("));
        assert!(css.contains("--bg: #0f1115;"));
        assert!(css.ends_with(&original_css));

        // 第二次不重复插入 meta
        style.apply(&mut def);
        assert_eq!(def.files["index.html"].matches("color-scheme").count(), 1);
    }

    #[test]
    fn test_console_definitions_are_left_alone() {
        let mut def = builtin::console("Console", "hi");
        infer("dark", "Console").apply(&mut def);
        assert!(!def.files.contains_key("style.css"));
    }
}
