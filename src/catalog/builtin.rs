//! 内置生成器：预置的 calculator / todo / timer，启发式表用到的 wallet / notes / counter / pomodoro / converter，
//! 以及未知短语的最小骨架。

use std::collections::BTreeMap;

use super::{ArtifactKind, GeneratorDefinition};

const BASE_CSS: &str = "*{box-sizing:border-box}body{font-family:system-ui,Segoe UI,Roboto,Ubuntu;background:#f7f7f8;margin:0;padding:32px}\n.card{max-width:640px;margin:0 auto;background:#fff;border:1px solid #e5e7eb;border-radius:16px;padding:20px;box-shadow:0 6px 30px rgba(0,0,0,.06)}\n.row{display:flex;gap:8px;align-items:center;margin:10px 0}\ninput,select,button,textarea{padding:10px 12px;border:1px solid #d1d5db;border-radius:10px}\nbutton{border-color:#111;background:#111;color:#fff}\n";

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// 标准页面骨架：带 `<head>`、`<title>`、`<h1>`，引用 style.css 与 app.js
fn page(title: &str, body: &str) -> String {
    let t = escape_html(title);
    format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\n<title>{t}</title><link rel=\"stylesheet\" href=\"style.css\"></head>\n<body>\n<div class=\"card\"><h1>{t}</h1>\n{body}\n</div>\n<script src=\"app.js\"></script>\n</body></html>\n"
    )
}

fn web(key: &str, title: &str, triggers: &[&str], body: &str, css: &str, js: &str) -> GeneratorDefinition {
    let mut files = BTreeMap::new();
    files.insert("index.html".to_string(), page(title, body));
    files.insert("style.css".to_string(), format!("{}{}", BASE_CSS, css));
    files.insert("app.js".to_string(), js.to_string());
    GeneratorDefinition {
        key: key.to_string(),
        title: title.to_string(),
        triggers: triggers.iter().map(|s| s.to_string()).collect(),
        kind: ArtifactKind::HostedWeb,
        files,
    }
}

pub fn calculator() -> GeneratorDefinition {
    web(
        "calculator",
        "Calculator",
        &["калькулятор", "calculator"],
        r#"<div class="row"><input id="a" type="number" placeholder="A">
<select id="op"><option>+</option><option>-</option><option>*</option><option>/</option></select>
<input id="b" type="number" placeholder="B"><button id="calc">=</button></div>
<div id="out"></div>"#,
        "#out{margin-top:12px;font-weight:600}\n",
        r#"const a=document.getElementById('a'),b=document.getElementById('b'),op=document.getElementById('op'),out=document.getElementById('out');
document.getElementById('calc').onclick=()=>{const x=parseFloat(a.value),y=parseFloat(b.value);
if(Number.isNaN(x)||Number.isNaN(y)){out.textContent='Enter numbers';return;}
let r=0;switch(op.value){case '+':r=x+y;break;case '-':r=x-y;break;case '*':r=x*y;break;case '/':r=y===0?'∞':x/y;break;}
out.textContent='Result: '+r;};
"#,
    )
}

pub fn todo() -> GeneratorDefinition {
    web(
        "todo",
        "Todo",
        &["todo", "to-do", "замітки", "список задач"],
        r#"<div class="row"><input id="task" placeholder="What to do?"><button id="add">Add</button></div>
<ul id="list"></ul>"#,
        "li{display:flex;justify-content:space-between;padding:8px;border-bottom:1px dashed #e5e7eb}\n",
        r#"const input=document.getElementById('task'),list=document.getElementById('list');
document.getElementById('add').onclick=()=>{const v=input.value.trim();if(!v)return;
const li=document.createElement('li');li.textContent=v;const del=document.createElement('button');
del.textContent='×';del.onclick=()=>li.remove();li.appendChild(del);list.appendChild(li);input.value='';};
"#,
    )
}

pub fn timer() -> GeneratorDefinition {
    web(
        "timer",
        "Timer",
        &["timer", "таймер", "stopwatch"],
        r#"<div id="clock">00:00:00</div>
<div class="row"><button id="start">Start</button><button id="stop">Stop</button><button id="reset">Reset</button></div>"#,
        "#clock{font-size:48px;margin:14px 0;text-align:center}\n",
        r#"let h=0,m=0,s=0,t=null;const clock=document.getElementById('clock');
function render(){clock.textContent=[h,m,s].map(x=>String(x).padStart(2,'0')).join(':');}
document.getElementById('start').onclick=()=>{if(t)return;t=setInterval(()=>{s++;if(s==60){s=0;m++;}if(m==60){m=0;h++;}render();},1000);};
document.getElementById('stop').onclick=()=>{clearInterval(t);t=null;};
document.getElementById('reset').onclick=()=>{h=0;m=0;s=0;render();};render();
"#,
    )
}

pub fn wallet() -> GeneratorDefinition {
    web(
        "wallet",
        "Wallet",
        &["гаманець", "wallet", "баланс"],
        r#"<div class="row"><input id="amount" type="number" step="0.01" placeholder="Amount">
<select id="type"><option value="in">Income</option><option value="out">Expense</option></select>
<button id="add">Add</button></div>
<div class="row"><strong>Balance:</strong> <span id="balance">0.00</span></div>
<ul id="list"></ul>"#,
        "ul{list-style:none;padding:0}li{padding:8px;border-bottom:1px dashed #e5e7eb}.in{color:#0a7}.out{color:#c33}\n",
        r#"const amount=document.getElementById('amount'),type=document.getElementById('type'),list=document.getElementById('list'),bal=document.getElementById('balance');
const KEY='wallet_v1';let items=JSON.parse(localStorage.getItem(KEY)||'[]');
function render(){list.innerHTML='';let b=0;for(const it of items){b+=it.type==='in'?it.amount:-it.amount;
const li=document.createElement('li');li.className=it.type;li.textContent=(it.type==='in'?'+ ':'- ')+it.amount.toFixed(2);list.appendChild(li);}
bal.textContent=b.toFixed(2);}
document.getElementById('add').onclick=()=>{const a=parseFloat(amount.value);if(Number.isNaN(a)||a<=0)return;
items.push({amount:a,type:type.value});localStorage.setItem(KEY,JSON.stringify(items));amount.value='';render();};render();
"#,
    )
}

pub fn notes() -> GeneratorDefinition {
    web(
        "notes",
        "Notes",
        &["нотатка", "нотатки", "замітка", "notes"],
        r#"<textarea id="pad" placeholder="Write here…"></textarea>
<div class="hint">Saved locally (localStorage)</div>"#,
        "textarea{width:100%;min-height:420px;font-family:ui-monospace,Consolas,monospace}.hint{margin-top:8px;color:#666;font-size:13px}\n",
        r#"const KEY='notes_v1',pad=document.getElementById('pad');pad.value=localStorage.getItem(KEY)||'';
let t=null;pad.addEventListener('input',()=>{clearTimeout(t);t=setTimeout(()=>localStorage.setItem(KEY,pad.value),250);});
"#,
    )
}

pub fn counter() -> GeneratorDefinition {
    web(
        "counter",
        "Counter",
        &["лічильник", "counter"],
        r#"<div id="val">0</div>
<div class="row"><button id="inc">+1</button><button id="dec">-1</button><button id="reset">Reset</button></div>"#,
        "#val{font-size:56px;margin:12px 0;text-align:center}\n",
        r#"let v=0;const el=document.getElementById('val');function r(){el.textContent=v;}
document.getElementById('inc').onclick=()=>{v++;r();};document.getElementById('dec').onclick=()=>{v--;r();};
document.getElementById('reset').onclick=()=>{v=0;r();};r();
"#,
    )
}

pub fn pomodoro() -> GeneratorDefinition {
    web(
        "pomodoro",
        "Pomodoro",
        &["pomodoro", "таймер помідора", "помідор"],
        r#"<div id="clock">25:00</div>
<div class="row"><button id="start">Start</button><button id="stop">Stop</button><button id="reset">Reset</button></div>"#,
        "#clock{font-size:56px;margin:12px 0;text-align:center}\n",
        r#"let t=null,sec=25*60;const out=document.getElementById('clock');
function render(){const m=Math.floor(sec/60),s=sec%60;out.textContent=String(m).padStart(2,'0')+':'+String(s).padStart(2,'0');}
document.getElementById('start').onclick=()=>{if(t)return;t=setInterval(()=>{sec=Math.max(0,sec-1);render();},1000);};
document.getElementById('stop').onclick=()=>{clearInterval(t);t=null;};
document.getElementById('reset').onclick=()=>{sec=25*60;render();};render();
"#,
    )
}

pub fn converter() -> GeneratorDefinition {
    web(
        "converter",
        "Converter",
        &["конвертер", "converter", "валюта", "currency"],
        r#"<div class="row"><input id="amount" type="number" step="0.01" placeholder="Amount">
<input id="rate" type="number" step="0.0001" placeholder="Rate"><button id="do">OK</button></div>
<div id="out"></div>"#,
        "#out{margin-top:10px;font-weight:600}\n",
        r#"const a=document.getElementById('amount'),r=document.getElementById('rate'),o=document.getElementById('out');
document.getElementById('do').onclick=()=>{const x=parseFloat(a.value),k=parseFloat(r.value);
if(Number.isNaN(x)||Number.isNaN(k)||k<=0){o.textContent='Enter amount and rate';return;}
o.textContent='Result: '+(Math.round(x*k*100)/100).toFixed(2);};
"#,
    )
}

/// 首字母大写；空串为 "App"
pub fn title_from(phrase: &str) -> String {
    let p = phrase.trim();
    let mut chars = p.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "App".to_string(),
    }
}

/// 未知短语的最小骨架：标题取自短语，唯一触发词就是短语本身
pub fn scaffold(key: &str, phrase: &str) -> GeneratorDefinition {
    let title = title_from(phrase);
    let body = format!(
        "<p>Scaffold for '{}'. Edit generators/{}.json to customize.</p>",
        escape_html(phrase.trim()),
        key
    );
    let mut def = web(key, &title, &[], &body, "", "// add logic here\n");
    def.triggers = vec![phrase.trim().to_string()];
    def
}

/// 预置生成器（catalog 启动时确保存在）
pub fn seeded() -> Vec<GeneratorDefinition> {
    vec![calculator(), todo(), timer()]
}

/// 控制台程序源码：输出给定文本
pub fn console_program(text: &str) -> String {
    let escaped = text.replace('"', "\"\"");
    format!(
        "using System;\nclass Program {{ static void Main() {{ Console.WriteLine(@\"{}\"); }} }}\n",
        escaped
    )
}

/// 控制台生成器：`Program.cs` 即全部内容
pub fn console(title: &str, text: &str) -> GeneratorDefinition {
    let mut files = BTreeMap::new();
    files.insert("Program.cs".to_string(), console_program(text));
    GeneratorDefinition {
        key: "console".to_string(),
        title: title.to_string(),
        triggers: vec!["console".to_string(), "консоль".to_string()],
        kind: ArtifactKind::Console,
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pages_carry_required_controls() {
        let calc = calculator();
        let html = &calc.files["index.html"];
        for id in ["a", "b", "op", "calc"] {
            assert!(html.contains(&format!("id=\"{}\"", id)), "missing #{}", id);
        }
        let timer = timer();
        for id in ["clock", "start", "stop", "reset"] {
            assert!(timer.files["index.html"].contains(&format!("id=\"{}\"", id)));
        }
        let wallet = wallet();
        for id in ["amount", "type", "add", "balance", "list"] {
            assert!(wallet.files["index.html"].contains(&format!("id=\"{}\"", id)));
        }
        assert!(notes().files["index.html"].contains("id=\"pad\""));
    }

    #[test]
    fn test_scaffold_escapes_phrase_and_capitalizes_title() {
        let def = scaffold("weatherboard", "weather <board>");
        assert_eq!(def.title, "Weather <board>");
        assert_eq!(def.triggers, vec!["weather <board>"]);
        assert!(def.files["index.html"].contains("weather &lt;board&gt;"));
        assert!(!def.files["index.html"].contains("<board>"));
    }

    #[test]
    fn test_console_program_escapes_quotes_verbatim_style() {
        let src = console_program("say \"hi\"");
        assert!(src.contains("@\"say \"\"hi\"\"\""));
        assert_eq!(console("Console", "x").kind, ArtifactKind::Console);
    }

    #[test]
    fn test_title_from_handles_multibyte_and_empty() {
        assert_eq!(title_from("гаманець"), "Гаманець");
        assert_eq!(title_from("   "), "App");
    }
}
