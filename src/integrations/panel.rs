//! 控制面板：本机 HTTP 页面，把命令投进主控循环的收件箱
//!
//! `GET /` 返回页面，`POST /send`（表单字段 `cmd`）入队并记入 logs/history.jsonl，其余 404。

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::PanelSection;
use crate::core::{AgentError, Result};
use crate::memory::HistoryLog;

const PANEL_PAGE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Mason</title>
<style>
body{font-family:system-ui,sans-serif; max-width:720px; margin:40px auto; padding:0 16px}
input{width:75%; padding:8px} button{padding:8px 14px}
#log{margin-top:16px; color:#555; font-size:14px; white-space:pre-wrap}
</style>
</head>
<body>
<h1>Mason</h1>
<form id="f">
<input id="cmd" name="cmd" autocomplete="off" placeholder="create calculator">
<button type="submit">Send</button>
</form>
<div id="log"></div>
<script>
document.getElementById('f').addEventListener('submit', async (e) => {
  e.preventDefault();
  const input = document.getElementById('cmd');
  const cmd = input.value.trim();
  if (!cmd) return;
  const res = await fetch('/send', {
    method: 'POST',
    headers: {'Content-Type': 'application/x-www-form-urlencoded'},
    body: 'cmd=' + encodeURIComponent(cmd)
  });
  document.getElementById('log').textContent = cmd + ' -> ' + res.status + '\n' + document.getElementById('log').textContent;
  input.value = '';
});
</script>
</body>
</html>
"#;

pub struct PanelState {
    pub inbox: mpsc::UnboundedSender<String>,
    pub history: HistoryLog,
}

#[derive(Debug, Deserialize)]
pub struct SendForm {
    #[serde(default)]
    pub cmd: String,
}

pub fn router(state: Arc<PanelState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/send", post(send))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(PANEL_PAGE)
}

async fn send(
    State(state): State<Arc<PanelState>>,
    Form(form): Form<SendForm>,
) -> (StatusCode, Json<serde_json::Value>) {
    let cmd = form.cmd.trim();
    if cmd.is_empty() {
        return (StatusCode::OK, Json(serde_json::json!({ "ok": true })));
    }
    if state.inbox.send(cmd.to_string()).is_err() {
        tracing::warn!(cmd = %cmd, "inbox closed, command dropped");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ok": false })),
        );
    }
    state.history.record(cmd);
    tracing::debug!(cmd = %cmd, "command queued from panel");
    (StatusCode::OK, Json(serde_json::json!({ "ok": true })))
}

/// 绑定配置里的地址并服务到 token 取消
pub async fn serve(cfg: &PanelSection, state: Arc<PanelState>, token: CancellationToken) -> Result<()> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AgentError::Panel(format!("bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, "control panel listening");
    serve_on(listener, state, token).await
}

pub async fn serve_on(listener: TcpListener, state: Arc<PanelState>, token: CancellationToken) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| AgentError::Panel(e.to_string()))?;
    tracing::info!("control panel stopped");
    Ok(())
}
