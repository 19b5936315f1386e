//! Server-side HTML rendering for the dashboard.

use std::collections::HashMap;

/// Escapes the characters that would break out of an HTML text node.
pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Renders the full state table, sorted by topic.
///
/// The output is a single line without newlines so it fits into one SSE
/// data field.
pub fn state_table(snapshot: &HashMap<String, String>) -> String {
    if snapshot.is_empty() {
        return "<p>Waiting for telemetry data...</p>".to_string();
    }

    let mut rows: Vec<(&String, &String)> = snapshot.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let mut html = String::from(concat!(
        r#"<table style="width:100%; border-collapse: collapse; margin-top: 15px;">"#,
        r#"<thead><tr>"#,
        r#"<th style="border: 1px solid #ddd; padding: 8px; text-align: left; background-color: #f2f2f2;">Topic</th>"#,
        r#"<th style="border: 1px solid #ddd; padding: 8px; text-align: left; background-color: #f2f2f2;">Value</th>"#,
        r#"</tr></thead><tbody>"#,
    ));
    for (topic, value) in rows {
        html.push_str(&format!(
            concat!(
                r#"<tr><td style="border: 1px solid #ddd; padding: 8px;">{}</td>"#,
                r#"<td style="border: 1px solid #ddd; padding: 8px;">{}</td></tr>"#
            ),
            escape_html(topic),
            escape_html(value)
        ));
    }
    html.push_str("</tbody></table>");
    html
}

/// Renders the dashboard page around the current state table.
pub fn dashboard_page(snapshot: &HashMap<String, String>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>OpenDash</title>
<style>
body {{ font-family: sans-serif; margin: 2em auto; max-width: 60em; }}
form, .actions {{ margin-top: 1em; }}
input {{ padding: 4px; }}
</style>
</head>
<body>
<h1>Telemetry Dashboard</h1>
<div id="telemetry">{table}</div>
<h2>Device settings</h2>
<form id="setting-form">
<input name="name" placeholder="setting name" required>
<input name="value" placeholder="new value" required>
<button type="submit">Change setting</button>
</form>
<div class="actions">
<button id="request-settings">Request settings</button>
</div>
<script>
const source = new EventSource('/events');
source.onmessage = (event) => {{
  document.getElementById('telemetry').innerHTML = event.data;
}};
document.getElementById('setting-form').addEventListener('submit', async (event) => {{
  event.preventDefault();
  const form = new FormData(event.target);
  await fetch('/api/settings', {{
    method: 'POST',
    headers: {{'Content-Type': 'application/json'}},
    body: JSON.stringify({{name: form.get('name'), value: form.get('value')}}),
  }});
}});
document.getElementById('request-settings').addEventListener('click', () => {{
  fetch('/api/settings/request', {{method: 'POST'}});
}});
</script>
</body>
</html>
"#,
        table = state_table(snapshot)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn escape_covers_the_markup_characters() {
        assert_eq!(escape_html("a & <b>"), "a &amp; &lt;b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn empty_snapshot_renders_a_placeholder() {
        let html = state_table(&HashMap::new());
        assert!(html.contains("Waiting for telemetry data"));
    }

    #[test]
    fn table_is_sorted_and_single_line() {
        let html = state_table(&snapshot(&[("b/topic", "2"), ("a/topic", "1")]));
        assert!(html.find("a/topic").unwrap() < html.find("b/topic").unwrap());
        assert!(!html.contains('\n'));
    }

    #[test]
    fn values_are_escaped_in_the_table() {
        let html = state_table(&snapshot(&[("t", "<script>x</script>")]));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn page_embeds_the_table_and_the_stream_hookup() {
        let page = dashboard_page(&snapshot(&[("status", "ok")]));
        assert!(page.contains("status"));
        assert!(page.contains("EventSource('/events')"));
        assert!(page.contains("/api/settings/request"));
    }
}
