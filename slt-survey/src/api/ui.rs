//! Survey page
//!
//! One server-rendered page: every section, every item with its players and
//! one control per answer dimension. The page script turns each control
//! change into a single `PUT` against the session API and re-renders only the
//! status line; nothing is re-rendered on the server per keystroke.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use slt_common::{Answer, Catalog, Dimension, Section};
use std::fmt::Write as _;

use crate::AppState;

/// Radio buttons up to this many choices, a drop-down beyond
const MAX_RADIO_CHOICES: usize = 7;

const PAGE_CSS: &str = r#"
body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background: #1a1a1a; color: #e0e0e0; line-height: 1.6; margin: 0; }
header { background: #2a2a2a; border-bottom: 1px solid #3a3a3a; padding: 20px; }
h1 { font-size: 26px; margin: 0; color: #4a9eff; }
h2 { color: #4a9eff; }
main { padding: 0 20px 40px; max-width: 960px; }
.item { border-bottom: 1px solid #3a3a3a; padding: 12px 0; }
.players { display: flex; gap: 20px; flex-wrap: wrap; }
.player-error { color: #ef4444; font-size: 13px; }
.dimension { margin-top: 8px; }
.missing { outline: 2px solid #f59e0b; }
#status { margin: 16px 0; padding: 10px; border-radius: 4px; background: #2a2a2a; }
#status.error { background: #5b1d1d; }
#status.ok { background: #14532d; }
button { padding: 10px 20px; background: #4a9eff; color: #fff; border: 0; border-radius: 4px; font-weight: 600; cursor: pointer; }
"#;

const PAGE_JS: &str = r#"
let sessionId = null;

async function api(method, path, body) {
  const opts = { method, headers: { 'Content-Type': 'application/json' } };
  if (body !== undefined) opts.body = JSON.stringify(body);
  const resp = await fetch(path, opts);
  const text = await resp.text();
  return { status: resp.status, body: text ? JSON.parse(text) : null };
}

function setStatus(text, kind) {
  const el = document.getElementById('status');
  el.textContent = text;
  el.className = kind || '';
}

function describe(d) {
  if (d.type === 'missing_contact') return 'Please enter your email address.';
  if (d.type === 'malformed_contact') return 'Please enter a valid email address.';
  return `Section "${d.section_id}", item ${d.item_index + 1}: no answer for "${d.dimension}".`;
}

function markMissing(deficiencies) {
  document.querySelectorAll('.missing').forEach(el => el.classList.remove('missing'));
  for (const d of deficiencies) {
    const sel = d.type === 'missing_answer'
      ? `.dimension[data-section="${d.section_id}"][data-item="${d.item_index}"][data-dimension="${d.dimension}"]`
      : '#contact';
    const el = document.querySelector(sel);
    if (el) el.classList.add('missing');
  }
}

async function onAnswer(ev) {
  const box = ev.target.closest('.dimension');
  const r = await api('PUT', `/api/sessions/${sessionId}/answers`, {
    section_id: box.dataset.section,
    item_index: Number(box.dataset.item),
    dimension: box.dataset.dimension,
    value: ev.target.value,
  });
  if (r.status === 404) setStatus('Your session has expired. Please reload the page to start again.', 'error');
  else if (r.status !== 204) setStatus(r.body.error.message, 'error');
  else box.classList.remove('missing');
}

async function onContact(ev) {
  await api('PUT', `/api/sessions/${sessionId}/contact`, { contact: ev.target.value });
}

async function onSubmit() {
  const r = await api('POST', `/api/sessions/${sessionId}/submit`);
  if (r.body.status === 'rejected') {
    markMissing(r.body.deficiencies);
    setStatus(r.body.message + ' ' + r.body.deficiencies.map(describe).join(' '), 'error');
  } else if (r.body.status === 'accepted') {
    clearForm();
    setStatus(r.body.message, 'ok');
  } else {
    setStatus(r.body.message, 'error');
  }
}

function clearForm() {
  document.querySelectorAll('input[type=radio]').forEach(el => { el.checked = false; });
  document.querySelectorAll('select').forEach(el => { el.value = ''; });
  document.getElementById('contact').value = '';
  markMissing([]);
}

async function startSession() {
  const r = await api('POST', '/api/sessions');
  if (r.status !== 201) {
    sessionId = null;
    setStatus(r.body.error.message, 'error');
    return false;
  }
  sessionId = r.body.session_id;
  return true;
}

// Leaving the page abandons the session; a page restored from the
// back/forward cache starts over with a new one.
window.addEventListener('pagehide', () => {
  if (sessionId) fetch(`/api/sessions/${sessionId}`, { method: 'DELETE', keepalive: true });
});
window.addEventListener('pageshow', async ev => {
  if (!ev.persisted) return;
  clearForm();
  if (await startSession()) setStatus('Please answer all items and enter a valid email to submit.');
});

document.addEventListener('DOMContentLoaded', async () => {
  const started = await startSession();
  document.querySelectorAll('audio[data-ref]').forEach(audio => {
    audio.src = '/media?ref=' + encodeURIComponent(audio.dataset.ref);
    audio.addEventListener('error', () => {
      audio.nextElementSibling.textContent = 'Could not load this recording.';
    });
  });
  document.querySelectorAll('.dimension input, .dimension select')
    .forEach(el => el.addEventListener('change', onAnswer));
  document.getElementById('contact').addEventListener('change', onContact);
  document.getElementById('submit').addEventListener('click', onSubmit);
  if (started) setStatus('Please answer all items and enter a valid email to submit.');
});
"#;

/// Minimal HTML escaping for catalog-provided text
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn choice_value(answer: &Answer) -> String {
    escape_html(&answer.to_string())
}

fn render_dimension(out: &mut String, section: &Section, item_index: usize, dim: &Dimension) {
    let choices = dim.kind.choices();
    let name = format!("{}__{}__{}", section.id, item_index, dim.name);
    let _ = write!(
        out,
        r#"<div class="dimension" data-section="{}" data-item="{}" data-dimension="{}"><p>{}</p>"#,
        escape_html(&section.id),
        item_index,
        escape_html(&dim.name),
        escape_html(if dim.prompt.is_empty() { &dim.name } else { &dim.prompt }),
    );

    if choices.len() <= MAX_RADIO_CHOICES {
        for choice in &choices {
            let value = choice_value(choice);
            let _ = write!(
                out,
                r#"<label><input type="radio" name="{}" value="{}"> {}</label> "#,
                escape_html(&name),
                value,
                value
            );
        }
    } else {
        let _ = write!(
            out,
            r#"<select name="{}"><option value="" disabled selected>Select...</option>"#,
            escape_html(&name)
        );
        for choice in &choices {
            let value = choice_value(choice);
            let _ = write!(out, r#"<option value="{}">{}</option>"#, value, value);
        }
        out.push_str("</select>");
    }
    out.push_str("</div>");
}

fn render_section(out: &mut String, section: &Section) {
    let title = if section.title.is_empty() { &section.id } else { &section.title };
    let noun = if section.media_width() == 2 { "Pair" } else { "Item" };
    let _ = write!(
        out,
        r#"<section id="section-{}"><h2>{}</h2><p>{}</p>"#,
        escape_html(&section.id),
        escape_html(title),
        escape_html(&section.instructions)
    );

    for (item_index, item) in section.items.iter().enumerate() {
        let _ = write!(
            out,
            r#"<div class="item"><h3>{} {}</h3><div class="players">"#,
            noun,
            item_index + 1
        );
        for (media_index, reference) in item.media.iter().enumerate() {
            let _ = write!(
                out,
                r#"<div><p>Audio {}</p><audio controls preload="none" data-ref="{}"></audio><div class="player-error"></div></div>"#,
                media_index + 1,
                escape_html(reference.as_str())
            );
        }
        out.push_str("</div>");
        for dim in &section.dimensions {
            render_dimension(out, section, item_index, dim);
        }
        out.push_str("</div>");
    }
    out.push_str("</section>");
}

/// Render the full survey page for a catalog
pub fn render_page(catalog: &Catalog) -> String {
    let heading = catalog
        .sections()
        .first()
        .map(|s| if s.title.is_empty() { s.id.as_str() } else { s.title.as_str() })
        .unwrap_or("Listening Test");

    let mut body = String::new();
    for section in catalog.sections() {
        render_section(&mut body, section);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <header><h1>{title}</h1></header>
    <main>
        <p><label>Please enter your email address: <input type="email" id="contact"></label></p>
        {body}
        <div id="status"></div>
        <button id="submit" type="button">Submit All Responses</button>
    </main>
    <script>{js}</script>
</body>
</html>"#,
        title = escape_html(heading),
        css = PAGE_CSS,
        body = body,
        js = PAGE_JS,
    )
}

/// GET /
pub async fn survey_page(State(state): State<AppState>) -> impl IntoResponse {
    Html(render_page(&state.catalog))
}

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(survey_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slt_common::{AnswerKind, Item};

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_builtin_page_has_one_radio_group_per_pair() {
        let html = render_page(&Catalog::builtin());
        assert!(html.contains("<h1>Same Speaker Subjective Test</h1>"));
        assert!(html.contains("Pair 1"));
        assert_eq!(html.matches(r#"type="radio""#).count(), 2);
        assert_eq!(html.matches("<audio ").count(), 2);
        assert!(html.contains(r#"value="Yes""#));
    }

    #[test]
    fn test_page_releases_session_on_leave() {
        let html = render_page(&Catalog::builtin());
        assert!(html.contains("addEventListener('pagehide'"));
        assert!(html.contains("method: 'DELETE', keepalive: true"));
    }

    #[test]
    fn test_wide_rating_uses_select() {
        let catalog = Catalog::new(vec![Section::single(
            "mos",
            "Rate the quality",
            AnswerKind::OrdinalRating { min: 0, max: 10 },
            vec![Item::new(["a.wav"])],
        )])
        .unwrap();
        let html = render_page(&catalog);
        assert!(html.contains(r#"<select name="mos__0__mos">"#));
        assert_eq!(html.matches("<option value=\"").count(), 1 + 11);
        assert!(html.contains("Item 1"));
    }
}
