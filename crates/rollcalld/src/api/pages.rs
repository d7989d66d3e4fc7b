//! Server-rendered pages: the attendance kiosk and the registration form.

use super::routes::format_timestamp;
use crate::error::AppError;
use crate::service::AttendanceService;
use crate::store::AttendanceEntry;
use axum::{extract::State, response::Html};
use std::fmt::Write;

const RECENT_LIMIT: usize = 10;

const STYLE: &str = "body{font-family:sans-serif;max-width:760px;margin:2em auto}\
video,img{width:100%;max-width:640px;border-radius:6px}\
table{border-collapse:collapse;width:100%}td,th{border-bottom:1px solid #ddd;padding:.4em;text-align:left}\
.success{color:green}.error{color:red}.info{color:#004085}";

/// Capture a frame from the `<video>` element and POST it as a JPEG data URL.
const CAPTURE_SCRIPT: &str = r#"
async function startCamera(video, facingMode = 'user') {
  if (video.srcObject) video.srcObject.getTracks().forEach(t => t.stop());
  const stream = await navigator.mediaDevices.getUserMedia({
    video: { width: { ideal: 640 }, height: { ideal: 480 }, facingMode }, audio: false });
  video.srcObject = stream;
  await video.play();
}
function snapshot(video) {
  const canvas = document.createElement('canvas');
  canvas.width = video.videoWidth; canvas.height = video.videoHeight;
  canvas.getContext('2d').drawImage(video, 0, 0);
  return canvas.toDataURL('image/jpeg', 0.9);
}
function showStatus(el, message, kind) { el.textContent = message; el.className = kind; }
async function post(url, body) {
  const res = await fetch(url, { method: 'POST',
    headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body) });
  return res.json();
}
"#;

/// Minimal HTML escaping for text interpolated into pages.
pub fn escape(text: &str) -> String {
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

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body>{body}<script>{CAPTURE_SCRIPT}</script></body></html>"
    )
}

pub fn render_index(records: &[AttendanceEntry]) -> String {
    let mut rows = String::new();
    for entry in records {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape(&entry.student_name),
            format_timestamp(entry.record.timestamp)
        );
    }
    if records.is_empty() {
        rows.push_str("<tr><td colspan=\"2\">No attendance recorded yet</td></tr>");
    }

    let body = format!(
        r#"<h1>Attendance</h1>
<p><a href="/register">Register a new student</a></p>
<video id="video" autoplay playsinline></video>
<p><button id="mark">Mark attendance</button> <span id="status"></span></p>
<h2>Recent attendance</h2>
<table><thead><tr><th>Student</th><th>Time (UTC)</th></tr></thead><tbody>{rows}</tbody></table>
<script>
document.addEventListener('DOMContentLoaded', async () => {{
  const video = document.getElementById('video');
  const status = document.getElementById('status');
  try {{ await startCamera(video); }} catch (e) {{ showStatus(status, e.message, 'error'); }}
  document.getElementById('mark').addEventListener('click', async () => {{
    const data = await post('/process_image', {{ image_data: snapshot(video) }});
    showStatus(status, data.message, data.status);
    if (data.status === 'success' && data.student_name !== 'Unknown') setTimeout(() => location.reload(), 1500);
  }});
}});
</script>"#
    );
    layout("Attendance", &body)
}

/// Registration flow: capture a frame, review it, then submit or retake.
pub fn render_register() -> String {
    let body = r#"<h1>Register a student</h1>
<p><a href="/">Back to attendance</a></p>
<video id="video" autoplay playsinline></video>
<div id="preview-container" hidden><img id="preview" alt="Captured photo"></div>
<p><input id="name" placeholder="Full name"></p>
<p>
  <button id="capture">Capture</button>
  <button id="retake" hidden>Retake</button>
  <button id="register" disabled>Register</button>
  <button id="switch-camera">Switch camera</button>
</p>
<p id="status"></p>
<script>
document.addEventListener('DOMContentLoaded', async () => {
  const video = document.getElementById('video');
  const status = document.getElementById('status');
  const preview = document.getElementById('preview');
  const previewContainer = document.getElementById('preview-container');
  const capture = document.getElementById('capture');
  const retake = document.getElementById('retake');
  const register = document.getElementById('register');
  let facing = 'user';
  let captured = null;

  const showCamera = () => {
    captured = null;
    previewContainer.hidden = true; video.hidden = false;
    retake.hidden = true; capture.hidden = false; register.disabled = true;
  };

  try { await startCamera(video, facing); } catch (e) { showStatus(status, e.message, 'error'); }

  document.getElementById('switch-camera').addEventListener('click', async () => {
    const next = facing === 'user' ? 'environment' : 'user';
    try { await startCamera(video, next); facing = next; showCamera(); }
    catch (e) { showStatus(status, 'Failed to switch camera: ' + e.message, 'error'); }
  });
  capture.addEventListener('click', () => {
    captured = snapshot(video);
    preview.src = captured;
    previewContainer.hidden = false; video.hidden = true;
    retake.hidden = false; capture.hidden = true; register.disabled = false;
  });
  retake.addEventListener('click', showCamera);
  register.addEventListener('click', async () => {
    const name = document.getElementById('name').value.trim();
    if (!name) { showStatus(status, 'Name is required', 'error'); return; }
    if (!captured) { showStatus(status, 'Capture a photo first', 'error'); return; }
    register.disabled = true;
    const data = await post('/register_face', { name, image_data: captured });
    showStatus(status, data.message, data.status);
    if (data.status === 'success') { document.getElementById('name').value = ''; showCamera(); }
    else register.disabled = false;
  });
});
</script>"#;
    layout("Register", body)
}

/// Attendance kiosk with the most recent records.
pub async fn index(State(service): State<AttendanceService>) -> Result<Html<String>, AppError> {
    let records = service.recent_attendance(RECENT_LIMIT).await?;
    Ok(Html(render_index(&records)))
}

/// Registration page with camera capture.
pub async fn register() -> Html<String> {
    Html(render_register())
}
