use axum::response::{Html, IntoResponse};

/// 首页处理器
pub async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// 首页：只负责渲染会话状态并调用会话接口
const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Bean Roast Classifier</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5efe6; color: #3b2a1a; margin: 0; }
        .container { max-width: 640px; margin: 40px auto; background: white; border-radius: 16px; padding: 32px; box-shadow: 0 12px 40px rgba(0,0,0,0.08); text-align: center; }
        video, img { width: 100%; border-radius: 12px; background: #222; }
        button { margin: 8px 4px; padding: 10px 18px; border: none; border-radius: 8px; background: #6f4e37; color: white; cursor: pointer; }
        button:disabled { opacity: 0.5; cursor: default; }
        .banner { background: #fde2e1; color: #8a1c1c; padding: 10px; border-radius: 8px; margin-bottom: 16px; display: none; }
        .result h2 { margin-bottom: 4px; }
    </style>
</head>
<body>
<div class="container">
    <h1>Bean Roast Classifier</h1>
    <div id="banner" class="banner"></div>
    <video id="video" autoplay playsinline muted hidden></video>
    <img id="preview" hidden alt="captured beans">
    <div>
        <button id="open">Open camera</button>
        <button id="shoot" disabled>Capture</button>
        <button id="close" disabled>Close camera</button>
        <label><input id="file" type="file" accept="image/*"></label>
    </div>
    <div>
        <button id="predict" disabled>Predict</button>
        <button id="reset">Retake</button>
    </div>
    <div id="result" class="result"></div>
</div>
<script>
const $ = (id) => document.getElementById(id);
let stream = null;
let pump = null;

async function call(path, options = {}) {
    const res = await fetch(path, Object.assign({ method: 'POST' }, options));
    const body = await res.json();
    render(body.success ? body.data : null, body.success ? null : body.error);
    return body;
}

function render(state, failure) {
    const banner = $('banner');
    const error = failure || (state && state.error);
    banner.style.display = error ? 'block' : 'none';
    banner.textContent = error ? error.message : '';
    if (!state) return;
    $('shoot').disabled = state.busy || state.capture_status !== 'camera_active';
    $('close').disabled = state.capture_status !== 'camera_active';
    $('predict').disabled = state.busy || state.phase !== 'captured' || state.model_status !== 'ready';
    const result = $('result');
    if (state.prediction) {
        const p = state.prediction;
        result.innerHTML = `<h2>${p.label.name}</h2><p>${p.label.description}</p>`;
    } else {
        result.innerHTML = '';
    }
}

function stopStream() {
    if (pump) { clearInterval(pump); pump = null; }
    if (stream) { stream.getTracks().forEach((t) => t.stop()); stream = null; }
    $('video').hidden = true;
}

function pushFrame() {
    const video = $('video');
    if (!video.videoWidth) return;
    const canvas = document.createElement('canvas');
    canvas.width = video.videoWidth;
    canvas.height = video.videoHeight;
    canvas.getContext('2d').drawImage(video, 0, 0);
    canvas.toBlob((blob) => blob && fetch('/session/frame', { method: 'POST', body: blob }), 'image/jpeg', 0.92);
}

$('open').onclick = async () => {
    try {
        stream = await navigator.mediaDevices.getUserMedia({ video: { facingMode: { ideal: 'environment' } } });
    } catch (e) {
        const kind = e.name === 'NotAllowedError' ? 'permission_denied' : 'no_device';
        await fetch('/session/camera/error', { method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify({ kind }) });
        await call('/session/capture/start');
        return;
    }
    await fetch('/session/camera/error', { method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify({ kind: 'available' }) });
    $('video').srcObject = stream;
    $('video').hidden = false;
    $('preview').hidden = true;
    pump = setInterval(pushFrame, 300);
    const body = await call('/session/capture/start');
    if (!body.success) stopStream();
};

$('shoot').onclick = async () => {
    pushFrame();
    const video = $('video');
    const canvas = document.createElement('canvas');
    canvas.width = video.videoWidth;
    canvas.height = video.videoHeight;
    canvas.getContext('2d').drawImage(video, 0, 0);
    $('preview').src = canvas.toDataURL('image/jpeg');
    await new Promise((r) => setTimeout(r, 350));
    stopStream();
    $('preview').hidden = false;
    await call('/session/capture');
};

$('close').onclick = async () => { stopStream(); await call('/session/camera/close'); };

$('file').onchange = async (event) => {
    const file = event.target.files[0];
    if (!file) return;
    const url = URL.createObjectURL(file);
    $('preview').onload = () => URL.revokeObjectURL(url);
    $('preview').src = url;
    $('preview').hidden = false;
    const form = new FormData();
    form.append('file', file);
    await call('/session/upload', { body: form });
    event.target.value = '';
};

$('predict').onclick = () => call('/session/predict');
$('reset').onclick = async () => { stopStream(); $('preview').hidden = true; await call('/session/reset'); };

window.addEventListener('pagehide', () => { stopStream(); navigator.sendBeacon('/session/reset'); });
fetch('/session').then((r) => r.json()).then((b) => {
    render(b.data, b.success ? null : b.error);
    if (b.success && b.data.model_status === 'failed') call('/session/model/load');
});
</script>
</body>
</html>
"#;
