// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 上传页面 (单文件, 无外部资源)

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>⚽ Football AI Analysis Platform</title>
<style>
  :root { --green: #00A651; --dark: #1A1D23; --card: #252A34; --muted: #B0BEC5; --error: #D32F2F; }
  body { margin: 0; font-family: system-ui, sans-serif; background: var(--dark); color: #fff; }
  header { background: linear-gradient(135deg, #006B3D, var(--green)); padding: 1.5rem 2rem; }
  header h1 { margin: 0; font-size: 2rem; }
  header p { margin: .3rem 0 0; color: rgba(255,255,255,.85); }
  main { display: grid; grid-template-columns: 320px 1fr; gap: 1.5rem; padding: 1.5rem 2rem; }
  .card { background: var(--card); border-radius: 12px; padding: 1.2rem; border: 1px solid rgba(255,255,255,.1); }
  label { display: block; margin: .6rem 0; }
  button { width: 100%; padding: .8rem; border: 0; border-radius: 8px; background: var(--green); color: #fff; font-size: 1rem; cursor: pointer; }
  button:disabled { opacity: .5; cursor: default; }
  progress { width: 100%; height: 1.2rem; }
  .muted { color: var(--muted); }
  .error { color: var(--error); }
  .output { margin-top: 1rem; }
  .output video { width: 100%; border-radius: 8px; background: #000; }
  a { color: #42A5F5; }
</style>
</head>
<body>
<header>
  <h1>⚽ Football AI Analysis Platform</h1>
  <p>Player tracking, team classification, radar view and Voronoi control zones</p>
</header>
<main>
  <section class="card">
    <form id="form">
      <label>Match video (mp4, avi, mov)
        <input type="file" name="video" accept=".mp4,.avi,.mov" required>
      </label>
      <label>Detection confidence: <span id="conf-value">0.30</span>
        <input type="range" id="confidence" min="0.1" max="0.9" step="0.05" value="0.30">
      </label>
      <label><input type="checkbox" id="tracking" checked> Tracking video</label>
      <label><input type="checkbox" id="radar" checked> Radar video</label>
      <label><input type="checkbox" id="voronoi" checked> Voronoi video</label>
      <button id="start" type="submit">🚀 Start analysis</button>
    </form>
  </section>
  <section class="card">
    <div id="idle" class="muted">Upload a video and start the analysis.</div>
    <div id="running" hidden>
      <div id="stage" class="muted">Queued</div>
      <progress id="bar" max="100" value="0"></progress>
    </div>
    <div id="errors" class="error"></div>
    <div id="outputs"></div>
  </section>
</main>
<script>
const $ = (id) => document.getElementById(id);
$("confidence").addEventListener("input", (e) => {
  $("conf-value").textContent = Number(e.target.value).toFixed(2);
});

$("form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const file = e.target.video.files[0];
  if (!file) return;
  const data = new FormData();
  data.append("video", file);
  data.append("confidence", $("confidence").value);
  for (const name of ["tracking", "radar", "voronoi"]) {
    data.append(name, $(name).checked ? "true" : "false");
  }
  $("start").disabled = true;
  $("idle").hidden = true;
  $("running").hidden = false;
  $("errors").textContent = "";
  $("outputs").innerHTML = "";
  $("stage").textContent = "Uploading...";
  try {
    const resp = await fetch("/api/jobs", { method: "POST", body: data });
    const body = await resp.json();
    if (!resp.ok) throw new Error(body.error || resp.statusText);
    poll(body.id);
  } catch (err) {
    $("errors").textContent = "❌ " + err.message;
    $("start").disabled = false;
  }
});

async function poll(id) {
  const resp = await fetch("/api/jobs/" + id);
  const job = await resp.json();
  $("bar").value = job.percent;
  $("stage").textContent = job.stage + " (" + job.percent + "%)";
  if (job.state === "queued" || job.state === "running") {
    setTimeout(() => poll(id), 1000);
    return;
  }
  $("start").disabled = false;
  const errors = [];
  if (job.error) errors.push("❌ " + job.error.category + ": " + job.error.message);
  for (const f of job.failures) errors.push("⚠️ " + f.kind + " (" + f.category + "): " + f.message);
  $("errors").innerHTML = errors.map((m) => "<div></div>").join("");
  [...$("errors").children].forEach((el, i) => (el.textContent = errors[i]));
  for (const out of job.outputs) {
    const url = "/outputs/" + out.path.split("/").map(encodeURIComponent).join("/");
    const div = document.createElement("div");
    div.className = "output";
    const title = document.createElement("h3");
    title.textContent = out.kind + " (" + out.summary.frames + " frames)";
    const video = document.createElement("video");
    video.controls = true;
    video.src = url;
    const link = document.createElement("a");
    link.href = url + "?download=1";
    link.textContent = "⬇️ Download " + out.file_name;
    div.append(title, video, link);
    $("outputs").append(div);
  }
}
</script>
</body>
</html>
"#;
