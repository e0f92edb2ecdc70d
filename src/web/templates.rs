// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTML templates for the web UI

use minijinja::Environment;

const BASE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title }} - vidsage</title>
    <style>
        :root {
            --bg-primary: #1a1a2e;
            --bg-secondary: #16213e;
            --bg-card: #0f3460;
            --text-primary: #e8e8e8;
            --text-secondary: #a0a0a0;
            --accent: #e94560;
            --accent-hover: #ff6b6b;
            --success: #00d9a5;
            --warning: #f5a623;
            --border: #2a2a4a;
        }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }
        .container { max-width: 960px; margin: 0 auto; padding: 20px; }
        nav {
            background: var(--bg-secondary);
            padding: 15px 20px;
            display: flex;
            align-items: center;
            gap: 30px;
            border-bottom: 1px solid var(--border);
        }
        nav .logo {
            font-size: 1.5em;
            font-weight: bold;
            color: var(--accent);
            text-decoration: none;
        }
        nav .caption { color: var(--text-secondary); }
        .card {
            background: var(--bg-card);
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
        }
        .card h2 {
            margin-bottom: 15px;
            color: var(--accent);
        }
        label { display: block; margin: 12px 0 6px; color: var(--text-secondary); }
        input[type=text], input[type=url], textarea {
            width: 100%;
            padding: 10px;
            border-radius: 6px;
            border: 1px solid var(--border);
            background: var(--bg-secondary);
            color: var(--text-primary);
            font: inherit;
        }
        textarea { min-height: 100px; }
        button {
            margin-top: 15px;
            padding: 10px 20px;
            border: none;
            border-radius: 6px;
            background: var(--accent);
            color: white;
            font-size: 1em;
            cursor: pointer;
        }
        button:hover { background: var(--accent-hover); }
        button:disabled { opacity: 0.6; cursor: wait; }
        .hint { color: var(--text-secondary); font-size: 0.85em; }
        .banner {
            border-radius: 8px;
            padding: 15px 20px;
            margin-bottom: 20px;
            border-left: 4px solid var(--accent);
            background: var(--bg-secondary);
        }
        .banner.warning { border-left-color: var(--warning); }
        .banner .detail { color: var(--text-secondary); margin-top: 6px; font-size: 0.9em; }
        .answer h1, .answer h2, .answer h3 { margin: 15px 0 8px; }
        .answer p, .answer ul, .answer ol { margin-bottom: 10px; }
        .answer ul, .answer ol { padding-left: 25px; }
        .answer code { background: var(--bg-secondary); padding: 1px 4px; border-radius: 4px; }
        .answer pre { background: var(--bg-secondary); padding: 10px; border-radius: 6px; overflow-x: auto; }
        .meta { color: var(--text-secondary); font-size: 0.85em; margin-top: 10px; }
    </style>
</head>
<body>
    <nav>
        <a href="/" class="logo">vidsage</a>
        <span class="caption">Video AI summarizer, powered by {{ model }}</span>
    </nav>
    <main class="container">
        {% block content %}{% endblock %}
    </main>
    <script>
        document.querySelectorAll("form.analyze").forEach(function (form) {
            form.addEventListener("submit", function () {
                document.querySelectorAll("form.analyze button").forEach(function (b) {
                    b.disabled = true;
                });
                form.querySelector("button").textContent = "Processing video and gathering insights...";
            });
        });
    </script>
</body>
</html>"#;

const INDEX_TEMPLATE: &str = r#"{% extends "base.html" %}
{% block content %}
    {% if notice %}
    <div class="banner{% if notice.warning %} warning{% endif %}">
        <strong>{{ notice.headline }}</strong>
        {% if notice.detail != notice.headline %}<div class="detail">{{ notice.detail }}</div>{% endif %}
        {% if notice.action %}<div class="detail"><strong>Action required:</strong> {{ notice.action }}</div>{% endif %}
    </div>
    {% endif %}

    {% if answer_html %}
    <div class="card">
        <h2>Analysis Result</h2>
        <div class="answer">{{ answer_html|safe }}</div>
        <div class="meta">{{ video_name }} &middot; {{ model }} &middot; {{ elapsed_ms }} ms</div>
    </div>
    {% endif %}

    <div class="card">
        <h2>Upload a Video File</h2>
        <form class="analyze" method="post" action="/analyze" enctype="multipart/form-data">
            <label for="video">Video file ({{ accept_list }}, up to {{ max_mb }} MB)</label>
            <input id="video" type="file" name="video" accept="{{ accept }}" required>
            <label for="question">What insights are you seeking from the video?</label>
            <textarea id="question" name="question" required
                placeholder="Ask anything about the video content. The AI agent will analyze and gather additional information.">{{ question }}</textarea>
            <button type="submit">Analyze Video</button>
        </form>
    </div>

    {% if url_enabled %}
    <div class="card">
        <h2>Submit a Video URL</h2>
        <form class="analyze" method="post" action="/analyze" enctype="multipart/form-data">
            <label for="url">Video URL (e.g., YouTube)</label>
            <input id="url" type="url" name="url" required placeholder="https://">
            <label for="url-question">What insights are you seeking from the video?</label>
            <textarea id="url-question" name="question" required
                placeholder="e.g., Summarize the main points of this video.">{{ question }}</textarea>
            <button type="submit">Analyze Video</button>
        </form>
        <p class="hint">The video is downloaded to this server, analyzed, then deleted.</p>
    </div>
    {% endif %}
{% endblock %}"#;

/// Build the template environment used by all pages
pub fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("base.html", BASE_TEMPLATE)?;
    env.add_template("index.html", INDEX_TEMPLATE)?;
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_templates_compile() {
        assert!(environment().is_ok());
    }

    #[test]
    fn test_values_are_escaped_but_answer_is_not() {
        let env = environment().unwrap();
        let html = env
            .get_template("index.html")
            .unwrap()
            .render(context! {
                title => "Analyze",
                model => "gemini-2.5-flash",
                question => "<b>why</b>",
                answer_html => "<p>An <em>answer</em></p>",
                accept => ".mp4",
                accept_list => "mp4",
                max_mb => 200,
                url_enabled => false,
            })
            .unwrap();

        assert!(html.contains("&lt;b&gt;why&lt;&#x2f;b&gt;") || html.contains("&lt;b&gt;why&lt;/b&gt;"));
        assert!(html.contains("<p>An <em>answer</em></p>"));
        assert!(!html.contains("Submit a Video URL"));
    }
}
