//! Server-side rendering of the generator page.

use crate::model::{GeneratedText, LengthChoice, SentimentChoice, SentimentStatus};
use crate::session::GenerateError;
use std::fmt::Write;

const SUBTITLE: &str = "An intelligent text generation tool that analyzes sentiment and produces sentiment-aligned content.";
const AWAITING_INPUT: &str = "Enter a prompt to analyze sentiment";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; display: flex; min-height: 100vh; }
aside { width: 17rem; background: #f0f2f6; padding: 1.5rem; }
main { flex: 1; padding: 2rem 3rem; }
.columns { display: flex; gap: 2rem; }
.columns > section { flex: 1; }
textarea { width: 100%; box-sizing: border-box; font: inherit; padding: .5rem; }
.metric .label { font-size: .9rem; color: #555; }
.metric .value { font-size: 2rem; }
.metric .delta { color: #09ab3b; }
.info { background: #e8f0fe; padding: .75rem 1rem; border-radius: .4rem; }
.error { background: #fde8e8; color: #8a1c1c; padding: .75rem 1rem; border-radius: .4rem; }
.success { background: #e6f6ea; color: #17612b; padding: .75rem 1rem; border-radius: .4rem; }
button.primary { background: #ff4b4b; color: #fff; border: 0; padding: .6rem 1.2rem; border-radius: .4rem; cursor: pointer; }
"#;

// Re-scores sentiment while typing; the server caches by prompt text.
const LIVE_SCRIPT: &str = r#"
(function () {
  const input = document.getElementById('prompt');
  const panel = document.getElementById('sentiment-panel');
  let timer = null;
  const esc = (s) => s.replace(/[&<>"]/g, (c) => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;'}[c]));
  input.addEventListener('input', () => {
    clearTimeout(timer);
    timer = setTimeout(async () => {
      try {
        const resp = await fetch('/api/sentiment', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify({ prompt: input.value }),
        });
        const s = await resp.json();
        if (s.status === 'ready') {
          const pct = (s.confidence * 100).toFixed(2);
          panel.innerHTML = '<div class="metric"><div class="label">Detected Sentiment</div>' +
            '<div class="value">' + esc(s.label) + '</div><div class="delta">' + pct + '% confidence</div></div>';
        } else if (s.status === 'failed') {
          panel.innerHTML = '<div class="error">Sentiment analysis failed: ' + esc(s.reason) + '</div>';
        } else {
          panel.innerHTML = '<div class="info">Enter a prompt to analyze sentiment</div>';
        }
      } catch (e) {
        panel.innerHTML = '<div class="error">Sentiment analysis failed: ' + esc(String(e)) + '</div>';
      }
    }, 500);
  });
})();
"#;

/// Everything needed to render one page.
pub(crate) struct PageView<'a> {
    pub title: &'a str,
    pub prompt: &'a str,
    pub sentiment: SentimentChoice,
    pub length: LengthChoice,
    pub sentiment_status: SentimentStatus,
    /// `None` until the user asks for a generation.
    pub generation: Option<Result<GeneratedText, GenerateError>>,
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

impl<'a> PageView<'a> {
    pub fn empty(title: &'a str) -> Self {
        Self {
            title,
            prompt: "",
            sentiment: SentimentChoice::default(),
            length: LengthChoice::default(),
            sentiment_status: SentimentStatus::Pending,
            generation: None,
        }
    }

    pub fn render(&self) -> String {
        let title = escape_html(self.title);
        let mut html = String::with_capacity(8 * 1024);
        let _ = write!(
            html,
            r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<form method="post" action="/" style="display:contents">
"#
        );
        self.render_sidebar(&mut html);
        let _ = write!(
            html,
            r#"<main>
<h1>{title}</h1>
<p>{SUBTITLE}</p>
<div class="columns">
<section>
<h3>Input Prompt</h3>
<label for="prompt">Enter your prompt:</label>
<textarea id="prompt" name="prompt" rows="7" placeholder="Type your prompt here...">{prompt}</textarea>
<p><button type="submit" name="action" value="analyze">Analyze</button></p>
</section>
<section>
<h3>Sentiment Analysis</h3>
<div id="sentiment-panel">{panel}</div>
</section>
</div>
<p><button class="primary" type="submit" name="action" value="generate">Generate Text</button></p>
"#,
            prompt = escape_html(self.prompt),
            panel = sentiment_panel(&self.sentiment_status),
        );
        if let Some(generation) = &self.generation {
            render_generation(&mut html, generation);
        }
        let _ = write!(
            html,
            r#"<details>
<summary>How it works</summary>
<ol>
<li>Sentiment analysis with a pre-trained classifier</li>
<li>Text generation with GPT-2, steered by a sentiment prefix</li>
<li>Output length customization</li>
</ol>
</details>
</main>
</form>
<script>{LIVE_SCRIPT}</script>
</body>
</html>
"#
        );
        html
    }

    fn render_sidebar(&self, html: &mut String) {
        html.push_str("<aside>\n<h2>Configuration</h2>\n<fieldset>\n<legend>Select Sentiment:</legend>\n");
        for choice in SentimentChoice::ALL {
            let checked = if choice == self.sentiment { " checked" } else { "" };
            let _ = writeln!(
                html,
                r#"<label><input type="radio" name="sentiment" value="{v}"{checked}> {v}</label><br>"#,
                v = choice.label()
            );
        }
        html.push_str("</fieldset>\n<p><label for=\"length\">Select Output Length:</label>\n<select id=\"length\" name=\"length\">\n");
        for choice in LengthChoice::ALL {
            let selected = if choice == self.length { " selected" } else { "" };
            let _ = writeln!(
                html,
                r#"<option value="{v}"{selected}>{v} ({n} tokens)</option>"#,
                v = choice.label(),
                n = choice.max_tokens()
            );
        }
        html.push_str(
            "</select></p>\n<hr>\n<div class=\"info\">Tech Stack: Rust, axum, Hugging Face Inference API, GPT-2</div>\n</aside>\n",
        );
    }
}

fn sentiment_panel(status: &SentimentStatus) -> String {
    match status {
        SentimentStatus::Pending => format!(r#"<div class="info">{AWAITING_INPUT}</div>"#),
        SentimentStatus::Failed { reason } => format!(
            r#"<div class="error">Sentiment analysis failed: {}</div>"#,
            escape_html(reason)
        ),
        SentimentStatus::Ready(result) => format!(
            r#"<div class="metric"><div class="label">Detected Sentiment</div><div class="value">{}</div><div class="delta">{}</div></div>"#,
            escape_html(&result.label),
            result.confidence_text()
        ),
    }
}

fn render_generation(html: &mut String, generation: &Result<GeneratedText, GenerateError>) {
    match generation {
        Ok(out) => {
            let _ = write!(
                html,
                r#"<h3>Generated Text</h3>
<label for="output">Output:</label>
<textarea id="output" rows="9" readonly>{}</textarea>
<div class="success">Text generated successfully!</div>
"#,
                escape_html(&out.text)
            );
        }
        Err(GenerateError::EmptyPrompt) => {
            let _ = writeln!(html, r#"<div class="error">{}</div>"#, GenerateError::EmptyPrompt);
        }
        Err(e) => {
            let _ = writeln!(
                html,
                r#"<div class="error">Error: {}</div>"#,
                escape_html(&e.to_string())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SentimentResult;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn controls_preselect_current_choices() {
        let mut view = PageView::empty("t");
        view.sentiment = SentimentChoice::Neutral;
        view.length = LengthChoice::Short;
        let html = view.render();
        assert!(html.contains(r#"value="Neutral" checked"#));
        assert!(!html.contains(r#"value="Positive" checked"#));
        assert!(html.contains(r#"<option value="Short" selected>"#));
    }

    #[test]
    fn default_page_selects_positive_and_medium() {
        let html = PageView::empty("t").render();
        assert!(html.contains(r#"value="Positive" checked"#));
        assert!(html.contains(r#"<option value="Medium" selected>"#));
        assert!(html.contains(&format!(
            r#"<div id="sentiment-panel"><div class="info">{AWAITING_INPUT}</div>"#
        )));
    }

    #[test]
    fn failed_sentiment_is_shown_explicitly() {
        let mut view = PageView::empty("t");
        view.prompt = "hello";
        view.sentiment_status = SentimentStatus::Failed {
            reason: "endpoint returned 503".into(),
        };
        let html = view.render();
        assert!(html.contains("Sentiment analysis failed: endpoint returned 503"));
        assert!(!html.contains(r#"<div id="sentiment-panel"><div class="info">"#));
    }

    #[test]
    fn ready_sentiment_shows_metric() {
        let mut view = PageView::empty("t");
        view.sentiment_status = SentimentStatus::Ready(SentimentResult {
            label: "NEGATIVE".into(),
            confidence: 0.5,
        });
        let html = view.render();
        assert!(html.contains("Detected Sentiment"));
        assert!(html.contains("NEGATIVE"));
        assert!(html.contains("50.00% confidence"));
    }

    #[test]
    fn generation_error_is_prefixed() {
        let mut view = PageView::empty("t");
        view.generation = Some(Err(GenerateError::Inference("model is loading".into())));
        assert!(view.render().contains("Error: model is loading"));
    }
}
