//! Server-rendered dashboard page.
//!
//! Everything the page shows comes from a [`DashboardView`] built per
//! request; the server keeps no page state between requests. The progress
//! indicator and the disabled start button are switched on in the browser
//! when the form is submitted, and the POST response renders the finished
//! run.

use crewflow::errors::Remediation;
use crewflow::probe::ProbeReport;
use std::fmt::Write;

/// Topics offered as one-click shortcuts.
pub const EXAMPLE_TOPICS: [&str; 8] = [
    "Artificial Intelligence",
    "Quantum Computing",
    "Climate Change",
    "Blockchain Technology",
    "Space Exploration",
    "Renewable Energy",
    "Cybersecurity",
    "Biotechnology",
];

/// One stage's last reported state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    /// Stage name.
    pub stage: String,
    /// `started`, `completed`, `failed` or `skipped`.
    pub state: String,
}

/// Result of a run, as shown on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run finished and the report was written.
    Completed {
        /// File name served under `/reports/`.
        report_file: String,
        /// The research report body.
        report: String,
        /// The blog post.
        blog_post: String,
        /// Stage progress in event order.
        progress: Vec<StageProgress>,
    },
    /// The run failed.
    Failed {
        /// Error text.
        message: String,
        /// Suggested fix, if any.
        remediation: Option<Remediation>,
        /// Stage progress up to the failure.
        progress: Vec<StageProgress>,
    },
}

/// Request-scoped page state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    /// Value of the topic field.
    pub topic: String,
    /// Backend status shown in the sidebar.
    pub status: Option<ProbeReport>,
    /// Validation message for the topic field.
    pub notice: Option<String>,
    /// Result of the run submitted with this request.
    pub outcome: Option<RunOutcome>,
}

impl DashboardView {
    /// A page with the topic field prefilled.
    #[must_use]
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }
}

/// Renders the full HTML page.
#[must_use]
pub fn render(view: &DashboardView) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str(HEAD);

    html.push_str("<aside><h2>System status</h2>");
    match &view.status {
        Some(report) if report.ready() => {
            let _ = write!(html, "<p class=\"ok\">Backend ready: {}</p>", escape(&report.message));
        }
        Some(report) => {
            let _ = write!(
                html,
                "<p class=\"err\">Backend {}: {}</p>",
                escape(&report.status.to_string()),
                escape(&report.message)
            );
        }
        None => html.push_str("<p><a href=\"/api/status\">Check backend status</a></p>"),
    }
    html.push_str("<h2>Example topics</h2><ul class=\"examples\">");
    for topic in EXAMPLE_TOPICS {
        let _ = write!(
            html,
            "<li><a href=\"/?topic={}\">{}</a></li>",
            urlencoding::encode(topic),
            escape(topic)
        );
    }
    html.push_str("</ul></aside>");

    html.push_str("<main><h1>Crewflow research dashboard</h1>");
    let _ = write!(
        html,
        "<form method=\"post\" action=\"/research\" onsubmit=\"startRun(this)\">\
         <label for=\"topic\">Research topic</label>\
         <input id=\"topic\" name=\"topic\" type=\"text\" value=\"{}\" \
         placeholder=\"e.g. Quantum Computing\">\
         <button type=\"submit\">Start Research</button></form>",
        escape(&view.topic)
    );
    if let Some(notice) = &view.notice {
        let _ = write!(html, "<p class=\"err\">{}</p>", escape(notice));
    }

    html.push_str(
        "<div id=\"progress\" hidden><progress></progress>\
         <p>Research and writing in progress. This may take 1-2 minutes.</p></div>",
    );

    match &view.outcome {
        Some(RunOutcome::Completed {
            report_file,
            report,
            blog_post,
            progress,
        }) => {
            render_progress(&mut html, progress);
            let _ = write!(
                html,
                "<section><h2>Research report</h2>\
                 <p>Saved as <code>{file}</code> \
                 <a class=\"download\" href=\"/reports/{href}\" download>Download report</a></p>\
                 <pre class=\"markdown\">{report}</pre></section>\
                 <section><h2>Blog post</h2><div class=\"post\">{post}</div></section>",
                file = escape(report_file),
                href = urlencoding::encode(report_file),
                report = escape(report),
                post = escape(blog_post),
            );
        }
        Some(RunOutcome::Failed {
            message,
            remediation,
            progress,
        }) => {
            render_progress(&mut html, progress);
            let _ = write!(html, "<section class=\"err\"><h2>Run failed</h2><p>{}</p>", escape(message));
            if let Some(remediation) = remediation {
                let _ = write!(html, "<h3>{}</h3><ol>", escape(&remediation.title));
                for step in &remediation.steps {
                    let _ = write!(html, "<li>{}</li>", escape(step));
                }
                html.push_str("</ol>");
            }
            html.push_str("</section>");
        }
        None => {}
    }

    html.push_str("</main>");
    html.push_str(FOOT);
    html
}

fn render_progress(html: &mut String, progress: &[StageProgress]) {
    if progress.is_empty() {
        return;
    }
    html.push_str("<ol class=\"stages\">");
    for entry in progress {
        let _ = write!(
            html,
            "<li class=\"{state}\">{stage}: {state}</li>",
            stage = escape(&entry.stage),
            state = escape(&entry.state)
        );
    }
    html.push_str("</ol>");
}

/// Escapes text for HTML element content and quoted attributes.
fn escape(text: &str) -> String {
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

const HEAD: &str = "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">\
<title>Crewflow research</title><style>\
body{font-family:sans-serif;display:flex;gap:2rem;margin:2rem}\
aside{min-width:14rem}main{flex:1;max-width:60rem}\
.ok{color:#17803d}.err{color:#b42318}\
pre.markdown{white-space:pre-wrap;background:#f6f8fa;padding:1rem}\
.stages li.completed{color:#17803d}.stages li.failed{color:#b42318}\
</style></head><body>";

const FOOT: &str = "<script>\
function startRun(form){form.querySelector('button').disabled=true;\
document.getElementById('progress').hidden=false;}\
</script></body></html>";

#[cfg(test)]
mod tests {
    use super::*;
    use crewflow::probe::ProbeStatus;

    fn progress(entries: &[(&str, &str)]) -> Vec<StageProgress> {
        entries
            .iter()
            .map(|(stage, state)| StageProgress {
                stage: (*stage).to_string(),
                state: (*state).to_string(),
            })
            .collect()
    }

    #[test]
    fn test_idle_page() {
        let html = render(&DashboardView::default());

        assert!(html.contains("<button type=\"submit\">Start Research</button>"));
        assert!(html.contains("<div id=\"progress\" hidden>"));
        assert!(html.contains("<a href=\"/?topic=Quantum%20Computing\">Quantum Computing</a>"));
        assert!(!html.contains("Research report"));
    }

    #[test]
    fn test_prefilled_topic_is_escaped() {
        let html = render(&DashboardView::with_topic("AI \"<b>\" & ML"));
        assert!(html.contains("value=\"AI &quot;&lt;b&gt;&quot; &amp; ML\""));
    }

    #[test]
    fn test_submit_switches_on_progress_in_browser() {
        let html = render(&DashboardView::with_topic("Cybersecurity"));

        assert!(html.contains("onsubmit=\"startRun(this)\""));
        assert!(html.contains("function startRun(form){form.querySelector('button').disabled=true;"));
        assert!(html.contains("document.getElementById('progress').hidden=false;"));
    }

    #[test]
    fn test_completed_run() {
        let view = DashboardView {
            outcome: Some(RunOutcome::Completed {
                report_file: "climate_change_research_report.md".into(),
                report: "# Climate <Change>".into(),
                blog_post: "Act now.".into(),
                progress: progress(&[("research", "completed"), ("writing", "completed")]),
            }),
            ..DashboardView::with_topic("Climate Change")
        };
        let html = render(&view);

        assert!(html.contains("href=\"/reports/climate_change_research_report.md\" download"));
        assert!(html.contains("<pre class=\"markdown\"># Climate &lt;Change&gt;</pre>"));
        assert!(html.contains("<div class=\"post\">Act now.</div>"));
        assert!(html.contains("<li class=\"completed\">writing: completed</li>"));
    }

    #[test]
    fn test_failed_run_lists_remediation() {
        let view = DashboardView {
            outcome: Some(RunOutcome::Failed {
                message: "Backend unavailable".into(),
                remediation: Some(Remediation::new(
                    "Quick fix guide",
                    ["Start service: ollama serve".to_string()],
                )),
                progress: Vec::new(),
            }),
            ..DashboardView::default()
        };
        let html = render(&view);

        assert!(html.contains("<h2>Run failed</h2><p>Backend unavailable</p>"));
        assert!(html.contains("<h3>Quick fix guide</h3><ol><li>Start service: ollama serve</li></ol>"));
        assert!(!html.contains("class=\"stages\""));
    }

    #[test]
    fn test_status_panel() {
        let ready = DashboardView {
            status: Some(ProbeReport::new(ProbeStatus::Ready, "mistral:latest is installed")),
            ..DashboardView::default()
        };
        assert!(render(&ready).contains("<p class=\"ok\">Backend ready: mistral:latest is installed</p>"));

        let missing = DashboardView {
            status: Some(ProbeReport::new(ProbeStatus::ModelMissing, "pull it")),
            ..DashboardView::default()
        };
        assert!(render(&missing).contains("<p class=\"err\">Backend model_missing: pull it</p>"));
    }
}
