//! Terminal flows: `research` and `check`.
//!
//! Both write to a caller-supplied writer so they can be exercised against
//! in-memory buffers.

use crewflow::errors::{CrewflowError, Remediation};
use crewflow::events::LoggingEventSink;
use crewflow::llm::{LlmClient, LlmRequest};
use crewflow::probe::BackendProbe;
use crewflow::research::{PipelineResult, ResearchPipeline, Topic};
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};

/// Topics suggested at the prompt.
pub const EXAMPLE_TOPICS: [&str; 4] = [
    "Machine Learning",
    "Climate Change",
    "Blockchain Technology",
    "Space Exploration",
];

const SMOKE_PROMPT: &str = "Say 'Hello World' and nothing else.";
const SMOKE_TEMPERATURE: f32 = 0.3;

/// How a terminal flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The flow finished successfully.
    Completed,
    /// The run or check failed.
    Failed,
    /// No topic was entered.
    NoTopic,
    /// The user pressed Ctrl-C at the prompt or during the run.
    Interrupted,
}

impl Outcome {
    /// Numeric exit status: 130 matches a shell's Ctrl-C convention.
    pub const fn code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Failed | Self::NoTopic => 1,
            Self::Interrupted => 130,
        }
    }

    /// Process exit status for this outcome.
    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Takes the topic from `arg`, or prompts for it on `input`.
///
/// The line is read on the blocking pool so the caller can race the prompt
/// against an interrupt. Returns `None` for a missing or blank topic.
pub async fn resolve_topic<R, W>(arg: Option<String>, input: R, out: &mut W) -> io::Result<Option<Topic>>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let raw = if let Some(arg) = arg {
        arg
    } else {
        writeln!(out, "What topic would you like to research?")?;
        let examples: Vec<String> = EXAMPLE_TOPICS.iter().map(|t| format!("'{t}'")).collect();
        writeln!(out, "Examples: {}", examples.join(", "))?;
        write!(out, "Enter your research topic: ")?;
        out.flush()?;

        read_line(input).await?
    };

    Ok(Topic::new(&raw).ok())
}

async fn read_line<R: BufRead + Send + 'static>(mut input: R) -> io::Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut line = String::new();
        input.read_line(&mut line).map(|_| line)
    })
    .await
    .map_err(io::Error::other)?
}

/// Runs the research flow end to end.
///
/// `interrupt` resolving at the prompt or before generation finishes
/// abandons the run without writing a report. Once the report write has
/// started it is allowed to finish.
pub async fn research<R, W, F>(
    pipeline: &ResearchPipeline,
    arg: Option<String>,
    input: R,
    out: &mut W,
    interrupt: F,
) -> io::Result<Outcome>
where
    R: BufRead + Send + 'static,
    W: Write,
    F: Future<Output = ()>,
{
    writeln!(out, "Crewflow research - local models, no API costs")?;
    writeln!(out, "{}", "=".repeat(46))?;
    writeln!(out, "Using: {}", pipeline.model())?;
    writeln!(out)?;
    tokio::pin!(interrupt);

    let resolved = tokio::select! {
        biased;
        () = &mut interrupt => None,
        topic = resolve_topic(arg, input, out) => Some(topic?),
    };
    let Some(resolved) = resolved else {
        return interrupted(out);
    };
    let Some(topic) = resolved else {
        writeln!(out, "No topic provided. Exiting...")?;
        return Ok(Outcome::NoTopic);
    };

    writeln!(out, "Research Topic: {topic}")?;
    writeln!(out)?;
    writeln!(out, "Starting local AI workflow... this may take 1-2 minutes")?;
    out.flush()?;

    let sink = Arc::new(LoggingEventSink::default());
    let draft = tokio::select! {
        biased;
        () = &mut interrupt => return interrupted(out),
        draft = pipeline.draft(&topic, sink) => draft,
    };

    let result = match draft {
        Ok(draft) => {
            let fired = tokio::select! {
                biased;
                () = &mut interrupt => true,
                () = std::future::ready(()) => false,
            };
            if fired {
                return interrupted(out);
            }
            pipeline.publish(draft).await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(result) => {
            print_result(out, &result)?;
            Ok(Outcome::Completed)
        }
        Err(err) => {
            error!(topic = %topic, kind = ?err.kind(), error = %err, "Research run failed");
            print_failure(out, &err, &pipeline.model().name)?;
            Ok(Outcome::Failed)
        }
    }
}

fn interrupted<W: Write>(out: &mut W) -> io::Result<Outcome> {
    writeln!(out)?;
    writeln!(out, "Run interrupted by user")?;
    Ok(Outcome::Interrupted)
}

fn print_result<W: Write>(out: &mut W, result: &PipelineResult) -> io::Result<()> {
    let rule = "=".repeat(50);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Research Completed")?;
    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "The research covered: {} overview, applications, and current trends",
        result.topic
    )?;
    writeln!(out, "Full research report saved to: {}", result.report_path.display())?;
    writeln!(out)?;
    writeln!(out, "FINAL BLOG POST:")?;
    writeln!(out, "{}", "-".repeat(30))?;
    writeln!(out, "{}", result.final_output)?;
    writeln!(out, "{}", "-".repeat(30))?;
    debug!(run_id = %result.run_id, "Printed research result");
    Ok(())
}

fn print_failure<W: Write>(out: &mut W, err: &CrewflowError, model: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Error: {err}")?;
    if let Some(remediation) = err.remediation(model) {
        print_remediation(out, &remediation)?;
    }
    Ok(())
}

fn print_remediation<W: Write>(out: &mut W, remediation: &Remediation) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}:", remediation.title)?;
    for (i, step) in remediation.steps.iter().enumerate() {
        writeln!(out, "{}. {step}", i + 1)?;
    }
    Ok(())
}

/// Checks the backend; with `smoke` also sends a one-line prompt.
pub async fn check<W: Write>(
    probe: &dyn BackendProbe,
    client: &dyn LlmClient,
    model: &str,
    smoke: bool,
    out: &mut W,
) -> io::Result<Outcome> {
    writeln!(out, "Checking local backend...")?;
    let report = probe.probe().await;
    writeln!(out, "Probe: {} ({})", report.status, report.message)?;

    if !report.ready() {
        let err = CrewflowError::BackendUnavailable {
            message: report.message,
        };
        if let Some(remediation) = err.remediation(model) {
            print_remediation(out, &remediation)?;
        }
        return Ok(Outcome::Failed);
    }

    match client.list_models().await {
        Ok(models) => writeln!(out, "Installed models: {}", models.join(", "))?,
        Err(err) => writeln!(out, "Could not list models over HTTP: {err}")?,
    }

    if !smoke {
        return Ok(Outcome::Completed);
    }

    writeln!(out, "Sending test prompt to {model}...")?;
    let request = LlmRequest::new(model, SMOKE_PROMPT).with_temperature(Some(SMOKE_TEMPERATURE));
    match client.generate(&request).await {
        Ok(response) => {
            writeln!(out, "Response: {}", response.content.trim())?;
            writeln!(out, "Latency: {:.0} ms", response.latency_ms)?;
            Ok(Outcome::Completed)
        }
        Err(err) => {
            writeln!(out, "Error: {err}")?;
            let err = CrewflowError::generation("smoke", err.to_string(), err.cause());
            if let Some(remediation) = err.remediation(model) {
                print_remediation(out, &remediation)?;
            }
            Ok(Outcome::Failed)
        }
    }
}
