//! Line-oriented front end
//!
//! Each line is a question unless it starts with `!`. Answered exchanges
//! become context for the next question.

use std::collections::VecDeque;

use anyhow::Context;
use arbiter_config::Mode;
use arbiter_routing::{AnswerRequest, OrchestratorError, Outcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::report;

/// Context lines carried into the next question
const CONTEXT_LINES: usize = 6;

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Blank,
    Question(String),
    Stats,
    Mode(Option<Mode>),
    Clear,
    Help,
    Quit,
}

fn parse(line: &str) -> Input {
    let line = line.trim();

    let Some(command) = line.strip_prefix('!') else {
        return if line.is_empty() {
            Input::Blank
        } else {
            Input::Question(line.to_owned())
        };
    };

    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("stats") => Input::Stats,
        Some("mode") => Input::Mode(parts.next().and_then(|mode| mode.parse().ok())),
        Some("clear") => Input::Clear,
        Some("quit" | "exit") => Input::Quit,
        _ => Input::Help,
    }
}

/// Read questions until end of input or shutdown
pub async fn run(engine: &Engine, mut mode: Mode, shutdown: &CancellationToken) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut context: VecDeque<String> = VecDeque::with_capacity(CONTEXT_LINES);

    loop {
        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else { break };

        match parse(&line) {
            Input::Blank => {}
            Input::Quit => break,
            Input::Help => println!("commands: !stats, !mode <local_only|remote_only|fallback>, !clear, !quit"),
            Input::Stats => println!("{}", engine.stats()),
            Input::Clear => context.clear(),
            Input::Mode(Some(next)) => {
                mode = next;
                println!("mode: {mode}");
            }
            Input::Mode(None) => println!("unknown mode, expected local_only, remote_only or fallback"),
            Input::Question(question) => {
                let request = AnswerRequest::new(question.clone(), mode).with_context(context.iter().cloned().collect());

                match engine.ask(request, shutdown).await {
                    Ok(outcome) => {
                        println!("{}", report::outcome(&outcome));

                        if let Outcome::Answer { text, .. } = outcome {
                            remember(&mut context, format!("user: {question}"));
                            remember(&mut context, format!("assistant: {text}"));
                        }
                    }
                    Err(OrchestratorError::Cancelled) => break,
                    Err(e) => println!("(error: {e})"),
                }
            }
        }
    }

    Ok(())
}

fn remember(context: &mut VecDeque<String>, line: String) {
    if context.len() >= CONTEXT_LINES {
        context.pop_front();
    }
    context.push_back(line);
}
