//! Consumes one agent event stream.
//!
//! Each NDJSON line is decoded into a [`StreamEvent`]; text goes through the
//! signal parser, usage goes through the token budget. Reading stops at EOF,
//! when the budget trips, or when a terminal signal appears.

use std::collections::HashSet;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use super::InvocationOutcome;
use crate::budget::{TokenBudget, TokenUsage};
use crate::errors::InvocationError;
use crate::phases::Phase;
use crate::signals::{SignalParser, SignalSet, extract_working_on};
use crate::stream::{ContentBlock, StreamEvent, describe_tool_use, snippet};
use crate::ui::Reporter;

const SNIPPET_LEN: usize = 80;

pub struct StreamDriver<'a> {
    phase: Phase,
    parser: SignalParser,
    budget: TokenBudget,
    cancel: CancellationToken,
    reporter: &'a dyn Reporter,
    text: String,
    result_text: Option<String>,
    signals: SignalSet,
    message_usage_seen: bool,
    terminated_early: bool,
    working_on: HashSet<String>,
}

impl<'a> StreamDriver<'a> {
    pub fn new(phase: Phase, max_tokens: u64, reporter: &'a dyn Reporter) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        Self {
            phase,
            parser: SignalParser::new(true),
            budget: TokenBudget::new(max_tokens).with_cancel(move || token.cancel()),
            cancel,
            reporter,
            text: String::new(),
            result_text: None,
            signals: SignalSet::new(),
            message_usage_seen: false,
            terminated_early: false,
            working_on: HashSet::new(),
        }
    }

    /// Token that fires when reading should stop. Cancelling it from the
    /// outside ends [`drive`](Self::drive) at the next line boundary.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Read events until EOF or cancellation.
    ///
    /// Malformed lines, including invalid UTF-8, are skipped. Only an I/O
    /// failure on the reader is an error.
    pub async fn drive<R>(mut self, mut reader: R) -> Result<InvocationOutcome, InvocationError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => {
                    read.map_err(InvocationError::StreamRead)?
                }
            };
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            self.handle_line(&line);

            if self.cancel.is_cancelled() {
                break;
            }
        }

        Ok(self.finish())
    }

    fn handle_line(&mut self, line: &str) {
        let Some(event) = StreamEvent::parse_line(line) else {
            return;
        };

        if let StreamEvent::Assistant { message, .. } = &event {
            for block in &message.content {
                if let ContentBlock::ToolUse { name, input, .. } = block {
                    self.reporter.tool_use(name, &describe_tool_use(name, input));
                }
            }
        }

        // Usage first: a trip in this event outranks the event's own signals.
        match &event {
            StreamEvent::Assistant { message, .. } => {
                if let Some(usage) = message.usage {
                    self.message_usage_seen = true;
                    self.record_usage(usage.into());
                }
            }
            // The result total repeats the per-message figures.
            StreamEvent::Result {
                usage: Some(usage), ..
            } if !self.message_usage_seen => {
                self.record_usage((*usage).into());
            }
            _ => {}
        }

        let is_result = matches!(event, StreamEvent::Result { .. });
        for segment in event.text_segments() {
            self.handle_text(segment, is_result);
        }
    }

    fn handle_text(&mut self, segment: &str, is_result: bool) {
        if is_result {
            self.result_text = Some(segment.to_string());
        } else {
            self.text.push_str(segment);
            if !segment.ends_with('\n') {
                self.text.push('\n');
            }
            let short = snippet(segment, SNIPPET_LEN);
            if !short.is_empty() {
                self.reporter.text(&short);
            }
        }

        if let Some(id) = extract_working_on(segment)
            && self.working_on.insert(id.clone())
        {
            self.reporter.working_on(&id);
        }

        let found = self.parser.parse(segment);
        if found.is_empty() {
            return;
        }
        let terminal = found.has_terminal();
        self.signals.extend(found);
        if terminal {
            tracing::debug!(phase = %self.phase, "terminal signal seen, stopping stream");
            self.stop();
        }
    }

    fn record_usage(&mut self, usage: TokenUsage) {
        if let Some(bailout) = self.budget.record(&usage) {
            self.signals.push(bailout);
            self.terminated_early = true;
        }
    }

    fn stop(&mut self) {
        self.terminated_early = true;
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
        }
    }

    fn finish(self) -> InvocationOutcome {
        if !self.budget.has_samples() {
            tracing::warn!(phase = %self.phase, "agent reported no token usage");
        }
        InvocationOutcome {
            output: self.result_text.unwrap_or(self.text),
            signals: self.signals,
            usage: self.budget.usage(),
            terminated_early: self.terminated_early,
            exit_code: None,
        }
    }
}
