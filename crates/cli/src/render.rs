//! Terminal rendering of agent events.
//!
//! Answer text goes to `out` so it can be piped; tool activity and notices
//! go to `err` next to the logs.

use std::io::{self, Write};

use ferrule_agent::{AgentEvent, StopReason};

/// Longest argument preview shown for a tool call.
const ARGS_PREVIEW: usize = 160;

pub struct Renderer<O: Write, E: Write> {
    out: O,
    err: E,
    /// Whether `out` is mid-line after streamed text
    mid_line: bool,
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            mid_line: false,
        }
    }

    pub fn render(&mut self, event: &AgentEvent) -> io::Result<()> {
        match event {
            AgentEvent::AgentStart { .. } => {}
            AgentEvent::TextDelta { content } => {
                self.out.write_all(content.as_bytes())?;
                self.out.flush()?;
                self.mid_line = !content.ends_with('\n');
            }
            AgentEvent::TextComplete { .. } => self.end_line()?,
            AgentEvent::ToolCallStart {
                name, arguments, ..
            } => {
                self.end_line()?;
                writeln!(self.err, "  ⚙ {name} {}", preview(&arguments.to_string()))?;
            }
            AgentEvent::ToolCallComplete {
                name,
                success,
                output,
                error,
                truncated,
                ..
            } => {
                if *success {
                    let lines = output.lines().count();
                    let suffix = if *truncated { ", truncated" } else { "" };
                    writeln!(self.err, "  ✓ {name} ({lines} lines{suffix})")?;
                } else {
                    writeln!(
                        self.err,
                        "  ✗ {name}: {}",
                        error.as_deref().unwrap_or("failed")
                    )?;
                }
            }
            AgentEvent::LoopDetected { notice } => {
                self.end_line()?;
                writeln!(self.err, "  ⚠ {notice}")?;
            }
            AgentEvent::Error { message } => {
                self.end_line()?;
                writeln!(self.err, "  error: {message}")?;
            }
            AgentEvent::AgentEnd {
                stop_reason, turns, ..
            } => {
                self.end_line()?;
                match stop_reason {
                    StopReason::MaxTurnsReached => writeln!(
                        self.err,
                        "  ⚠ Stopped after {turns} turns (max_turns reached)"
                    )?,
                    StopReason::Cancelled => writeln!(self.err, "  ⚠ Cancelled")?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn end_line(&mut self) -> io::Result<()> {
        if self.mid_line {
            self.out.write_all(b"\n")?;
            self.out.flush()?;
            self.mid_line = false;
        }
        Ok(())
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= ARGS_PREVIEW {
        return text.to_string();
    }
    let cut: String = text.chars().take(ARGS_PREVIEW).collect();
    format!("{cut}…")
}
