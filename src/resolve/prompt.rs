//! Line-oriented interaction with the user

use crate::error::BridgeResult;
use crate::ui;

use async_trait::async_trait;
use std::io::{self, BufRead, BufReader, Write};
use tokio::sync::mpsc;

/// Question/answer channel, passed explicitly to whoever needs input
#[async_trait]
pub trait Prompter: Send {
    /// Ask one question; `None` on end of input
    async fn ask(&mut self, question: &str) -> BridgeResult<Option<String>>;

    /// Show a line to the user
    fn say(&mut self, line: &str);
}

type LineReceiver = mpsc::UnboundedReceiver<io::Result<String>>;

/// Reads answers from stdin, one line each.
///
/// Lines come from a dedicated OS thread that is started on the first
/// question. A read still pending at shutdown never holds up the runtime.
pub struct TerminalPrompter {
    lines: Option<LineReceiver>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self { lines: None }
    }

    #[cfg(test)]
    fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            lines: Some(spawn_line_reader(reader)),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward lines from `reader` until end of input or the first read error
fn spawn_line_reader<R: BufRead + Send + 'static>(reader: R) -> LineReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask(&mut self, question: &str) -> BridgeResult<Option<String>> {
        print!("{} ", question);
        io::stdout().flush()?;

        let lines = self
            .lines
            .get_or_insert_with(|| spawn_line_reader(BufReader::new(io::stdin())));
        match lines.recv().await {
            Some(line) => Ok(Some(line?)),
            None => Ok(None),
        }
    }

    fn say(&mut self, line: &str) {
        ui::progress(line);
    }
}

#[cfg(test)]
pub use scripted::ScriptedPrompter;
