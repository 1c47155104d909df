//! Output stream parser feeding the shared parser state.
//!
//! Each redirected stream gets its own [`StreamParser`]. Parsers only write
//! to [`SharedParserState`]; they never call back into the controller, which
//! keeps reader threads from contending with controller operations.

mod grammar;
mod lines;

use tracing::{debug, info, warn};

pub use grammar::{LineEvent, StreamKind, classify_line};
pub use lines::LineAssembler;

use crate::adapter::LogSource;
use crate::state::SharedParserState;

const PARSER_TARGET: &str = "torvisor::parser";

/// Turns one stream's chunks into updates of the shared state.
#[derive(Debug)]
pub struct StreamParser {
    stream: StreamKind,
    state: SharedParserState,
    assembler: LineAssembler,
}

impl StreamParser {
    /// Creates a parser for `stream` writing into `state`.
    #[must_use]
    pub fn new(stream: StreamKind, state: SharedParserState) -> Self {
        Self {
            stream,
            state,
            assembler: LineAssembler::new(),
        }
    }

    /// Consumes one chunk, applying every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) {
        for line in self.assembler.push(chunk) {
            self.apply_line(&line);
        }
    }

    /// Applies the unterminated remainder once the stream reaches EOF.
    pub fn finish(&mut self) {
        if let Some(line) = self.assembler.finish() {
            self.apply_line(&line);
        }
    }

    /// Reads `source` until EOF, then flushes the remainder.
    pub fn consume(mut self, source: LogSource) {
        for chunk in source {
            self.feed(&chunk);
        }
        self.finish();
        debug!(
            target: PARSER_TARGET,
            stream = self.stream.as_str(),
            "log stream closed"
        );
    }

    fn apply_line(&self, line: &str) {
        debug!(
            target: PARSER_TARGET,
            stream = self.stream.as_str(),
            line,
            "daemon output"
        );
        match classify_line(line, self.stream) {
            Some(LineEvent::SocksPort(port)) => {
                self.state.set_socks_port(port);
                info!(target: PARSER_TARGET, port, "SOCKS listener discovered");
            }
            Some(LineEvent::Progress(progress)) => {
                if self.state.record_progress(progress) {
                    info!(target: PARSER_TARGET, progress, "bootstrap progress");
                }
            }
            Some(LineEvent::Fatal(message)) => {
                if self.state.record_error(message.as_str()) {
                    warn!(
                        target: PARSER_TARGET,
                        stream = self.stream.as_str(),
                        message = %message,
                        "daemon reported a fatal condition"
                    );
                }
            }
            None => {}
        }
    }
}
