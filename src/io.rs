use std::collections::VecDeque;
use std::io::BufRead;

/// Supplies one input line per `ΔΙΑΒΑΣΕ` target. `None` means the channel
/// is exhausted.
pub trait InputSource {
    fn next_line(&mut self) -> Option<String>;
}

/// Pre-buffered input lines consumed in order.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: VecDeque<String>,
}

impl LineBuffer {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LineBuffer {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_text(text: &str) -> Self {
        LineBuffer::new(text.lines())
    }
}

impl InputSource for LineBuffer {
    fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Reads input lines lazily from stdin.
#[derive(Debug, Default)]
pub struct StdinInput;

impl InputSource for StdinInput {
    fn next_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}
