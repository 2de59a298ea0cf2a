//! Captured runtime input and output.
//!
//! The executor never touches the process streams directly: `write` and
//! `writeln` append to an output buffer, and `read`/`readln` consume a
//! scripted input string. The driver wires these to the real stdin/stdout;
//! tests assert on the buffer.

/// Scripted input cursor plus captured output.
#[derive(Debug, Default)]
pub struct RuntimeConsole {
    input: Vec<char>,
    position: usize,
    output: String,
}

impl RuntimeConsole {
    pub fn new(input: &str) -> Self {
        RuntimeConsole {
            input: input.chars().collect(),
            position: 0,
            output: String::new(),
        }
    }

    /// Everything the interpreted program has written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub(crate) fn newline(&mut self) {
        self.output.push('\n');
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.position += 1;
        }
    }

    /// Next whitespace-delimited integer.
    pub(crate) fn read_integer(&mut self) -> Option<i32> {
        self.skip_whitespace();
        let mut text = String::new();
        if matches!(self.peek(), Some('+') | Some('-')) {
            text.push(self.advance()?);
        }
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            text.push(self.advance()?);
        }
        text.parse().ok()
    }

    /// Next whitespace-delimited real number (integer forms accepted).
    pub(crate) fn read_real(&mut self) -> Option<f32> {
        self.skip_whitespace();
        let mut text = String::new();
        if matches!(self.peek(), Some('+') | Some('-')) {
            text.push(self.advance()?);
        }
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            text.push(self.advance()?);
        }
        if self.peek() == Some('.') {
            text.push(self.advance()?);
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                text.push(self.advance()?);
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            text.push(self.advance()?);
            if matches!(self.peek(), Some('+') | Some('-')) {
                text.push(self.advance()?);
            }
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                text.push(self.advance()?);
            }
        }
        text.parse().ok()
    }

    /// Next character; an end of line reads as a space.
    pub(crate) fn read_char(&mut self) -> Option<char> {
        let ch = self.advance()?;
        Some(if ch == '\n' { ' ' } else { ch })
    }

    /// Discard the rest of the current input line.
    pub(crate) fn skip_line(&mut self) {
        while let Some(ch) = self.advance() {
            if ch == '\n' {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_capture() {
        let mut console = RuntimeConsole::new("");
        console.print("total = ");
        console.print("42");
        console.newline();
        assert_eq!(console.output(), "total = 42\n");
    }

    #[test]
    fn test_read_integers() {
        let mut console = RuntimeConsole::new("  12 -7\n30");
        assert_eq!(console.read_integer(), Some(12));
        assert_eq!(console.read_integer(), Some(-7));
        assert_eq!(console.read_integer(), Some(30));
        assert_eq!(console.read_integer(), None);
    }

    #[test]
    fn test_read_real() {
        let mut console = RuntimeConsole::new("3.5 1e2");
        assert_eq!(console.read_real(), Some(3.5));
        assert_eq!(console.read_real(), Some(100.0));
    }

    #[test]
    fn test_read_char_folds_newline() {
        let mut console = RuntimeConsole::new("a\nb");
        assert_eq!(console.read_char(), Some('a'));
        assert_eq!(console.read_char(), Some(' '));
        assert_eq!(console.read_char(), Some('b'));
        assert_eq!(console.read_char(), None);
    }

    #[test]
    fn test_skip_line() {
        let mut console = RuntimeConsole::new("rest of line\n42");
        console.skip_line();
        assert_eq!(console.read_integer(), Some(42));
    }
}
