//! Command-line tokenization.
//!
//! [`LineScanner`] splits a command's argument string into
//! whitespace-delimited tokens with typed decoding. [`MultilineScanner`]
//! joins config lines ending in `\` into one logical line.

use std::str::FromStr;

/// Whitespace tokenizer over a borrowed command line.
pub struct LineScanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> LineScanner<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Next whitespace-delimited token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let rest = &self.input[self.pos..];
        let start = rest.find(|c: char| !c.is_whitespace())?;
        let rest = &rest[start..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        self.pos += start + end;
        Some(&rest[..end])
    }

    /// Peeks at the next token without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&'a str> {
        let rest = self.input[self.pos..].trim_start();
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        Some(&rest[..end])
    }

    /// Decodes the next token as `T`, consuming it only on success; a
    /// token that fails to decode stays available for the next caller.
    pub fn get<T: FromStr>(&mut self) -> Option<T> {
        let save = self.pos;
        let token = self.next_token()?;
        match token.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.pos = save;
                None
            }
        }
    }

    /// Consumes and returns everything after the current position,
    /// stripped of leading whitespace.
    pub fn rest(&mut self) -> &'a str {
        let rest = self.input[self.pos..].trim_start();
        self.pos = self.input.len();
        rest
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input[self.pos..].trim_start().is_empty()
    }
}

/// Joins physical lines ending in `\` into logical lines.
#[derive(Default)]
pub struct MultilineScanner {
    buffer: String,
}

impl MultilineScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one physical line; `emit` receives each completed logical line.
    pub fn process_line(&mut self, line: &str, emit: &mut dyn FnMut(&str)) {
        let trimmed = line.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            self.buffer.push_str(stripped);
            self.buffer.push(' ');
            return;
        }
        self.buffer.push_str(line);
        emit(&self.buffer);
        self.buffer.clear();
    }

    /// Emits a trailing unfinished continuation, if any.
    pub fn flush(&mut self, emit: &mut dyn FnMut(&str)) {
        if !self.buffer.is_empty() {
            emit(&self.buffer);
            self.buffer.clear();
        }
    }
}

/// Strips a `#` comment and surrounding whitespace from a config line.
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => line[..i].trim(),
        None => line.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_and_decodes() {
        let mut ln = LineScanner::new("  rainbow  d 12 k 120.5 ");
        assert_eq!(ln.next_token(), Some("rainbow"));
        assert_eq!(ln.next_token(), Some("d"));
        assert_eq!(ln.get::<u32>(), Some(12));
        assert_eq!(ln.peek(), Some("k"));
        assert_eq!(ln.next_token(), Some("k"));
        assert_eq!(ln.get::<f32>(), Some(120.5));
        assert!(ln.is_empty());
        assert_eq!(ln.next_token(), None);
    }

    #[test]
    fn continuation_lines_join() {
        let mut mls = MultilineScanner::new();
        let mut out = Vec::new();
        let mut emit = |s: &str| out.push(s.to_string());
        mls.process_line("display rainbow \\", &mut emit);
        mls.process_line("on all", &mut emit);
        mls.flush(&mut emit);
        assert_eq!(out, vec!["display rainbow on all".to_string()]);
    }
}
