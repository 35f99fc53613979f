//! JSON pointer to source position mapping
//!
//! A small JSON scanner records where every value sits in the original
//! text. Object members span from the key to the end of the value.
//! Scanning stops quietly at the first malformed token; whatever was mapped
//! up to that point stays usable.

use std::collections::HashMap;

use crate::validate::{pointer_push, Diagnostic, Span};

#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    spans: HashMap<String, Span>,
    lines: Vec<String>,
}

impl SourceMap {
    pub fn from_json(text: &str) -> Self {
        let mut scanner = Scanner {
            text,
            pos: 0,
            line: 1,
            column: 1,
            spans: HashMap::new(),
        };
        if scanner.value(String::new(), None).is_none() {
            tracing::debug!("source text is not fully valid JSON; positions are partial");
        }
        Self {
            spans: scanner.spans,
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Span of `pointer`, or of its nearest mapped ancestor
    pub fn span(&self, pointer: &str) -> Option<Span> {
        let mut current = pointer;
        loop {
            if let Some(span) = self.spans.get(current) {
                return Some(*span);
            }
            let cut = current.rfind('/')?;
            current = &current[..cut];
        }
    }

    /// Text of a 1-based line
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    /// Fill in positions for every diagnostic raised against `source`
    pub fn annotate(&self, diagnostics: &mut [Diagnostic], source: &str) {
        for diagnostic in diagnostics.iter_mut().filter(|d| d.source == source) {
            if let Some(span) = self.span(&diagnostic.path) {
                diagnostic.set_span(span);
            }
        }
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    spans: HashMap<String, Span>,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        (self.bump()? == expected).then_some(())
    }

    fn value(&mut self, pointer: String, member_start: Option<(usize, usize)>) -> Option<()> {
        self.skip_whitespace();
        let (line_start, character_start) = member_start.unwrap_or((self.line, self.column));

        match self.peek()? {
            '{' => self.object(&pointer)?,
            '[' => self.array(&pointer)?,
            '"' => {
                self.string()?;
            }
            _ => self.scalar()?,
        }

        self.spans.insert(
            pointer,
            Span {
                line_start,
                line_end: self.line,
                character_start,
                character_end: self.column.saturating_sub(1).max(1),
            },
        );
        Some(())
    }

    fn object(&mut self, pointer: &str) -> Option<()> {
        self.expect('{')?;
        self.skip_whitespace();
        if self.peek()? == '}' {
            self.bump();
            return Some(());
        }
        loop {
            self.skip_whitespace();
            let key_start = (self.line, self.column);
            let raw = self.string()?;
            let key: String = serde_json::from_str(raw).ok()?;
            self.skip_whitespace();
            self.expect(':')?;
            self.value(pointer_push(pointer, &key), Some(key_start))?;
            self.skip_whitespace();
            match self.bump()? {
                ',' => continue,
                '}' => return Some(()),
                _ => return None,
            }
        }
    }

    fn array(&mut self, pointer: &str) -> Option<()> {
        self.expect('[')?;
        self.skip_whitespace();
        if self.peek()? == ']' {
            self.bump();
            return Some(());
        }
        let mut index = 0;
        loop {
            self.value(pointer_push(pointer, index), None)?;
            index += 1;
            self.skip_whitespace();
            match self.bump()? {
                ',' => continue,
                ']' => return Some(()),
                _ => return None,
            }
        }
    }

    /// Consume a string literal and return it with its quotes
    fn string(&mut self) -> Option<&str> {
        let start = self.pos;
        self.expect('"')?;
        loop {
            match self.bump()? {
                '\\' => {
                    self.bump()?;
                }
                '"' => break,
                _ => {}
            }
        }
        Some(&self.text[start..self.pos])
    }

    fn scalar(&mut self) -> Option<()> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | ']' | '}') || c.is_whitespace() {
                break;
            }
            self.bump();
        }
        (self.pos > start).then_some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = r#"{
  "nodes": [
    {
      "unique-id": "api",
      "name": "API \"edge\""
    }
  ],
  "a/b": 1
}"#;

    #[test]
    fn test_member_spans_start_at_key() {
        let map = SourceMap::from_json(TEXT);
        assert_eq!(
            map.span("/nodes/0/unique-id"),
            Some(Span { line_start: 4, line_end: 4, character_start: 7, character_end: 24 })
        );
        assert_eq!(
            map.span("/nodes/0"),
            Some(Span { line_start: 3, line_end: 6, character_start: 5, character_end: 5 })
        );
        assert_eq!(map.span("/a~1b").map(|s| s.line_start), Some(8));
    }

    #[test]
    fn test_missing_pointer_falls_back_to_ancestor() {
        let map = SourceMap::from_json(TEXT);
        assert_eq!(map.span("/nodes/0/interfaces/3"), map.span("/nodes/0"));
        assert_eq!(map.span("/missing").map(|s| s.line_start), Some(1));
    }

    #[test]
    fn test_malformed_text_keeps_partial_map() {
        let map = SourceMap::from_json("{\n  \"a\": 1,\n  \"b\": ");
        assert_eq!(map.span("/a").map(|s| s.line_start), Some(2));
        assert_eq!(map.span("/b"), None);
        assert_eq!(map.line(3), Some("  \"b\": "));
        assert_eq!(map.line(0), None);
    }

    #[test]
    fn test_annotate_only_matching_source() {
        let map = SourceMap::from_json(TEXT);
        let mut diags = vec![
            Diagnostic::error("x", "m", "/nodes/0/name"),
            Diagnostic::error("x", "m", "/nodes/0/name").with_source("pattern"),
        ];
        map.annotate(&mut diags, "architecture");
        assert_eq!(diags[0].line_start, Some(5));
        assert_eq!(diags[1].line_start, None);
    }
}
