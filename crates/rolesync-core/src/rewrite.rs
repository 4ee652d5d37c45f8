//! Pasteable SQL.
//!
//! Inlines `$N` parameters of a statement as SQL literals so the audit log
//! shows statements an operator can paste into `psql`. The rewritten text is
//! never executed.

use crate::value::SqlValue;

/// Errors rewriting a statement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    /// A placeholder refers to a missing argument.
    #[error("Placeholder ${index} has no argument ({count} given)")]
    MissingArgument { index: usize, count: usize },

    /// A literal, quoted identifier or comment is not closed.
    #[error("Unterminated {what} starting at byte {start}")]
    Unterminated { what: &'static str, start: usize },
}

struct Rewriter<'a> {
    input: &'a str,
    pos: usize,
    args: &'a [SqlValue],
    out: String,
}

impl<'a> Rewriter<'a> {
    fn new(input: &'a str, args: &'a [SqlValue]) -> Self {
        Self {
            input,
            pos: 0,
            args,
            out: String::with_capacity(input.len()),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        self.out.push(c);
        Some(c)
    }

    fn run(mut self) -> Result<String, RewriteError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                '\'' => {
                    let escapes = is_escape_prefix(&self.input[..start]);
                    self.advance();
                    self.copy_quoted('\'', escapes, "string literal", start)?;
                }
                '"' => {
                    self.advance();
                    self.copy_quoted('"', false, "quoted identifier", start)?;
                }
                '-' if self.peek_next() == Some('-') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => self.copy_block_comment(start)?,
                '$' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.inline_placeholder()?;
                }
                '$' => self.copy_dollar_quoted(start)?,
                _ => {
                    self.advance();
                }
            }
        }
        Ok(self.out.trim().to_string())
    }

    fn copy_quoted(
        &mut self,
        quote: char,
        escapes: bool,
        what: &'static str,
        start: usize,
    ) -> Result<(), RewriteError> {
        loop {
            match self.advance() {
                None => return Err(RewriteError::Unterminated { what, start }),
                Some('\\') if escapes => {
                    self.advance();
                }
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.advance();
                    } else {
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn copy_block_comment(&mut self, start: usize) -> Result<(), RewriteError> {
        self.advance(); // /
        self.advance(); // *
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    return Err(RewriteError::Unterminated {
                        what: "comment",
                        start,
                    })
                }
            }
        }
    }

    /// Copies `$tag$ ... $tag$`, or a lone `$` when no tag follows.
    fn copy_dollar_quoted(&mut self, start: usize) -> Result<(), RewriteError> {
        let rest = &self.input[start + 1..];
        let tag_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if !rest[tag_len..].starts_with('$') {
            self.advance();
            return Ok(());
        }

        let delimiter = &self.input[start..start + tag_len + 2];
        let body_start = start + delimiter.len();
        let Some(body_len) = self.input[body_start..].find(delimiter) else {
            return Err(RewriteError::Unterminated {
                what: "dollar-quoted string",
                start,
            });
        };
        let end = body_start + body_len + delimiter.len();
        self.out.push_str(&self.input[start..end]);
        self.pos = end;
        Ok(())
    }

    fn inline_placeholder(&mut self) -> Result<(), RewriteError> {
        self.pos += 1; // $
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let index: usize = self.input[digits_start..self.pos].parse().unwrap_or(0);
        let value = index
            .checked_sub(1)
            .and_then(|i| self.args.get(i))
            .ok_or(RewriteError::MissingArgument {
                index,
                count: self.args.len(),
            })?;
        self.out.push_str(&value.to_sql_inline());
        Ok(())
    }
}

/// True when `before` ends with a standalone `E`, opening an escape string.
/// `date'...'` or `name'...'` end with an identifier instead.
fn is_escape_prefix(before: &str) -> bool {
    let mut chars = before.chars().rev();
    matches!(chars.next(), Some('E' | 'e'))
        && !chars
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Inlines `$N` placeholders of `sql` with `args`, leaving literals,
/// quoted identifiers and comments untouched.
///
/// # Errors
///
/// Returns a [`RewriteError`] if a placeholder has no argument or the
/// statement has an unterminated literal, identifier or comment.
pub fn rewrite_query(sql: &str, args: &[SqlValue]) -> Result<String, RewriteError> {
    Rewriter::new(sql, args).run()
}
