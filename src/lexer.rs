use std::fmt;

use serde_json::{Number, Value};

use crate::error::LexError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Static(String),
    StartExpression { escaped: bool }, // {{ or {{{
    EndExpression { escaped: bool },   // }} or }}}
    Word(String),
    Literal(Value),
    Comment(String),
    PartialRef(String), // {{> name}}
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Static(_) => f.write_str("static text"),
            Token::StartExpression { escaped: true } => f.write_str("`{{`"),
            Token::StartExpression { escaped: false } => f.write_str("`{{{`"),
            Token::EndExpression { escaped: true } => f.write_str("`}}`"),
            Token::EndExpression { escaped: false } => f.write_str("`}}}`"),
            Token::Word(w) => write!(f, "`{w}`"),
            Token::Literal(v) => write!(f, "literal {v}"),
            Token::Comment(_) => f.write_str("comment"),
            Token::PartialRef(name) => write!(f, "partial `{name}`"),
        }
    }
}

/// Location in the template source. `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub pos: Position,
}

#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    line: usize,
    column: usize,
    in_expression: bool,
    opened_at: Position,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            line: 1,
            column: 1,
            in_expression: false,
            opened_at: Position::default(),
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn position(&self) -> Position {
        Position {
            offset: self.cursor,
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self, n: usize) {
        for c in self.input[self.cursor..self.cursor + n].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.cursor += n;
    }

    /// Pulls the next token. `Ok(None)` marks the end of the input.
    pub fn next_token(&mut self) -> Result<Option<Lexeme>, LexError> {
        if !self.in_expression {
            return Ok(self.next_outside());
        }

        let rest = self.remaining();
        let rest_trimmed = rest.trim_start();
        self.advance(rest.len() - rest_trimmed.len());

        let pos = self.position();
        let rest = self.remaining();
        if rest.is_empty() {
            return Err(LexError::Unterminated(self.opened_at));
        }

        if let Some(after) = rest.strip_prefix("}}") {
            // One character of peek decides between `}}` and `}}}`.
            let escaped = !after.starts_with('}');
            self.advance(if escaped { 2 } else { 3 });
            self.in_expression = false;
            return Ok(Some(Lexeme {
                token: Token::EndExpression { escaped },
                pos,
            }));
        }
        if rest.starts_with('}') {
            return Err(LexError::UnexpectedClose(pos));
        }

        let token = match self.scan_word() {
            Some(token) => token,
            None => match self.scan_literal()? {
                Some(token) => token,
                None => match self.scan_comment()? {
                    Some(token) => token,
                    None => match self.scan_partial() {
                        Some(token) => token,
                        None => {
                            let found = rest.chars().next().unwrap_or_default();
                            return Err(LexError::Unparseable { pos, found });
                        }
                    },
                },
            },
        };
        Ok(Some(Lexeme { token, pos }))
    }

    fn next_outside(&mut self) -> Option<Lexeme> {
        let rest = self.remaining();
        if rest.is_empty() {
            return None;
        }
        let pos = self.position();

        match rest.find("{{") {
            Some(0) => {
                let escaped = !rest[2..].starts_with('{');
                self.advance(if escaped { 2 } else { 3 });
                self.in_expression = true;
                self.opened_at = pos;
                Some(Lexeme {
                    token: Token::StartExpression { escaped },
                    pos,
                })
            }
            Some(idx) => {
                self.advance(idx);
                Some(Lexeme {
                    token: Token::Static(rest[..idx].to_string()),
                    pos,
                })
            }
            None => {
                self.advance(rest.len());
                Some(Lexeme {
                    token: Token::Static(rest.to_string()),
                    pos,
                })
            }
        }
    }

    /// Identifiers, dotted and slashed paths, `@data` names, `this`, `..`,
    /// and the block prefixes `#`, `^` and `/`.
    fn scan_word(&mut self) -> Option<Token> {
        let rest = self.remaining();
        let first = rest.chars().next()?;
        let prefixed = matches!(first, '#' | '^' | '/');
        if !(prefixed || is_word_start(first)) {
            return None;
        }

        let skip = if prefixed { 1 } else { 0 };
        let len = skip
            + rest[skip..]
                .find(|c: char| !is_word_char(c))
                .unwrap_or(rest.len() - skip);
        let word = &rest[..len];
        self.advance(len);

        Some(match word {
            "true" => Token::Literal(Value::Bool(true)),
            "false" => Token::Literal(Value::Bool(false)),
            "null" => Token::Literal(Value::Null),
            _ => Token::Word(word.to_string()),
        })
    }

    fn scan_literal(&mut self) -> Result<Option<Token>, LexError> {
        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        if first == '"' || first == '\'' {
            let pos = self.position();
            let mut s = String::new();
            let mut chars = rest.char_indices().skip(1);
            while let Some((idx, c)) = chars.next() {
                if c == first {
                    self.advance(idx + 1);
                    return Ok(Some(Token::Literal(Value::String(s))));
                }
                if c == '\\' {
                    match chars.next() {
                        Some((_, 'n')) => s.push('\n'),
                        Some((_, 't')) => s.push('\t'),
                        Some((_, esc)) => s.push(esc),
                        None => break,
                    }
                } else {
                    s.push(c);
                }
            }
            return Err(LexError::UnterminatedString(pos));
        }

        let digits_at = if first == '-' { 1 } else { 0 };
        if !rest[digits_at..].starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(None);
        }
        let mut len = digits_at + count_digits(&rest[digits_at..]);
        let mut fractional = false;
        if rest[len..].starts_with('.') && rest[len + 1..].starts_with(|c: char| c.is_ascii_digit())
        {
            fractional = true;
            len += 1 + count_digits(&rest[len + 1..]);
        }
        let text = &rest[..len];
        let number = match text.parse::<i64>() {
            Ok(n) if !fractional => Some(Number::from(n)),
            _ => text.parse::<f64>().ok().and_then(Number::from_f64),
        };
        let pos = self.position();
        let Some(number) = number else {
            return Err(LexError::Unparseable { pos, found: first });
        };
        self.advance(len);
        Ok(Some(Token::Literal(Value::Number(number))))
    }

    /// `{{! body }}` and `{{!-- body --}}`. The close marker itself is left
    /// for the expression loop; the long form may contain `{{` and `}}`.
    fn scan_comment(&mut self) -> Result<Option<Token>, LexError> {
        let rest = self.remaining();
        if !rest.starts_with('!') {
            return Ok(None);
        }

        if let Some(body) = rest.strip_prefix("!--") {
            let Some(end) = body.find("--}}") else {
                return Err(LexError::Unterminated(self.opened_at));
            };
            let text = body[..end].to_string();
            self.advance(3 + end + 2);
            return Ok(Some(Token::Comment(text)));
        }

        let body = &rest[1..];
        let Some(end) = body.find("}}") else {
            return Err(LexError::Unterminated(self.opened_at));
        };
        let text = body[..end].to_string();
        self.advance(1 + end);
        Ok(Some(Token::Comment(text)))
    }

    fn scan_partial(&mut self) -> Option<Token> {
        let rest = self.remaining();
        let after = rest.strip_prefix('>')?;
        let name_at = after.len() - after.trim_start().len();
        let name = &after[name_at..];
        let len = name.find(|c: char| !is_word_char(c)).unwrap_or(name.len());
        if len == 0 {
            return None;
        }
        let name = name[..len].to_string();
        self.advance(1 + name_at + len);
        Some(Token::PartialRef(name))
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '@' || c == '.'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '@')
}

fn count_digits(s: &str) -> usize {
    s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len())
}

/// Tokenizes a whole template eagerly.
pub fn tokenize(input: &str) -> Result<Vec<Lexeme>, LexError> {
    let mut tokenizer = Tokenizer::new(input);
    let mut out = Vec::new();
    while let Some(lexeme) = tokenizer.next_token()? {
        out.push(lexeme);
    }
    log::trace!("tokenized {} bytes into {} tokens", input.len(), out.len());
    Ok(out)
}
