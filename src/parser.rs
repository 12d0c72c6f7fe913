use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexeme, Position, Token, Tokenizer};

/// Why a run of nodes stopped.
enum Stop {
    Eof,
    Else(Position),
    Close { name: String, pos: Position },
}

/// How deeply blocks may nest unless the caller says otherwise.
pub const DEFAULT_MAX_BLOCK_DEPTH: usize = 64;

pub struct Parser<'a> {
    lexer: Tokenizer<'a>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Tokenizer::new(input),
            depth: 0,
            max_depth: DEFAULT_MAX_BLOCK_DEPTH,
        }
    }

    /// Blocks opened deeper than `max_depth` fail with
    /// [`ParseError::NestingTooDeep`].
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn consume(&mut self) -> Result<Option<Lexeme>, ParseError> {
        Ok(self.lexer.next_token()?)
    }

    pub fn parse(&mut self) -> Result<Template, ParseError> {
        let (nodes, stop) = self.parse_nodes()?;
        match stop {
            Stop::Eof => {
                log::trace!("parsed {} top-level nodes", nodes.len());
                Ok(nodes)
            }
            Stop::Else(pos) => Err(ParseError::StrayElse(pos)),
            Stop::Close { name, pos } => Err(ParseError::StrayClose { name, pos }),
        }
    }

    /// Parses sibling nodes until end of input, `{{else}}` or a closer.
    fn parse_nodes(&mut self) -> Result<(Vec<Node>, Stop), ParseError> {
        let mut nodes = Vec::new();
        loop {
            let Some(lexeme) = self.consume()? else {
                return Ok((nodes, Stop::Eof));
            };
            let pos = lexeme.pos;
            let escaped = match lexeme.token {
                Token::Static(s) => {
                    nodes.push(Node::StaticText(s));
                    continue;
                }
                Token::StartExpression { escaped } => escaped,
                other => {
                    return Err(ParseError::Unexpected {
                        pos,
                        found: other.to_string(),
                        expected: "text or `{{`",
                    })
                }
            };

            let mut inner = self.read_expression(escaped, pos)?;
            if inner.is_empty() {
                return Err(ParseError::EmptyExpression(pos));
            }
            let head = inner.remove(0);
            match head.token {
                Token::Comment(_) => {
                    if let Some(extra) = inner.first() {
                        return Err(unexpected(extra, "`}}` after a comment"));
                    }
                }
                Token::PartialRef(name) => {
                    let context = match inner.len() {
                        0 => None,
                        1 => Some(param(&inner[0])?),
                        found => {
                            return Err(ParseError::Arity {
                                name: format!(">{name}"),
                                pos,
                                expected: 1,
                                found,
                            })
                        }
                    };
                    nodes.push(Node::Partial { name, context });
                }
                Token::Word(word) if word == "else" || word == "^" => {
                    if let Some(extra) = inner.first() {
                        return Err(unexpected(extra, "`}}` after `else`"));
                    }
                    return Ok((nodes, Stop::Else(head.pos)));
                }
                Token::Word(word) if word.starts_with('/') => {
                    if let Some(extra) = inner.first() {
                        return Err(unexpected(extra, "`}}` after a closing tag"));
                    }
                    return Ok((
                        nodes,
                        Stop::Close {
                            name: word[1..].to_string(),
                            pos: head.pos,
                        },
                    ));
                }
                Token::Word(word) if word.starts_with('#') => {
                    let name = word[1..].to_string();
                    let args = inner.iter().map(param).collect::<Result<Vec<_>, _>>()?;
                    nodes.push(self.parse_block(name, args, head.pos)?);
                }
                Token::Word(word) if word.starts_with('^') => {
                    let name = word[1..].to_string();
                    if let Some(extra) = inner.first() {
                        return Err(unexpected(extra, "`}}` after a negated section"));
                    }
                    let path = parse_path(&name, head.pos)?;
                    nodes.push(self.parse_body(
                        BlockKind::Unless,
                        name,
                        vec![Param::Path(path)],
                        head.pos,
                    )?);
                }
                Token::Word(word) => {
                    if inner.is_empty() {
                        let path = parse_path(&word, head.pos)?;
                        nodes.push(Node::Path { path, escaped });
                    } else {
                        let args = inner.iter().map(param).collect::<Result<Vec<_>, _>>()?;
                        nodes.push(Node::HelperCall {
                            name: word,
                            args,
                            escaped,
                        });
                    }
                }
                Token::Literal(value) => {
                    if let Some(extra) = inner.first() {
                        return Err(unexpected(extra, "`}}` after a literal"));
                    }
                    nodes.push(Node::Literal { value, escaped });
                }
                other => {
                    return Err(ParseError::Unexpected {
                        pos: head.pos,
                        found: other.to_string(),
                        expected: "a path, helper or block",
                    })
                }
            }
        }
    }

    /// Collects the tokens between a start marker and its matching end marker.
    fn read_expression(
        &mut self,
        escaped: bool,
        opened: Position,
    ) -> Result<Vec<Lexeme>, ParseError> {
        let mut inner = Vec::new();
        loop {
            match self.consume()? {
                Some(Lexeme {
                    token: Token::EndExpression { escaped: closed },
                    ..
                }) => {
                    if closed != escaped {
                        return Err(ParseError::MismatchedDelimiters(opened));
                    }
                    return Ok(inner);
                }
                Some(lexeme @ Lexeme {
                    token: Token::StartExpression { .. } | Token::Static(_),
                    ..
                }) => return Err(unexpected(&lexeme, "`}}`")),
                Some(lexeme) => inner.push(lexeme),
                None => return Err(crate::error::LexError::Unterminated(opened).into()),
            }
        }
    }

    fn parse_block(
        &mut self,
        name: String,
        args: Vec<Param>,
        pos: Position,
    ) -> Result<Node, ParseError> {
        let kind = match name.as_str() {
            "if" => BlockKind::If,
            "unless" => BlockKind::Unless,
            "each" => BlockKind::Each,
            "with" => BlockKind::With,
            "" => {
                return Err(ParseError::Unexpected {
                    pos,
                    found: "`#`".to_string(),
                    expected: "a block name",
                })
            }
            _ if args.is_empty() => BlockKind::Section,
            _ => BlockKind::Helper,
        };

        let args = match kind {
            BlockKind::If | BlockKind::Unless | BlockKind::Each | BlockKind::With => {
                if args.len() != 1 {
                    return Err(ParseError::Arity {
                        name,
                        pos,
                        expected: 1,
                        found: args.len(),
                    });
                }
                args
            }
            BlockKind::Section => vec![Param::Path(parse_path(&name, pos)?)],
            BlockKind::Helper => args,
        };

        self.parse_body(kind, name, args, pos)
    }

    fn parse_body(
        &mut self,
        kind: BlockKind,
        name: String,
        args: Vec<Param>,
        pos: Position,
    ) -> Result<Node, ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::NestingTooDeep {
                name,
                pos,
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        let node = self.parse_branches(kind, name, args, pos);
        self.depth -= 1;
        node
    }

    /// Consequent, optional `else` branch, then the matching closer.
    fn parse_branches(
        &mut self,
        kind: BlockKind,
        name: String,
        args: Vec<Param>,
        pos: Position,
    ) -> Result<Node, ParseError> {
        let (consequent, stop) = self.parse_nodes()?;
        let (alternate, stop) = match stop {
            Stop::Else(_) => {
                let (alternate, stop) = self.parse_nodes()?;
                if let Stop::Else(again) = stop {
                    return Err(ParseError::DuplicateElse(again));
                }
                (Some(alternate), stop)
            }
            stop => (None, stop),
        };

        match stop {
            Stop::Close { name: close, .. } if close == name => Ok(Node::Block {
                kind,
                name,
                args,
                consequent,
                alternate,
            }),
            Stop::Close {
                name: close,
                pos: close_pos,
            } => Err(ParseError::MismatchedBlock {
                open: name,
                close,
                opened: pos,
                pos: close_pos,
            }),
            Stop::Eof => Err(ParseError::UnclosedBlock { name, pos }),
            Stop::Else(again) => Err(ParseError::DuplicateElse(again)),
        }
    }
}

fn unexpected(lexeme: &Lexeme, expected: &'static str) -> ParseError {
    ParseError::Unexpected {
        pos: lexeme.pos,
        found: lexeme.token.to_string(),
        expected,
    }
}

fn param(lexeme: &Lexeme) -> Result<Param, ParseError> {
    match &lexeme.token {
        Token::Literal(value) => Ok(Param::Literal(value.clone())),
        Token::Word(word) if !word.starts_with(['#', '^', '/']) => {
            Ok(Param::Path(parse_path(word, lexeme.pos)?))
        }
        _ => Err(unexpected(lexeme, "a path or literal argument")),
    }
}

/// Splits `../a.b`, `@root.x`, `this/y` and friends into segments.
pub fn parse_path(word: &str, pos: Position) -> Result<Path, ParseError> {
    let bad = || ParseError::Unexpected {
        pos,
        found: format!("`{word}`"),
        expected: "a path",
    };

    let mut segments = Vec::new();
    for part in word.split('/') {
        match part {
            ".." => segments.push(Segment::Parent),
            "." => segments.push(Segment::This),
            "" => return Err(bad()),
            _ => {
                for piece in part.split('.') {
                    let segment = match piece {
                        "" => return Err(bad()),
                        "this" if segments.is_empty() => Segment::This,
                        "@root" => Segment::Root,
                        "@key" => Segment::Key,
                        "@index" => Segment::Index,
                        "@first" => Segment::First,
                        "@last" => Segment::Last,
                        _ if piece.starts_with('@') => {
                            return Err(ParseError::UnknownDataVariable {
                                name: piece[1..].to_string(),
                                pos,
                            })
                        }
                        _ => Segment::Name(piece.to_string()),
                    };
                    segments.push(segment);
                }
            }
        }
    }
    Ok(Path { segments })
}
