//! Recursive-descent parser for declaration source.

use super::lexer::{tokenize, Spanned, Token};
use super::{ClassDecl, MethodBody, MethodDecl};
use crate::registry::CallKind;
use ms_common::id::SCOPE_SEPARATOR;
use ms_common::{ClassName, Error, Result, Value};
use std::collections::BTreeMap;

/// Parse a source file into its class declarations, in source order.
pub fn parse_source(src: &str) -> Result<Vec<ClassDecl>> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        scope: String::new(),
    };
    let mut classes = Vec::new();

    loop {
        let is_scope = match parser.peek_token() {
            None => break,
            Some(Token::Ident(kw)) if kw == "scope" => true,
            Some(Token::Ident(kw)) if kw == "class" => false,
            Some(other) => {
                let msg = format!("expected 'scope' or 'class', found {}", other.describe());
                return Err(parser.error_here(msg));
            }
        };
        if is_scope {
            parser.advance();
            parser.scope = parser.path()?;
            parser.expect(Token::Semi)?;
        } else {
            classes.push(parser.class()?);
        }
    }

    Ok(classes)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    scope: String,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn peek_token_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn error_here(&self, message: String) -> Error {
        Error::Parse {
            line: self.line(),
            message,
        }
    }

    fn next_or_eof(&mut self, expected: &str) -> Result<Spanned> {
        match self.advance() {
            Some(s) => Ok(s),
            None => Err(self.error_here(format!("expected {expected}, found end of input"))),
        }
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        let got = self.next_or_eof(&want.describe())?;
        if got.token == want {
            Ok(())
        } else {
            Err(Error::Parse {
                line: got.line,
                message: format!("expected {}, found {}", want.describe(), got.token.describe()),
            })
        }
    }

    fn ident(&mut self) -> Result<String> {
        let got = self.next_or_eof("identifier")?;
        match got.token {
            Token::Ident(name) => Ok(name),
            other => Err(Error::Parse {
                line: got.line,
                message: format!("expected identifier, found {}", other.describe()),
            }),
        }
    }

    fn keyword(&mut self, kw: &str) -> Result<()> {
        let line = self.line();
        let name = self.ident()?;
        if name == kw {
            Ok(())
        } else {
            Err(Error::Parse {
                line,
                message: format!("expected '{kw}', found '{name}'"),
            })
        }
    }

    fn string(&mut self) -> Result<String> {
        let got = self.next_or_eof("string literal")?;
        match got.token {
            Token::Str(s) => Ok(s),
            other => Err(Error::Parse {
                line: got.line,
                message: format!("expected string literal, found {}", other.describe()),
            }),
        }
    }

    fn path(&mut self) -> Result<String> {
        let mut segments = vec![self.ident()?];
        while self.peek_token() == Some(&Token::PathSep) {
            self.advance();
            segments.push(self.ident()?);
        }
        Ok(segments.join(SCOPE_SEPARATOR))
    }

    fn class_name(&self, raw: &str, line: usize) -> Result<ClassName> {
        ClassName::parse(raw).map_err(|e| Error::Parse {
            line,
            message: e.to_string(),
        })
    }

    fn class(&mut self) -> Result<ClassDecl> {
        let line = self.line();
        self.keyword("class")?;
        let simple = self.ident()?;
        let name = ClassName::join(&self.scope, &simple).map_err(|e| Error::Parse {
            line,
            message: e.to_string(),
        })?;

        let parent = if self.peek_token() == Some(&Token::Ident("extends".into())) {
            self.advance();
            let parent_line = self.line();
            let raw = self.path()?;
            Some(self.class_name(&raw, parent_line)?)
        } else {
            None
        };

        let mut decl = ClassDecl {
            name,
            parent,
            consts: BTreeMap::new(),
            static_properties: BTreeMap::new(),
            properties: BTreeMap::new(),
            methods: BTreeMap::new(),
            line,
        };

        self.expect(Token::LBrace)?;
        loop {
            if self.peek_token() == Some(&Token::RBrace) {
                self.advance();
                break;
            }
            self.member(&mut decl)?;
        }
        Ok(decl)
    }

    fn member(&mut self, decl: &mut ClassDecl) -> Result<()> {
        let line = self.line();
        let keyword = self.ident()?;
        match keyword.as_str() {
            "const" => self.field(&mut decl.consts, "constant", line),
            "var" => self.field(&mut decl.properties, "property", line),
            "fn" => self.method(decl, CallKind::Instance, line),
            "static" => {
                // `static fn = ...;` declares a static property named `fn`.
                let is_method = self.peek_token() == Some(&Token::Ident("fn".into()))
                    && matches!(self.peek_token_at(1), Some(Token::Ident(_)));
                if is_method {
                    self.advance();
                    self.method(decl, CallKind::Static, line)
                } else {
                    self.field(&mut decl.static_properties, "static property", line)
                }
            }
            other => Err(Error::Parse {
                line,
                message: format!("expected 'const', 'static', 'var' or 'fn', found '{other}'"),
            }),
        }
    }

    fn field(&mut self, slot: &mut BTreeMap<String, Value>, what: &str, line: usize) -> Result<()> {
        let name = self.ident()?;
        self.expect(Token::Eq)?;
        let value = self.literal()?;
        self.expect(Token::Semi)?;
        if what == "constant" && !value.is_scalar() {
            return Err(Error::Parse {
                line,
                message: format!("constant '{name}' must be scalar"),
            });
        }
        if slot.insert(name.clone(), value).is_some() {
            return Err(Error::Parse {
                line,
                message: format!("duplicate {what} '{name}'"),
            });
        }
        Ok(())
    }

    fn method(&mut self, decl: &mut ClassDecl, call_kind: CallKind, line: usize) -> Result<()> {
        let name = self.ident()?;
        self.expect(Token::LParen)?;
        self.expect(Token::RParen)?;
        self.expect(Token::Arrow)?;

        let body_line = self.line();
        let body = match self.ident()?.as_str() {
            "forward" => {
                self.expect(Token::LParen)?;
                let target = self.string()?;
                self.expect(Token::Comma)?;
                let method = self.string()?;
                self.expect(Token::RParen)?;
                MethodBody::Forward {
                    target: self.class_name(&target, body_line)?,
                    method,
                }
            }
            "native" => {
                self.expect(Token::LParen)?;
                let symbol = self.string()?;
                self.expect(Token::RParen)?;
                MethodBody::Native(symbol)
            }
            other => {
                return Err(Error::Parse {
                    line: body_line,
                    message: format!("expected 'forward' or 'native', found '{other}'"),
                })
            }
        };
        self.expect(Token::Semi)?;

        if decl
            .methods
            .insert(name.clone(), MethodDecl { call_kind, body })
            .is_some()
        {
            return Err(Error::Parse {
                line,
                message: format!("duplicate method '{name}'"),
            });
        }
        Ok(())
    }

    fn literal(&mut self) -> Result<Value> {
        let got = self.next_or_eof("literal")?;
        match got.token {
            Token::Ident(kw) if kw == "null" => Ok(Value::Null),
            Token::Ident(kw) if kw == "true" => Ok(Value::Bool(true)),
            Token::Ident(kw) if kw == "false" => Ok(Value::Bool(false)),
            Token::Int(i) => Ok(Value::Int(i)),
            Token::Float(f) => Ok(Value::Float(f)),
            Token::Str(s) => Ok(Value::Str(s)),
            Token::LBracket => self.keyed_list(),
            Token::LBrace => self.map(),
            other => Err(Error::Parse {
                line: got.line,
                message: format!("expected literal, found {}", other.describe()),
            }),
        }
    }

    /// `[k => v, ...]` after the opening bracket. Keys `0..n` in order give a
    /// list; any other integer keys give a map keyed by their decimal text.
    fn keyed_list(&mut self) -> Result<Value> {
        let mut entries: Vec<(i64, Value)> = Vec::new();
        loop {
            if self.peek_token() == Some(&Token::RBracket) {
                self.advance();
                break;
            }
            let got = self.next_or_eof("integer key")?;
            let key = match got.token {
                Token::Int(k) => k,
                other => {
                    return Err(Error::Parse {
                        line: got.line,
                        message: format!("expected integer key, found {}", other.describe()),
                    })
                }
            };
            self.expect(Token::Arrow)?;
            entries.push((key, self.literal()?));
            if !self.list_separator(Token::RBracket)? {
                break;
            }
        }

        let sequential = entries
            .iter()
            .enumerate()
            .all(|(idx, (key, _))| usize::try_from(*key).ok() == Some(idx));
        if sequential {
            Ok(Value::List(entries.into_iter().map(|(_, v)| v).collect()))
        } else {
            Ok(Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ))
        }
    }

    /// `{'k' => v, ...}` after the opening brace.
    fn map(&mut self) -> Result<Value> {
        let mut entries = BTreeMap::new();
        loop {
            if self.peek_token() == Some(&Token::RBrace) {
                self.advance();
                break;
            }
            let key = self.string()?;
            self.expect(Token::Arrow)?;
            entries.insert(key, self.literal()?);
            if !self.list_separator(Token::RBrace)? {
                break;
            }
        }
        Ok(Value::Map(entries))
    }

    /// After an entry: consume `,` (returning true to continue) or the
    /// closing token (returning false).
    fn list_separator(&mut self, close: Token) -> Result<bool> {
        match self.peek_token() {
            Some(Token::Comma) => {
                self.advance();
                Ok(true)
            }
            Some(t) if *t == close => {
                self.advance();
                Ok(false)
            }
            _ => {
                let found = self
                    .peek_token()
                    .map_or_else(|| "end of input".to_string(), Token::describe);
                Err(self.error_here(format!(
                    "expected ',' or {}, found {found}",
                    close.describe()
                )))
            }
        }
    }
}
