//! Tokenizer for declaration source.

use ms_common::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Semi,
    Comma,
    Eq,
    Arrow,
    PathSep,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::Str(_) => "string literal".to_string(),
            Token::Int(i) => format!("integer {i}"),
            Token::Float(f) => format!("float {f}"),
            Token::Semi => "';'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Eq => "'='".to_string(),
            Token::Arrow => "'=>'".to_string(),
            Token::PathSep => "'::'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
        }
    }
}

/// A token with the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    let err = |line: usize, message: String| Error::Parse { line, message };

    while i < chars.len() {
        let c = chars[i];
        let start_line = line;
        let single = match c {
            ';' => Some(Token::Semi),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned { token, line });
            i += 1;
            continue;
        }

        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'>') {
                    tokens.push(Spanned { token: Token::Arrow, line });
                    i += 2;
                } else {
                    tokens.push(Spanned { token: Token::Eq, line });
                    i += 1;
                }
            }
            ':' => {
                if chars.get(i + 1) != Some(&':') {
                    return Err(err(line, "expected '::'".to_string()));
                }
                tokens.push(Spanned { token: Token::PathSep, line });
                i += 2;
            }
            '\'' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(err(start_line, "unterminated string literal".into())),
                        Some('\\') => match chars.get(i + 1) {
                            Some(&next @ ('\\' | '\'')) => {
                                value.push(next);
                                i += 2;
                            }
                            _ => return Err(err(line, "invalid escape in string literal".into())),
                        },
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&other) => {
                            if other == '\n' {
                                line += 1;
                            }
                            value.push(other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Spanned {
                    token: Token::Str(value),
                    line: start_line,
                });
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                let mut is_float = false;
                while let Some(&d) = chars.get(i) {
                    if d.is_ascii_digit() {
                        i += 1;
                    } else if d == '.' && !is_float && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
                        is_float = true;
                        i += 1;
                    } else if (d == 'e' || d == 'E') && i > start {
                        is_float = true;
                        i += 1;
                        if matches!(chars.get(i), Some('+') | Some('-')) {
                            i += 1;
                        }
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let token = if is_float {
                    Token::Float(
                        text.parse()
                            .map_err(|_| err(line, format!("invalid float literal '{text}'")))?,
                    )
                } else {
                    Token::Int(
                        text.parse()
                            .map_err(|_| err(line, format!("invalid integer literal '{text}'")))?,
                    )
                };
                tokens.push(Spanned { token, line });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|d| d.is_ascii_alphanumeric() || *d == '_')
                {
                    i += 1;
                }
                tokens.push(Spanned {
                    token: Token::Ident(chars[start..i].iter().collect()),
                    line,
                });
            }
            other => return Err(err(line, format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}
