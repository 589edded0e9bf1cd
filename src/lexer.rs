//! Hand-rolled single-pass tokenizer.
//!
//! The distilled syntax-tree interface treats lexing as an external black
//! box; this crate is self-contained, so the lexical grammar is fixed here:
//! keywords, identifiers, integer/character literals, the operators and
//! punctuation the language actually uses (no `&&`/`||` — only the bitwise
//! `& | ^` forms), and `//`/`/* */` comments.

use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Int,
    Char,
    Void,
    If,
    Else,
    While,
    Return,
    Ident(String),
    IntLit(String),
    /// Numeric value plus whether the literal held more than one character
    /// (`'ab'` folds to one value like `'a'` does, but is flagged so lowering
    /// can warn and treat the result as `int` rather than `char`).
    CharLit(i32, bool),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    Amp,
    Pipe,
    Caret,
    Bang,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut clone = self.chars.clone();
                    clone.next();
                    match clone.next() {
                        Some('/') => {
                            self.bump();
                            self.bump();
                            while let Some(c) = self.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            loop {
                                match self.bump() {
                                    None => {
                                        return Err(CompileError::Parse {
                                            message: "unterminated block comment".to_string(),
                                            line: self.line,
                                        });
                                    }
                                    Some('*') if self.peek() == Some('/') => {
                                        self.bump();
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, CompileError> {
        self.skip_trivia()?;
        let line = self.line;
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
            });
        };

        if c.is_ascii_digit() {
            return self.lex_int_lit(line);
        }
        if c == '_' || c.is_alphabetic() {
            return Ok(self.lex_ident_or_keyword(line));
        }
        if c == '\'' {
            return self.lex_char_lit(line);
        }

        self.bump();
        let kind = match c {
            '+' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => TokenKind::Percent,
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Neq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => TokenKind::Amp,
            '|' => TokenKind::Pipe,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            other => {
                return Err(CompileError::Parse {
                    message: format!("unexpected character '{other}'"),
                    line,
                });
            }
        };
        Ok(Token { kind, line })
    }

    fn lex_ident_or_keyword(&mut self, line: u32) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = match s.as_str() {
            "int" => TokenKind::Int,
            "char" => TokenKind::Char,
            "void" => TokenKind::Void,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            _ => TokenKind::Ident(s),
        };
        Token { kind, line }
    }

    fn lex_int_lit(&mut self, line: u32) -> Result<Token, CompileError> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(Token {
            kind: TokenKind::IntLit(s),
            line,
        })
    }

    fn lex_char_lit(&mut self, line: u32) -> Result<Token, CompileError> {
        self.bump(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                None => {
                    return Err(CompileError::Parse {
                        message: "unterminated character literal".to_string(),
                        line,
                    });
                }
                Some('\'') => break,
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| CompileError::Parse {
                        message: "unterminated character literal".to_string(),
                        line,
                    })?;
                    bytes.push(match escaped {
                        'n' => b'\n',
                        't' => b'\t',
                        '0' => 0,
                        '\\' => b'\\',
                        '\'' => b'\'',
                        other => other as u8,
                    });
                }
                Some(c) => bytes.push(c as u8),
            }
        }
        if bytes.is_empty() {
            return Err(CompileError::Parse {
                message: "empty character literal".to_string(),
                line,
            });
        }
        // Multi-character literals fold left-to-right into one int, matching
        // the tool this crate is modeled on.
        let value = bytes
            .iter()
            .fold(0i32, |acc, &b| acc.wrapping_shl(8).wrapping_add(b as i32));
        Ok(Token {
            kind: TokenKind::CharLit(value, bytes.len() > 1),
            line,
        })
    }
}
