// ABOUTME: Single-pass scanner turning Mrya source text into a token stream

use crate::error::MryaError;
use crate::token::{LiteralValue, Token, TokenKind};

fn keyword(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "let" => TokenKind::Let,
        "const" => TokenKind::Const,
        "as" => TokenKind::As,
        "func" => TokenKind::Func,
        "define" => TokenKind::Define,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nil" => TokenKind::Nil,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "output" => TokenKind::Output,
        "input" => TokenKind::Input,
        "request" => TokenKind::Input,
        "import" => TokenKind::Import,
        "using" => TokenKind::Using,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "end" => TokenKind::End,
        "class" => TokenKind::Class,
        "this" => TokenKind::This,
        "inherit" => TokenKind::Inherit,
        _ => return None,
    };
    Some(kind)
}

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self) -> Result<Vec<Token>, MryaError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens
            .push(Token::new(TokenKind::Eof, "", None, self.line));
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), MryaError> {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            ':' => self.add_token(TokenKind::Colon),
            ';' => self.add_token(TokenKind::Semicolon),
            '%' => self.add_token(TokenKind::Percent),
            '.' => {
                if self.peek() == '.' && self.peek_next() == '.' {
                    self.advance();
                    self.advance();
                    self.add_token(TokenKind::Ellipsis);
                } else {
                    self.add_token(TokenKind::Dot);
                }
            }
            '+' => {
                let kind = if self.match_char('=') {
                    TokenKind::PlusEqual
                } else {
                    TokenKind::Plus
                };
                self.add_token(kind);
            }
            '-' => {
                let kind = if self.match_char('=') {
                    TokenKind::MinusEqual
                } else {
                    TokenKind::Minus
                };
                self.add_token(kind);
            }
            '*' => {
                let kind = if self.match_char('=') {
                    TokenKind::StarEqual
                } else {
                    TokenKind::Star
                };
                self.add_token(kind);
            }
            '!' => {
                let kind = if self.match_char('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_char('=') {
                    self.add_token(TokenKind::SlashEqual);
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            '#' => {
                // Shebang is only permitted as the very first two characters
                if self.current == 1 && self.match_char('!') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    return Err(MryaError::Lexer {
                        line: self.line,
                        message: format!("Unexpected character: {c}"),
                    });
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.string()?,
            'h' if self.peek() == '"' => self.h_string()?,
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            _ => {
                return Err(MryaError::Lexer {
                    line: self.line,
                    message: format!("Unexpected character: {c}"),
                });
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> char {
        self.current += 1;
        self.source[self.current - 1]
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.add_token_literal(kind, None);
    }

    fn add_token_literal(&mut self, kind: TokenKind, literal: Option<LiteralValue>) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, text, literal, self.line));
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    /// Scan a quoted body up to the closing quote, processing escapes.
    fn quoted_body(&mut self, what: &str) -> Result<String, MryaError> {
        let mut value = String::new();
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }

            let c = self.advance();
            if c == '\\' {
                if self.match_char('n') {
                    value.push('\n');
                } else if self.match_char('t') {
                    value.push('\t');
                } else if self.match_char('"') {
                    value.push('"');
                } else if self.match_char('\\') {
                    value.push('\\');
                } else {
                    // Not a recognized escape: keep the literal backslash
                    value.push('\\');
                }
            } else {
                value.push(c);
            }
        }

        if self.is_at_end() {
            return Err(MryaError::Lexer {
                line: self.line,
                message: format!("Unterminated {what}."),
            });
        }

        self.advance(); // Consume the closing quote
        Ok(value)
    }

    fn string(&mut self) -> Result<(), MryaError> {
        let value = self.quoted_body("string")?;
        self.add_token_literal(TokenKind::String, Some(LiteralValue::Str(value)));
        Ok(())
    }

    /// An h-string (`h"..."`) keeps its processed body as the literal; the
    /// parser scans it for `<expr>` holes later.
    fn h_string(&mut self) -> Result<(), MryaError> {
        self.advance(); // Consume the opening quote after 'h'
        let value = self.quoted_body("h-string")?;
        self.add_token_literal(TokenKind::HString, Some(LiteralValue::Str(value)));
        Ok(())
    }

    fn number(&mut self) -> Result<(), MryaError> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let literal = if is_float {
            text.parse::<f64>().ok().map(LiteralValue::Float)
        } else {
            text.parse::<i64>().ok().map(LiteralValue::Int)
        };

        match literal {
            Some(lit) => {
                self.add_token_literal(TokenKind::Number, Some(lit));
                Ok(())
            }
            None => Err(MryaError::Lexer {
                line: self.line,
                message: format!("Invalid number: {text}"),
            }),
        }
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = keyword(&text).unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        Lexer::new(source).scan_tokens().expect("lexing failed")
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_punctuation_and_operators() {
        assert_eq!(
            kinds("( ) { } [ ] , . : ; - + * / % ..."),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Ellipsis,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= += -= *= /="),
            vec![
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = scan("let foo = nil");
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].lexeme, "foo");
        assert_eq!(tokens[2].kind, TokenKind::Equal);
        assert_eq!(tokens[3].kind, TokenKind::Nil);
    }

    #[test]
    fn test_request_is_input_alias() {
        let tokens = scan("request input");
        assert_eq!(tokens[0].kind, TokenKind::Input);
        assert_eq!(tokens[0].lexeme, "request");
        assert_eq!(tokens[1].kind, TokenKind::Input);
        assert_eq!(tokens[1].lexeme, "input");
    }

    #[test]
    fn test_int_and_float_literals() {
        let tokens = scan("42 3.25");
        assert_eq!(tokens[0].literal, Some(LiteralValue::Int(42)));
        assert_eq!(tokens[1].literal, Some(LiteralValue::Float(3.25)));
    }

    #[test]
    fn test_number_trailing_dot_is_subscript_safe() {
        // "1." lexes as the number 1 followed by a dot
        assert_eq!(
            kinds("1."),
            vec![TokenKind::Number, TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = scan(r#""a\nb\t\"c\\d\q""#);
        assert_eq!(
            tokens[0].literal,
            Some(LiteralValue::Str("a\nb\t\"c\\d\\q".to_string()))
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"abc").scan_tokens().unwrap_err();
        assert_eq!(err.kind_name(), "LexerError");
    }

    #[test]
    fn test_h_string_raw_body() {
        let tokens = scan("h\"hello <name>!\"");
        assert_eq!(tokens[0].kind, TokenKind::HString);
        assert_eq!(
            tokens[0].literal,
            Some(LiteralValue::Str("hello <name>!".to_string()))
        );
    }

    #[test]
    fn test_identifier_starting_with_h() {
        let tokens = scan("height h2o h");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].lexeme, "height");
        assert_eq!(tokens[1].lexeme, "h2o");
        assert_eq!(tokens[2].lexeme, "h");
    }

    #[test]
    fn test_line_tracking() {
        let tokens = scan("let a = 1\nlet b = 2\n\nlet c = 3");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[4].line, 2);
        assert_eq!(tokens[8].line, 4);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 // the rest is ignored\n2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn test_shebang_first_line_only() {
        assert_eq!(kinds("#!/usr/bin/env mrya\n1"), vec![TokenKind::Number, TokenKind::Eof]);
        assert!(Lexer::new("1\n#!/usr/bin/env mrya").scan_tokens().is_err());
    }

    #[test]
    fn test_unknown_character() {
        let err = Lexer::new("let a = @").scan_tokens().unwrap_err();
        assert_eq!(err.kind_name(), "LexerError");
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_lexeme_matches_source() {
        let source = "let total = 19.5";
        for token in scan(source) {
            if token.kind != TokenKind::Eof {
                assert!(source.contains(&token.lexeme));
            }
        }
    }
}
