//! Lexical scanner for the Pascal subset.
//!
//! Converts source text into a [`Token`] stream consumed one token at a time
//! by the parser. Words are lowercased before the reserved-word lookup, so
//! the rest of the toolchain only ever sees lowercase identifiers.
//!
//! Scan errors do not abort scanning: the offending input becomes a token
//! with `code == TokenCode::Error` (or an end-of-file token for unterminated
//! comments and strings) carrying the [`ErrorCode`], and scanning resumes at
//! the next character.

pub mod source;
pub mod token;

use crate::constants::MAX_DIGIT_COUNT;
use crate::errors::ErrorCode;
use source::{char_code, CharCode, SourceBuffer, EOF_CHAR};
use token::{reserved_word, Token, TokenCode, TokenValue};

/// Streaming tokenizer over a [`SourceBuffer`].
pub struct Scanner {
    source: SourceBuffer,
}

impl Scanner {
    pub fn new(source: SourceBuffer) -> Self {
        Scanner { source }
    }

    /// Current source line, for caret diagnostics.
    pub fn current_line(&self) -> String {
        self.source.current_line()
    }

    /// Scan and return the next token.
    pub fn next_token(&mut self) -> Token {
        if let Err(code) = self.skip_whitespace() {
            // Unterminated comment: surface the error on an EOF token.
            let mut token = self.eof_token();
            token.error = Some(code);
            return token;
        }

        let line = self.source.line_number();
        let column = self.source.column();
        let ch = self.source.current_char();

        match char_code(ch) {
            CharCode::Letter => self.scan_word(line, column),
            CharCode::Digit => self.scan_number(line, column),
            CharCode::Quote => self.scan_string(line, column),
            CharCode::EndOfFile => self.eof_token(),
            CharCode::WhiteSpace => unreachable!("whitespace skipped above"),
            CharCode::Special => self.scan_special(line, column),
        }
    }

    /// Skip whitespace and brace-delimited comments.
    fn skip_whitespace(&mut self) -> Result<(), ErrorCode> {
        loop {
            match self.source.current_char() {
                ' ' | '\t' | '\r' | '\n' => {
                    self.source.next_char();
                }
                '{' => loop {
                    match self.source.next_char() {
                        '}' => {
                            self.source.next_char();
                            break;
                        }
                        EOF_CHAR => return Err(ErrorCode::UnexpectedEndOfFile),
                        _ => {}
                    }
                },
                _ => return Ok(()),
            }
        }
    }

    fn eof_token(&mut self) -> Token {
        Token::new(
            TokenCode::EndOfFile,
            String::new(),
            self.source.line_number(),
            self.source.column(),
        )
    }

    /// Scan an identifier or reserved word, lowercasing as it accumulates.
    fn scan_word(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::new();
        let mut ch = self.source.current_char();
        while matches!(char_code(ch), CharCode::Letter | CharCode::Digit) {
            text.push(ch.to_ascii_lowercase());
            ch = self.source.next_char();
        }

        let code = reserved_word(&text).unwrap_or(TokenCode::Identifier);
        Token::new(code, text, line, column)
    }

    /// Scan a numeric literal: whole part, optional fraction, optional signed
    /// exponent. A `.` that starts a `..` token is pushed back so `5..10`
    /// scans as integer, DOTDOT, integer.
    fn scan_number(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::new();
        let mut value = 0f64;
        let mut digit_count = 0usize;
        let mut fraction_digits = 0i32;
        let mut is_real = false;
        let mut saw_error = None;

        self.scan_digits(&mut text, &mut value, &mut digit_count);

        if self.source.current_char() == '.' {
            if self.source.next_char() == '.' {
                // Range token: leave both dots for the next scan.
                self.source.put_back();
            } else {
                is_real = true;
                text.push('.');
                if char_code(self.source.current_char()) != CharCode::Digit {
                    saw_error = Some(ErrorCode::InvalidNumber);
                }
                let before = digit_count;
                self.scan_digits(&mut text, &mut value, &mut digit_count);
                fraction_digits = (digit_count - before) as i32;
            }
        }

        let mut exponent = 0i32;
        let mut exponent_sign = 1i32;
        let ch = self.source.current_char();
        if ch == 'e' || ch == 'E' {
            is_real = true;
            text.push(ch);
            let mut ch = self.source.next_char();
            if ch == '+' || ch == '-' {
                if ch == '-' {
                    exponent_sign = -1;
                }
                text.push(ch);
                ch = self.source.next_char();
            }
            if char_code(ch) != CharCode::Digit {
                saw_error = Some(ErrorCode::InvalidNumber);
            }
            let mut ch = self.source.current_char();
            while char_code(ch) == CharCode::Digit {
                text.push(ch);
                exponent = (exponent * 10 + (ch as i32 - '0' as i32)).min(9999);
                ch = self.source.next_char();
            }
        }

        if digit_count > MAX_DIGIT_COUNT {
            saw_error = Some(ErrorCode::TooManyDigits);
        }

        if let Some(code) = saw_error {
            let mut token = Token::new(TokenCode::Error, text, line, column);
            token.error = Some(code);
            return token;
        }

        value *= 10f64.powi(exponent_sign * exponent - fraction_digits);

        if is_real {
            let mut token = Token::new(TokenCode::RealLiteral, text, line, column);
            token.value = TokenValue::Real(value as f32);
            token
        } else if value > i32::MAX as f64 {
            let mut token = Token::new(TokenCode::Error, text, line, column);
            token.error = Some(ErrorCode::IntegerOutOfRange);
            token
        } else {
            let mut token = Token::new(TokenCode::IntegerLiteral, text, line, column);
            token.value = TokenValue::Integer(value as i32);
            token
        }
    }

    /// Accumulate consecutive digits as `value = value*10 + digit`.
    fn scan_digits(&mut self, text: &mut String, value: &mut f64, digit_count: &mut usize) {
        let mut ch = self.source.current_char();
        while char_code(ch) == CharCode::Digit {
            text.push(ch);
            *value = *value * 10.0 + (ch as u32 - '0' as u32) as f64;
            *digit_count += 1;
            ch = self.source.next_char();
        }
    }

    /// Scan a quoted string. Two adjacent quotes inside the literal stand for
    /// one quote; an end of line inside the literal folds to a space.
    fn scan_string(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::from("'");
        let mut contents = String::new();

        loop {
            let ch = self.source.next_char();
            match ch {
                EOF_CHAR => {
                    let mut token = Token::new(TokenCode::Error, text, line, column);
                    token.error = Some(ErrorCode::UnexpectedEndOfFile);
                    return token;
                }
                '\n' => {
                    text.push(' ');
                    contents.push(' ');
                }
                '\'' => {
                    text.push('\'');
                    if self.source.next_char() == '\'' {
                        // Doubled quote: one quote in the literal.
                        text.push('\'');
                        contents.push('\'');
                    } else {
                        let mut token =
                            Token::new(TokenCode::StringLiteral, text, line, column);
                        token.value = TokenValue::Str(contents);
                        return token;
                    }
                }
                ch => {
                    text.push(ch);
                    contents.push(ch);
                }
            }
        }
    }

    /// Scan a special symbol, disambiguating the two-character operators with
    /// one character of lookahead.
    fn scan_special(&mut self, line: u32, column: u32) -> Token {
        let ch = self.source.current_char();
        let mut text = String::new();
        text.push(ch);

        let code = match ch {
            '+' => {
                self.source.next_char();
                TokenCode::Plus
            }
            '-' => {
                self.source.next_char();
                TokenCode::Minus
            }
            '*' => {
                self.source.next_char();
                TokenCode::Star
            }
            '/' => {
                self.source.next_char();
                TokenCode::Slash
            }
            '=' => {
                self.source.next_char();
                TokenCode::Equal
            }
            ',' => {
                self.source.next_char();
                TokenCode::Comma
            }
            ';' => {
                self.source.next_char();
                TokenCode::Semicolon
            }
            '(' => {
                self.source.next_char();
                TokenCode::LParen
            }
            ')' => {
                self.source.next_char();
                TokenCode::RParen
            }
            '[' => {
                self.source.next_char();
                TokenCode::LBracket
            }
            ']' => {
                self.source.next_char();
                TokenCode::RBracket
            }
            '^' => {
                self.source.next_char();
                TokenCode::UpArrow
            }
            ':' => {
                if self.source.next_char() == '=' {
                    text.push('=');
                    self.source.next_char();
                    TokenCode::ColonEqual
                } else {
                    TokenCode::Colon
                }
            }
            '<' => match self.source.next_char() {
                '=' => {
                    text.push('=');
                    self.source.next_char();
                    TokenCode::Le
                }
                '>' => {
                    text.push('>');
                    self.source.next_char();
                    TokenCode::Ne
                }
                _ => TokenCode::Lt,
            },
            '>' => {
                if self.source.next_char() == '=' {
                    text.push('=');
                    self.source.next_char();
                    TokenCode::Ge
                } else {
                    TokenCode::Gt
                }
            }
            '.' => {
                if self.source.next_char() == '.' {
                    text.push('.');
                    self.source.next_char();
                    TokenCode::DotDot
                } else {
                    TokenCode::Period
                }
            }
            _ => {
                self.source.next_char();
                let mut token = Token::new(TokenCode::Error, text, line, column);
                token.error = Some(ErrorCode::Unrecognizable);
                return token;
            }
        };

        Token::new(code, text, line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(SourceBuffer::from_text(source));
        let mut tokens = Vec::new();
        loop {
            let token = scanner.next_token();
            let done = token.code == TokenCode::EndOfFile;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    #[test]
    fn test_integer_literal() {
        let tokens = scan_all("42");
        assert_eq!(tokens[0].code, TokenCode::IntegerLiteral);
        assert_eq!(tokens[0].value, TokenValue::Integer(42));
    }

    #[test]
    fn test_real_literal() {
        let tokens = scan_all("3.14");
        assert_eq!(tokens[0].code, TokenCode::RealLiteral);
        match tokens[0].value {
            TokenValue::Real(v) => assert!((v - 3.14).abs() < 1e-6),
            ref other => panic!("expected real, got {:?}", other),
        }
    }

    #[test]
    fn test_real_with_exponent() {
        let tokens = scan_all("1.5e2");
        assert_eq!(tokens[0].code, TokenCode::RealLiteral);
        match tokens[0].value {
            TokenValue::Real(v) => assert!((v - 150.0).abs() < 1e-4),
            ref other => panic!("expected real, got {:?}", other),
        }
    }

    #[test]
    fn test_too_many_digits() {
        let tokens = scan_all("999999999999999999999"); // 21 digits
        assert_eq!(tokens[0].code, TokenCode::Error);
        assert_eq!(tokens[0].error, Some(ErrorCode::TooManyDigits));
    }

    #[test]
    fn test_integer_out_of_range() {
        let tokens = scan_all("9999999999");
        assert_eq!(tokens[0].code, TokenCode::Error);
        assert_eq!(tokens[0].error, Some(ErrorCode::IntegerOutOfRange));
    }

    #[test]
    fn test_dotdot_after_number() {
        let tokens = scan_all("5..10");
        assert_eq!(tokens[0].code, TokenCode::IntegerLiteral);
        assert_eq!(tokens[0].value, TokenValue::Integer(5));
        assert_eq!(tokens[1].code, TokenCode::DotDot);
        assert_eq!(tokens[2].code, TokenCode::IntegerLiteral);
        assert_eq!(tokens[2].value, TokenValue::Integer(10));
    }

    #[test]
    fn test_words_and_case_folding() {
        let tokens = scan_all("BEGIN Count END");
        assert_eq!(tokens[0].code, TokenCode::Begin);
        assert_eq!(tokens[1].code, TokenCode::Identifier);
        assert_eq!(tokens[1].text, "count");
        assert_eq!(tokens[2].code, TokenCode::End);
    }

    #[test]
    fn test_two_character_operators() {
        let tokens = scan_all(":= <= >= <> .. < > :");
        let codes: Vec<TokenCode> = tokens.iter().map(|t| t.code).collect();
        assert_eq!(
            &codes[..8],
            &[
                TokenCode::ColonEqual,
                TokenCode::Le,
                TokenCode::Ge,
                TokenCode::Ne,
                TokenCode::DotDot,
                TokenCode::Lt,
                TokenCode::Gt,
                TokenCode::Colon,
            ]
        );
    }

    #[test]
    fn test_string_with_doubled_quote() {
        let tokens = scan_all("'don''t'");
        assert_eq!(tokens[0].code, TokenCode::StringLiteral);
        assert_eq!(tokens[0].value, TokenValue::Str("don't".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = scan_all("'abc");
        assert_eq!(tokens[0].code, TokenCode::Error);
        assert_eq!(tokens[0].error, Some(ErrorCode::UnexpectedEndOfFile));
    }

    #[test]
    fn test_comment_skipped() {
        let tokens = scan_all("a { comment } b");
        assert_eq!(tokens[0].text, "a");
        assert_eq!(tokens[1].text, "b");
    }

    #[test]
    fn test_unterminated_comment() {
        let tokens = scan_all("a { never closed");
        assert_eq!(tokens[0].text, "a");
        assert_eq!(tokens[1].code, TokenCode::EndOfFile);
        assert_eq!(tokens[1].error, Some(ErrorCode::UnexpectedEndOfFile));
    }

    #[test]
    fn test_unrecognizable_character_continues() {
        let tokens = scan_all("a ? b");
        assert_eq!(tokens[0].text, "a");
        assert_eq!(tokens[1].code, TokenCode::Error);
        assert_eq!(tokens[1].error, Some(ErrorCode::Unrecognizable));
        assert_eq!(tokens[2].text, "b");
    }
}
