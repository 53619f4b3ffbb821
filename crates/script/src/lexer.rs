//! Tokenizer for the mini-script.

use serde_json::Number;

use crate::error::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Num(Number),
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Plus,
    Semicolon,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{s}'"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Num(n) => format!("number {n}"),
            TokenKind::Assign => "'='".into(),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::LBrace => "'{'".into(),
            TokenKind::RBrace => "'}'".into(),
            TokenKind::LBracket => "'['".into(),
            TokenKind::RBracket => "']'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Colon => "':'".into(),
            TokenKind::Plus => "'+'".into(),
            TokenKind::Semicolon => "';'".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1usize;

    while let Some(&c) = chars.peek() {
        let single = match c {
            '=' => Some(TokenKind::Assign),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            '+' => Some(TokenKind::Plus),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = single {
            chars.next();
            tokens.push(Token { kind, line });
            continue;
        }

        match c {
            '\n' => {
                chars.next();
                line += 1;
            }
            _ if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() != Some(&'/') {
                    return Err(ScriptError::validation(line, "unexpected character '/'"));
                }
                while chars.peek().is_some_and(|&ch| ch != '\n') {
                    chars.next();
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let start_line = line;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => s.push(unescape(&mut chars, start_line)?),
                        Some(ch) if ch == quote => break,
                        Some('\n') => {
                            return Err(ScriptError::validation(
                                start_line,
                                "unterminated string literal",
                            ));
                        }
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(ScriptError::validation(
                                start_line,
                                "unterminated string literal",
                            ));
                        }
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Str(s),
                    line: start_line,
                });
            }
            _ if c.is_ascii_digit() || c == '-' || c == '.' => {
                let mut text = String::new();
                while let Some(&nc) = chars.peek() {
                    let exponent_sign =
                        (nc == '-' || nc == '+') && text.ends_with(['e', 'E']);
                    if nc.is_ascii_digit()
                        || nc == '.'
                        || nc == 'e'
                        || nc == 'E'
                        || exponent_sign
                        || (nc == '-' && text.is_empty())
                    {
                        text.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Num(parse_number(&text, line)?),
                    line,
                });
            }
            _ if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut word = String::new();
                while let Some(&wc) = chars.peek() {
                    if wc.is_alphanumeric() || wc == '_' || wc == '$' {
                        word.push(wc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(word),
                    line,
                });
            }
            _ => {
                return Err(ScriptError::validation(
                    line,
                    format!("unexpected character '{c}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn unescape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line: usize,
) -> Result<char, ScriptError> {
    let escaped = chars
        .next()
        .ok_or_else(|| ScriptError::validation(line, "unterminated string literal"))?;
    Ok(match escaped {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'u' => {
            let hex: String = chars.by_ref().take(4).collect();
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| {
                    ScriptError::validation(line, format!("invalid unicode escape '\\u{hex}'"))
                })?
        }
        other => other,
    })
}

fn parse_number(text: &str, line: usize) -> Result<Number, ScriptError> {
    let invalid = || ScriptError::validation(line, format!("invalid number '{text}'"));
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Number::from(i));
    }
    let f: f64 = text.parse().map_err(|_| invalid())?;
    Number::from_f64(f).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_an_insert() {
        assert_eq!(
            kinds(r#"a=I(document,{type:"frame"})"#),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Assign,
                TokenKind::Ident("I".into()),
                TokenKind::LParen,
                TokenKind::Ident("document".into()),
                TokenKind::Comma,
                TokenKind::LBrace,
                TokenKind::Ident("type".into()),
                TokenKind::Colon,
                TokenKind::Str("frame".into()),
                TokenKind::RBrace,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn numbers_and_escapes() {
        assert_eq!(
            kinds(r#"-12 1.5e2 'it\'s' "A""#),
            vec![
                TokenKind::Num(Number::from(-12)),
                TokenKind::Num(Number::from_f64(150.0).unwrap()),
                TokenKind::Str("it's".into()),
                TokenKind::Str("A".into()),
            ]
        );
    }

    #[test]
    fn comments_and_lines() {
        let tokens = tokenize("// setup\nD(\"x\") // gone\n").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("D".into()));
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn unterminated_string_is_validation_failure() {
        let err = tokenize("U(\"abc, {})").unwrap_err();
        assert!(matches!(err, ScriptError::Validation { line: 1, .. }));
    }
}
