//! Tokenizer for the form surface.
//!
//! Comments run from `#` to the end of the line. Strings use the usual
//! backslash escapes, characters are quoted with single quotes, and
//! anything that is not a delimiter, number, string or character is a
//! symbol.

use afnix_engine::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Int(i64),
    Real(f64),
    Str(String),
    Char(char),
    Symbol(String),
}

/// A token with the line it started on, for diagnostics.
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

fn syntax_error(line: usize, msg: &str) -> EngineError {
    EngineError::SyntaxError(format!("line {}: {}", line, msg))
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')' && c != '"' && c != '\'' && c != '#'
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1usize;
    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                // Comment to end of line.
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '(' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::LParen,
                    line,
                });
            }
            ')' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::RParen,
                    line,
                });
            }
            '"' => {
                chars.next();
                let start = line;
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('r') => text.push('\r'),
                            Some('\\') => text.push('\\'),
                            Some('"') => text.push('"'),
                            Some(other) => {
                                return Err(syntax_error(
                                    line,
                                    &format!("unknown escape '\\{}'", other),
                                ))
                            }
                            None => {
                                return Err(syntax_error(start, "unterminated string"))
                            }
                        },
                        Some('\n') => {
                            line += 1;
                            text.push('\n');
                        }
                        Some(other) => text.push(other),
                        None => return Err(syntax_error(start, "unterminated string")),
                    }
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    line: start,
                });
            }
            '\'' => {
                chars.next();
                let value = match chars.next() {
                    Some('\\') => match chars.next() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        _ => return Err(syntax_error(line, "unknown character escape")),
                    },
                    Some(c) => c,
                    None => return Err(syntax_error(line, "unterminated character")),
                };
                match chars.next() {
                    Some('\'') => {}
                    _ => return Err(syntax_error(line, "unterminated character")),
                }
                tokens.push(Spanned {
                    token: Token::Char(value),
                    line,
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if is_symbol_char(c) {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: classify(&text, line)?,
                    line,
                });
            }
        }
    }
    Ok(tokens)
}

/// Numbers become integer or real tokens; everything else is a symbol.
fn classify(text: &str, line: usize) -> Result<Token> {
    let numeric = {
        let body = text.strip_prefix('-').or_else(|| text.strip_prefix('+')).unwrap_or(text);
        !body.is_empty() && body.chars().next().is_some_and(|c| c.is_ascii_digit())
    };
    if !numeric {
        return Ok(Token::Symbol(text.to_string()));
    }
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| syntax_error(line, &format!("malformed real '{}'", text)))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| syntax_error(line, &format!("malformed integer '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_basic() {
        let tokens = kinds("(const x 42)");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Symbol("const".to_string()),
                Token::Symbol("x".to_string()),
                Token::Int(42),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_string_escapes() {
        let tokens = kinds("\"a\\nb\"");
        assert_eq!(tokens, vec![Token::Str("a\nb".to_string())]);
    }

    #[test]
    fn test_tokenize_comment_and_lines() {
        let spanned = tokenize("# banner\n(x)\n").unwrap();
        assert_eq!(spanned[0].token, Token::LParen);
        assert_eq!(spanned[0].line, 2);
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds("-7"), vec![Token::Int(-7)]);
        assert_eq!(kinds("3.5"), vec![Token::Real(3.5)]);
        // A leading dash without digits is a symbol, not a number.
        assert_eq!(kinds("-"), vec![Token::Symbol("-".to_string())]);
    }

    #[test]
    fn test_unterminated_string_is_syntax_error() {
        assert!(matches!(
            tokenize("\"oops"),
            Err(EngineError::SyntaxError(_))
        ));
    }
}
