//! The form reader.
//!
//! Turns token streams into engine forms. The reserved words `nil`,
//! `true` and `false` read as literals; every other bare word reads as a
//! symbol to be resolved at evaluation time.

use afnix_engine::error::{EngineError, Result};
use afnix_engine::eval::reader::FormReader;
use afnix_engine::types::form::Form;
use afnix_engine::types::object::Value;
use afnix_engine::utils::quark::Quark;

use crate::lexer::{tokenize, Spanned, Token};

pub struct SexprReader;

impl SexprReader {
    pub fn new() -> SexprReader {
        SexprReader
    }
}

impl Default for SexprReader {
    fn default() -> Self {
        SexprReader::new()
    }
}

fn word_form(text: &str) -> Form {
    match text {
        "nil" => Form::Literal(Value::Nil),
        "true" => Form::Literal(Value::Bool(true)),
        "false" => Form::Literal(Value::Bool(false)),
        _ => Form::Symbol(Quark::intern(text)),
    }
}

fn read_form(tokens: &[Spanned], index: &mut usize) -> Result<Form> {
    let spanned = tokens.get(*index).ok_or_else(|| {
        EngineError::SyntaxError("unexpected end of input".to_string())
    })?;
    *index += 1;
    match &spanned.token {
        Token::Int(i) => Ok(Form::Literal(Value::Int(*i))),
        Token::Real(r) => Ok(Form::Literal(Value::Real(*r))),
        Token::Str(s) => Ok(Form::Literal(Value::String(s.as_str().into()))),
        Token::Char(c) => Ok(Form::Literal(Value::Char(*c))),
        Token::Symbol(text) => Ok(word_form(text)),
        Token::LParen => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*index) {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => {
                        *index += 1;
                        return Ok(Form::List(items));
                    }
                    Some(_) => items.push(read_form(tokens, index)?),
                    None => {
                        return Err(EngineError::SyntaxError(format!(
                            "line {}: unbalanced form, missing ')'",
                            spanned.line
                        )))
                    }
                }
            }
        }
        Token::RParen => Err(EngineError::SyntaxError(format!(
            "line {}: unexpected ')'",
            spanned.line
        ))),
    }
}

impl FormReader for SexprReader {
    fn read_all(&self, source: &str) -> Result<Vec<Form>> {
        let tokens = tokenize(source)?;
        let mut forms = Vec::new();
        let mut index = 0;
        while index < tokens.len() {
            forms.push(read_form(&tokens, &mut index)?);
        }
        log::debug!("read {} top-level form(s)", forms.len());
        Ok(forms)
    }
}
