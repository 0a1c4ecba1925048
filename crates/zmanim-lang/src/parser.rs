//! Parser: formula string → `ExprDef`.
//! Uses LALRPOP-generated grammar with custom lexer (Ident vs FuncIdent for calls).

use crate::error::CompileError;
use crate::ir::ExprDef;
use crate::lexer::{self, LexError, Tok};
use lalrpop_util::{lalrpop_mod, ParseError};

lalrpop_mod!(
    #[allow(clippy::ptr_arg)]
    #[allow(clippy::empty_line_after_outer_attr)]
    #[allow(clippy::uninlined_format_args)]
    #[allow(clippy::type_complexity)]
    #[allow(dead_code)]
    #[allow(unused_imports)]
    formula
);

/// Parse a single formula without resolving any names.
pub fn parse(input: &str) -> Result<ExprDef, CompileError> {
    let lexer = lexer::Lexer::new(input);
    formula::FormulaParser::new()
        .parse(lexer)
        .map_err(convert_error)
}

fn expected_list(expected: &[String]) -> String {
    match expected {
        [] => String::new(),
        [one] => format!("; expected {one}"),
        many => format!("; expected one of {}", many.join(", ")),
    }
}

fn convert_error(e: ParseError<usize, Tok, LexError>) -> CompileError {
    match e {
        ParseError::User { error } => CompileError::Lex(error),
        ParseError::InvalidToken { location } => CompileError::Parse {
            offset: location,
            message: "invalid token".into(),
        },
        ParseError::UnrecognizedEof { location, expected } => CompileError::Parse {
            offset: location,
            message: format!("unexpected end of formula{}", expected_list(&expected)),
        },
        ParseError::UnrecognizedToken {
            token: (start, tok, _),
            expected,
        } => CompileError::Parse {
            offset: start,
            message: format!("unexpected {}{}", tok.describe(), expected_list(&expected)),
        },
        ParseError::ExtraToken {
            token: (start, tok, _),
        } => CompileError::Parse {
            offset: start,
            message: format!("unexpected trailing {}", tok.describe()),
        },
    }
}
