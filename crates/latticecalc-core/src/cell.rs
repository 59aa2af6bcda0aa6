//! Cell data: the `Plain` / `Formula` tagged sum and its value computation.

use latticecalc_engine::{Ast, ValueError, parse};

use crate::error::SheetError;

/// A cell's computed value, independent of how it was produced.
#[derive(Clone, Debug)]
pub enum Value {
    Number(f64),
    Text(String),
    Error(ValueError),
}

/// A cell in the spreadsheet.
#[derive(Clone, Debug)]
pub enum Cell {
    /// Literal text or a number, as entered (escape character retained).
    Plain { raw: String },
    /// A formula, its parsed AST and its lazily-evaluated cached value.
    Formula { ast: Ast, cached: Option<Result<f64, ValueError>> },
}

impl Cell {
    /// Classify user-entered text into a new cell. Fails only when the
    /// text starts a formula (`=`, length >= 2) that does not parse.
    pub fn from_input(text: &str) -> Result<Cell, SheetError> {
        if text.starts_with('=') && text.len() >= 2 {
            let ast =
                parse(&text[1..]).map_err(|e| SheetError::FormulaSyntax(e.to_string()))?;
            return Ok(Cell::Formula { ast, cached: None });
        }
        Ok(Cell::Plain { raw: text.to_string() })
    }

    /// The cell's source text, as it would be re-entered (`=` prefix for
    /// formulas; escape character retained for plain text).
    pub fn source_text(&self) -> String {
        match self {
            Cell::Plain { raw } => raw.clone(),
            Cell::Formula { ast, .. } => format!("={}", ast.render()),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Cell::Formula { .. })
    }

    pub fn ast(&self) -> Option<&Ast> {
        match self {
            Cell::Formula { ast, .. } => Some(ast),
            Cell::Plain { .. } => None,
        }
    }

    pub fn ast_mut(&mut self) -> Option<&mut Ast> {
        match self {
            Cell::Formula { ast, .. } => Some(ast),
            Cell::Plain { .. } => None,
        }
    }

    pub fn invalidate_cache(&mut self) {
        if let Cell::Formula { cached, .. } = self {
            *cached = None;
        }
    }

    pub fn cached(&self) -> Option<Result<f64, ValueError>> {
        match self {
            Cell::Formula { cached, .. } => cached.clone(),
            Cell::Plain { .. } => None,
        }
    }

    pub fn set_cached(&mut self, value: Result<f64, ValueError>) {
        if let Cell::Formula { cached, .. } = self {
            *cached = Some(value);
        }
    }

    /// The plain numeric/text value described by spec: strip an optional
    /// leading escape character, then try a decimal parse.
    pub fn plain_value(raw: &str) -> Value {
        let stripped = raw.strip_prefix('\'').unwrap_or(raw);
        match stripped.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Text(stripped.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numeric_text_parses_as_number() {
        match Cell::plain_value("42") {
            Value::Number(n) => assert_eq!(n, 42.0),
            _ => panic!("expected number"),
        }
    }

    #[test]
    fn escaped_leading_equals_is_kept_as_text() {
        let cell = Cell::from_input("'=1+1").unwrap();
        match cell {
            Cell::Plain { raw } => {
                assert_eq!(raw, "'=1+1");
                match Cell::plain_value(&raw) {
                    Value::Text(t) => assert_eq!(t, "=1+1"),
                    _ => panic!("expected text"),
                }
            }
            _ => panic!("expected plain cell"),
        }
    }

    #[test]
    fn single_equals_sign_is_not_a_formula() {
        // length < 2, so classification falls through to plain text.
        let cell = Cell::from_input("=").unwrap();
        assert!(!cell.is_formula());
    }

    #[test]
    fn formula_text_round_trips_through_source_text() {
        let cell = Cell::from_input("=1+2*3").unwrap();
        assert_eq!(cell.source_text(), "=1+2*3");
    }

    #[test]
    fn invalid_formula_syntax_is_rejected() {
        assert!(Cell::from_input("=1+").is_err());
    }
}
