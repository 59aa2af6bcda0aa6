//! In-band value errors produced by formula evaluation.
//!
//! These are not `std::error::Error` implementors: they flow through
//! `Ast::eval` like any other value and are rendered as sentinel strings,
//! not raised as exceptions a caller recovers from.

use std::fmt;

/// One of the three value-error sentinels a formula can evaluate to.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ValueError {
    /// A reference points outside the valid grid range.
    Ref,
    /// An operand could not be interpreted as a number.
    Value,
    /// Arithmetic produced a non-finite result (division by zero, overflow).
    Div0,
}

impl ValueError {
    /// The sentinel string this error renders as in printed output.
    pub fn sentinel(&self) -> &'static str {
        match self {
            ValueError::Ref => "#REF!",
            ValueError::Value => "#VALUE!",
            ValueError::Div0 => "#DIV/0!",
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sentinel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_match_spec_strings() {
        assert_eq!(ValueError::Ref.sentinel(), "#REF!");
        assert_eq!(ValueError::Value.sentinel(), "#VALUE!");
        assert_eq!(ValueError::Div0.sentinel(), "#DIV/0!");
    }
}
