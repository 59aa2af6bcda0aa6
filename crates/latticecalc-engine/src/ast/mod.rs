//! Formula expression trees.
//!
//! Evaluation, canonical rendering and reference rewriting under row/column
//! insertion and deletion for the closed four-operator arithmetic grammar
//! (`+ - * /`, unary sign, cell references, numeric literals).

pub mod parser;

use crate::position::Position;
use crate::value_error::ValueError;

pub use parser::{ParseError, parse};

/// A cell-value lookup the AST evaluates references against. Implemented
/// by the sheet's own cell store; kept as a trait here so this crate has no
/// dependency on the cell/sheet types.
pub trait SheetView {
    /// Resolve the current numeric value of the cell at `pos`. An absent
    /// cell within the valid grid range resolves to `0.0`.
    fn resolve(&mut self, pos: Position) -> Result<f64, ValueError>;
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn symbol(&self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }

    fn op_tag(&self) -> OpTag {
        match self {
            BinOp::Add => OpTag::Add,
            BinOp::Sub => OpTag::Sub,
            BinOp::Mul => OpTag::Mul,
            BinOp::Div => OpTag::Div,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnOp {
    Plus,
    Minus,
}

impl UnOp {
    fn symbol(&self) -> char {
        match self {
            UnOp::Plus => '+',
            UnOp::Minus => '-',
        }
    }

    fn op_tag(&self) -> OpTag {
        match self {
            UnOp::Plus => OpTag::UnAdd,
            UnOp::Minus => OpTag::UnSub,
        }
    }
}

/// The seven operator classes the parenthesisation table is indexed by.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
enum OpTag {
    Add,
    Sub,
    Mul,
    Div,
    UnAdd,
    UnSub,
    Atom,
}

impl OpTag {
    fn index(&self) -> usize {
        match self {
            OpTag::Add => 0,
            OpTag::Sub => 1,
            OpTag::Mul => 2,
            OpTag::Div => 3,
            OpTag::UnAdd => 4,
            OpTag::UnSub => 5,
            OpTag::Atom => 6,
        }
    }
}

const NONE: u8 = 0b00;
const RIGHT: u8 = 0b01;
const LEFT: u8 = 0b10;
const BOTH: u8 = 0b11;

/// `NEED_PARENS[parent][child]`, a bitmask of which side(s) of `parent`
/// require parenthesisation when that side holds an expression tagged
/// `child`. Rows/cols ordered `[Add, Sub, Mul, Div, UnAdd, UnSub, Atom]`.
#[rustfmt::skip]
const NEED_PARENS: [[u8; 7]; 7] = [
    // Add
    [NONE, NONE, NONE, NONE, NONE, NONE, NONE],
    // Sub
    [RIGHT, RIGHT, NONE, NONE, NONE, NONE, NONE],
    // Mul
    [BOTH, BOTH, NONE, NONE, NONE, NONE, NONE],
    // Div
    [BOTH, BOTH, RIGHT, RIGHT, NONE, NONE, NONE],
    // UnAdd
    [RIGHT, RIGHT, NONE, NONE, NONE, NONE, NONE],
    // UnSub
    [RIGHT, RIGHT, NONE, NONE, NONE, NONE, NONE],
    // Atom (no children; row unused)
    [NONE, NONE, NONE, NONE, NONE, NONE, NONE],
];

fn needs_parens(parent: OpTag, child: OpTag, side: u8) -> bool {
    NEED_PARENS[parent.index()][child.index()] & side != 0
}

/// The result of rewriting an AST's references under a row/column
/// insertion or deletion.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum RewriteEffect {
    /// No reference was touched.
    NothingChanged,
    /// At least one reference shifted; none was annihilated.
    ReferencesRenamedOnly,
    /// At least one reference was annihilated (now points out of range).
    ReferencesChanged,
}

impl RewriteEffect {
    fn combine(self, other: RewriteEffect) -> RewriteEffect {
        use RewriteEffect::*;
        match (self, other) {
            (ReferencesChanged, _) | (_, ReferencesChanged) => ReferencesChanged,
            (ReferencesRenamedOnly, _) | (_, ReferencesRenamedOnly) => ReferencesRenamedOnly,
            (NothingChanged, NothingChanged) => NothingChanged,
        }
    }
}

/// An arithmetic expression tree.
#[derive(Clone, Debug)]
pub enum Ast {
    Literal(f64),
    Reference(Position),
    Unary(UnOp, Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
}

impl Ast {
    fn op_tag(&self) -> OpTag {
        match self {
            Ast::Literal(_) | Ast::Reference(_) => OpTag::Atom,
            Ast::Unary(op, _) => op.op_tag(),
            Ast::Binary(op, _, _) => op.op_tag(),
        }
    }

    /// Evaluate this expression against a sheet view.
    pub fn eval(&self, sheet: &mut dyn SheetView) -> Result<f64, ValueError> {
        match self {
            Ast::Literal(v) => Ok(*v),
            Ast::Reference(pos) => {
                if !pos.is_valid() {
                    return Err(ValueError::Ref);
                }
                sheet.resolve(*pos)
            }
            Ast::Unary(UnOp::Plus, x) => x.eval(sheet),
            Ast::Unary(UnOp::Minus, x) => x.eval(sheet).map(|v| -v),
            Ast::Binary(op, l, r) => {
                let lv = l.eval(sheet);
                let rv = r.eval(sheet);
                let (lv, rv) = match (lv, rv) {
                    (Err(e), _) => return Err(e),
                    (Ok(_), Err(e)) => return Err(e),
                    (Ok(lv), Ok(rv)) => (lv, rv),
                };
                let result = match op {
                    BinOp::Add => lv + rv,
                    BinOp::Sub => lv - rv,
                    BinOp::Mul => lv * rv,
                    BinOp::Div => lv / rv,
                };
                if result.is_finite() {
                    Ok(result)
                } else {
                    Err(ValueError::Div0)
                }
            }
        }
    }

    /// Render this expression as minimally-parenthesised canonical text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Ast::Literal(v) => out.push_str(&format_number(*v)),
            Ast::Reference(pos) => {
                if pos.is_valid() {
                    out.push_str(&pos.format());
                } else {
                    out.push_str("#REF!");
                }
            }
            Ast::Unary(op, child) => {
                out.push(op.symbol());
                render_side(child, op.op_tag(), RIGHT, out);
            }
            Ast::Binary(op, l, r) => {
                render_side(l, op.op_tag(), LEFT, out);
                out.push(op.symbol());
                render_side(r, op.op_tag(), RIGHT, out);
            }
        }
    }

    /// All valid positions this expression references, sorted ascending
    /// with duplicates coalesced.
    pub fn referenced(&self) -> Vec<Position> {
        let mut out = Vec::new();
        self.collect_referenced(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_referenced(&self, out: &mut Vec<Position>) {
        match self {
            Ast::Literal(_) => {}
            Ast::Reference(pos) => {
                if pos.is_valid() {
                    out.push(*pos);
                }
            }
            Ast::Unary(_, child) => child.collect_referenced(out),
            Ast::Binary(_, l, r) => {
                l.collect_referenced(out);
                r.collect_referenced(out);
            }
        }
    }

    pub fn insert_rows(&mut self, before: usize, count: usize) -> RewriteEffect {
        self.rewrite(|pos| {
            if pos.row >= before {
                pos.row += count;
            }
        })
    }

    pub fn insert_cols(&mut self, before: usize, count: usize) -> RewriteEffect {
        self.rewrite(|pos| {
            if pos.col >= before {
                pos.col += count;
            }
        })
    }

    pub fn delete_rows(&mut self, first: usize, count: usize) -> RewriteEffect {
        self.rewrite(|pos| {
            if pos.row >= first && pos.row < first + count {
                pos.row = usize::MAX;
            } else if pos.row >= first + count {
                pos.row -= count;
            }
        })
    }

    pub fn delete_cols(&mut self, first: usize, count: usize) -> RewriteEffect {
        self.rewrite(|pos| {
            if pos.col >= first && pos.col < first + count {
                pos.col = usize::MAX;
            } else if pos.col >= first + count {
                pos.col -= count;
            }
        })
    }

    fn rewrite(&mut self, f: impl Fn(&mut Position) + Copy) -> RewriteEffect {
        match self {
            Ast::Literal(_) => RewriteEffect::NothingChanged,
            Ast::Reference(pos) => {
                let before = *pos;
                f(pos);
                if *pos == before {
                    RewriteEffect::NothingChanged
                } else if pos.is_valid() {
                    RewriteEffect::ReferencesRenamedOnly
                } else {
                    RewriteEffect::ReferencesChanged
                }
            }
            Ast::Unary(_, child) => child.rewrite(f),
            Ast::Binary(_, l, r) => {
                let le = l.rewrite(f);
                let re = r.rewrite(f);
                le.combine(re)
            }
        }
    }
}

fn render_side(child: &Ast, parent: OpTag, side: u8, out: &mut String) {
    if needs_parens(parent, child.op_tag(), side) {
        out.push('(');
        child.render_into(out);
        out.push(')');
    } else {
        child.render_into(out);
    }
}

/// Format a number in its shortest round-trip decimal form (`2.0` -> `"2"`).
fn format_number(v: f64) -> String {
    format!("{}", v)
}
