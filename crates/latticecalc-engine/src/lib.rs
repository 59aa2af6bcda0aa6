//! Formula AST, grid position geometry and dependency graph.
//!
//! This crate has no knowledge of cells or sheets: it provides the pure
//! building blocks — [`Position`]/[`Size`] geometry, the [`ast::Ast`]
//! expression tree, and the [`graph::DependencyGraph`] — that
//! `latticecalc-core` assembles into a spreadsheet.

pub mod ast;
pub mod graph;
pub mod position;
pub mod value_error;

pub use ast::{Ast, BinOp, ParseError, RewriteEffect, SheetView, UnOp, parse};
pub use graph::{CycleDetected, DependencyGraph};
pub use position::{MAX_COLS, MAX_ROWS, Position, Size};
pub use value_error::ValueError;
