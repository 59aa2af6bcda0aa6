//! The sheet engine: sparse cell store, text dispatch, and printable
//! rendering, orchestrating the dependency graph and formula AST.

use std::collections::HashMap;

use latticecalc_engine::{
    DependencyGraph, MAX_COLS, MAX_ROWS, Position, RewriteEffect, SheetView, Size, ValueError,
    parse,
};

use crate::cell::{Cell, Value};
use crate::error::{Result as SheetResult, SheetError};

/// The top-level spreadsheet container.
#[derive(Default)]
pub struct Sheet {
    cells: HashMap<Position, Cell>,
    graph: DependencyGraph,
    size: Size,
}

impl Sheet {
    pub fn new() -> Sheet {
        Sheet::default()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// A read-only handle to the cell at `pos`, or `None` if no cell has
    /// been written there (regardless of whether other formulas reference
    /// it as a placeholder).
    pub fn get_cell(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    /// The cell's current computed value, recomputing and caching formula
    /// results as needed.
    pub fn get_value(&mut self, pos: Position) -> Value {
        match self.cells.get(&pos) {
            None => Value::Text(String::new()),
            Some(Cell::Plain { raw }) => Cell::plain_value(raw),
            Some(Cell::Formula { .. }) => match self.eval_formula_cached(pos) {
                Ok(n) => Value::Number(n),
                Err(e) => Value::Error(e),
            },
        }
    }

    /// Write `text` into the cell at `pos`. No-op if the trimmed text
    /// equals the existing cell's source text (whitespace-insensitive
    /// inside formulas only).
    pub fn set_cell(&mut self, pos: Position, text: &str) -> SheetResult<()> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        let trimmed = text.trim();
        if Self::texts_equivalent(self.cells.get(&pos), trimmed) {
            return Ok(());
        }

        let new_cell = Cell::from_input(trimmed)?;

        match new_cell.ast() {
            Some(ast) => {
                let refs = ast.referenced();
                self.graph
                    .try_install(pos, &refs)
                    .map_err(|_| SheetError::CircularDependency)?;
            }
            None => {
                // Not a formula: drop any out-edges it previously held.
                self.graph.try_install(pos, &[]).expect("clearing edges cannot cycle");
            }
        }

        self.cells.insert(pos, new_cell);
        self.graph.invalidate_dependents(pos);
        self.size.rows = self.size.rows.max(pos.row + 1);
        self.size.cols = self.size.cols.max(pos.col + 1);
        Ok(())
    }

    /// Remove the cell at `pos`. No-op if no cell exists there.
    pub fn clear_cell(&mut self, pos: Position) -> SheetResult<()> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        if self.cells.remove(&pos).is_none() {
            return Ok(());
        }
        self.graph.remove(pos);
        self.graph.invalidate_dependents(pos);
        if pos.row + 1 == self.size.rows || pos.col + 1 == self.size.cols {
            self.recompute_size();
        }
        Ok(())
    }

    pub fn insert_rows(&mut self, before: usize, count: usize) -> SheetResult<()> {
        if count == 0 {
            return Ok(());
        }
        if self.positions_overflow(|p| p.row >= before, |p| p.row + count >= MAX_ROWS) {
            return Err(SheetError::TableTooBig);
        }

        let old_cells: Vec<(Position, Cell)> = std::mem::take(&mut self.cells).into_iter().collect();
        for (pos, cell) in old_cells {
            let new_pos = if pos.row >= before {
                Position::new(pos.row + count, pos.col)
            } else {
                pos
            };
            self.cells.insert(new_pos, cell);
        }
        self.graph.shift_rows(before, count);
        self.rewrite_formulas(|ast| ast.insert_rows(before, count));
        self.recompute_size();
        Ok(())
    }

    pub fn insert_cols(&mut self, before: usize, count: usize) -> SheetResult<()> {
        if count == 0 {
            return Ok(());
        }
        if self.positions_overflow(|p| p.col >= before, |p| p.col + count >= MAX_COLS) {
            return Err(SheetError::TableTooBig);
        }

        let old_cells: Vec<(Position, Cell)> = std::mem::take(&mut self.cells).into_iter().collect();
        for (pos, cell) in old_cells {
            let new_pos = if pos.col >= before {
                Position::new(pos.row, pos.col + count)
            } else {
                pos
            };
            self.cells.insert(new_pos, cell);
        }
        self.graph.shift_cols(before, count);
        self.rewrite_formulas(|ast| ast.insert_cols(before, count));
        self.recompute_size();
        Ok(())
    }

    pub fn delete_rows(&mut self, first: usize, count: usize) -> SheetResult<()> {
        if self.cells.is_empty() || count == 0 {
            return Ok(());
        }
        self.destroy_range(|p| p.row >= first && p.row < first + count);
        self.rewrite_formulas(|ast| ast.delete_rows(first, count));

        let old_cells: Vec<(Position, Cell)> = std::mem::take(&mut self.cells).into_iter().collect();
        for (pos, cell) in old_cells {
            let new_pos = if pos.row >= first + count {
                Position::new(pos.row - count, pos.col)
            } else {
                pos
            };
            self.cells.insert(new_pos, cell);
        }
        self.graph.delete_row_range(first, count);
        self.recompute_size();
        Ok(())
    }

    pub fn delete_cols(&mut self, first: usize, count: usize) -> SheetResult<()> {
        if self.cells.is_empty() || count == 0 {
            return Ok(());
        }
        self.destroy_range(|p| p.col >= first && p.col < first + count);
        self.rewrite_formulas(|ast| ast.delete_cols(first, count));

        let old_cells: Vec<(Position, Cell)> = std::mem::take(&mut self.cells).into_iter().collect();
        for (pos, cell) in old_cells {
            let new_pos = if pos.col >= first + count {
                Position::new(pos.row, pos.col - count)
            } else {
                pos
            };
            self.cells.insert(new_pos, cell);
        }
        self.graph.delete_col_range(first, count);
        self.recompute_size();
        Ok(())
    }

    /// Rows of tab-separated values, one per printable row, numbers in
    /// shortest round-trip decimal form, errors as their sentinel strings.
    pub fn print_values(&mut self) -> String {
        if self.size.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        for row in 0..self.size.rows {
            for col in 0..self.size.cols {
                if col > 0 {
                    out.push('\t');
                }
                match self.get_value(Position::new(row, col)) {
                    Value::Number(n) => out.push_str(&format!("{}", n)),
                    Value::Text(t) => out.push_str(&t),
                    Value::Error(e) => out.push_str(e.sentinel()),
                }
            }
            out.push('\n');
        }
        out
    }

    /// Rows of tab-separated source text (formula cells prefixed `=`).
    pub fn print_texts(&self) -> String {
        if self.size.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        for row in 0..self.size.rows {
            for col in 0..self.size.cols {
                if col > 0 {
                    out.push('\t');
                }
                if let Some(cell) = self.cells.get(&Position::new(row, col)) {
                    out.push_str(&cell.source_text());
                }
            }
            out.push('\n');
        }
        out
    }

    fn texts_equivalent(existing: Option<&Cell>, trimmed: &str) -> bool {
        match existing {
            None => false,
            Some(Cell::Plain { raw }) => raw.trim() == trimmed,
            Some(Cell::Formula { ast, .. }) => {
                if !(trimmed.starts_with('=') && trimmed.len() >= 2) {
                    return false;
                }
                match parse(&trimmed[1..]) {
                    Ok(new_ast) => new_ast.render() == ast.render(),
                    Err(_) => false,
                }
            }
        }
    }

    fn eval_formula_cached(&mut self, pos: Position) -> Result<f64, ValueError> {
        let stale = self.graph.is_stale(pos);
        if !stale {
            if let Some(v) = self.cells.get(&pos).and_then(Cell::cached) {
                return v;
            }
        }
        let ast = match self.cells.get(&pos) {
            Some(cell) => match cell.ast() {
                Some(ast) => ast.clone(),
                None => return Ok(0.0),
            },
            None => return Ok(0.0),
        };
        let result = ast.eval(self);
        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.set_cached(result.clone());
        }
        self.graph.clear_stale(pos);
        result
    }

    fn rewrite_formulas(&mut self, f: impl Fn(&mut latticecalc_engine::Ast) -> RewriteEffect) {
        let positions: Vec<Position> = self.cells.keys().copied().collect();
        let mut changed = Vec::new();
        for pos in positions {
            if let Some(cell) = self.cells.get_mut(&pos) {
                if let Some(ast) = cell.ast_mut() {
                    let effect = f(ast);
                    if !matches!(effect, RewriteEffect::NothingChanged) {
                        cell.invalidate_cache();
                        changed.push(pos);
                    }
                }
            }
        }
        for pos in changed {
            self.graph.invalidate_dependents(pos);
        }
    }

    fn destroy_range(&mut self, in_range: impl Fn(&Position) -> bool) {
        let doomed: Vec<Position> = self.cells.keys().filter(|p| in_range(p)).copied().collect();
        for pos in doomed {
            self.cells.remove(&pos);
            self.graph.remove(pos);
            self.graph.invalidate_dependents(pos);
        }
    }

    fn positions_overflow(
        &self,
        affected: impl Fn(&Position) -> bool,
        would_overflow: impl Fn(&Position) -> bool,
    ) -> bool {
        self.cells.keys().any(|p| affected(p) && would_overflow(p))
            || self.graph.positions().any(|p| affected(&p) && would_overflow(&p))
    }

    fn recompute_size(&mut self) {
        let mut max_row = None;
        let mut max_col = None;
        for pos in self.cells.keys() {
            max_row = Some(max_row.map_or(pos.row, |m: usize| m.max(pos.row)));
            max_col = Some(max_col.map_or(pos.col, |m: usize| m.max(pos.col)));
        }
        self.size = match (max_row, max_col) {
            (Some(r), Some(c)) => Size::new(r + 1, c + 1),
            _ => Size::new(0, 0),
        };
    }
}

impl SheetView for Sheet {
    fn resolve(&mut self, pos: Position) -> Result<f64, ValueError> {
        if !pos.is_valid() {
            return Err(ValueError::Ref);
        }
        match self.cells.get(&pos) {
            None => Ok(0.0),
            Some(Cell::Plain { raw }) => match Cell::plain_value(raw) {
                Value::Number(n) => Ok(n),
                Value::Text(_) => Err(ValueError::Value),
                Value::Error(e) => Err(e),
            },
            Some(Cell::Formula { .. }) => self.eval_formula_cached(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(a1: &str) -> Position {
        Position::parse(a1).unwrap()
    }

    #[test]
    fn plain_arithmetic() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=1+2*3").unwrap();
        match sheet.get_value(pos("A1")) {
            Value::Number(n) => assert_eq!(n, 7.0),
            _ => panic!("expected number"),
        }
        assert_eq!(sheet.get_cell(pos("A1")).unwrap().source_text(), "=1+2*3");
    }

    #[test]
    fn reference_chain_recomputes_on_input_change() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "1").unwrap();
        sheet.set_cell(pos("A2"), "=A1+1").unwrap();
        sheet.set_cell(pos("A3"), "=A2+A1").unwrap();

        let v = |s: &mut Sheet, p: &str| match s.get_value(pos(p)) {
            Value::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        };
        assert_eq!(v(&mut sheet, "A1"), 1.0);
        assert_eq!(v(&mut sheet, "A2"), 2.0);
        assert_eq!(v(&mut sheet, "A3"), 3.0);

        sheet.set_cell(pos("A1"), "10").unwrap();
        assert_eq!(v(&mut sheet, "A1"), 10.0);
        assert_eq!(v(&mut sheet, "A2"), 11.0);
        assert_eq!(v(&mut sheet, "A3"), 21.0);
    }

    #[test]
    fn cycle_is_rejected_and_sheet_unchanged() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=A2").unwrap();
        let err = sheet.set_cell(pos("A2"), "=A1").unwrap_err();
        assert_eq!(err, SheetError::CircularDependency);
        assert!(sheet.get_cell(pos("A2")).is_none());
        match sheet.get_value(pos("A1")) {
            Value::Number(n) => assert_eq!(n, 0.0),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn canonical_parentheses_round_trip() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=(1+2)*3").unwrap();
        sheet.set_cell(pos("A2"), "=1+(2*3)").unwrap();
        sheet.set_cell(pos("A3"), "=1-(2-3)").unwrap();
        sheet.set_cell(pos("A4"), "=1-(2+3)").unwrap();

        assert_eq!(sheet.get_cell(pos("A1")).unwrap().source_text(), "=(1+2)*3");
        assert_eq!(sheet.get_cell(pos("A2")).unwrap().source_text(), "=1+2*3");
        assert_eq!(sheet.get_cell(pos("A3")).unwrap().source_text(), "=1-(2-3)");
        assert_eq!(sheet.get_cell(pos("A4")).unwrap().source_text(), "=1-(2+3)");
    }

    #[test]
    fn row_insertion_shifts_references() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=B3").unwrap();
        sheet.insert_rows(1, 2).unwrap();
        assert_eq!(sheet.get_cell(pos("A1")).unwrap().source_text(), "=B5");
    }

    #[test]
    fn deletion_annihilates_references() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=B1+C1").unwrap();
        sheet.delete_cols(1, 1).unwrap();
        assert_eq!(sheet.get_cell(pos("A1")).unwrap().source_text(), "=#REF!+B1");
        match sheet.get_value(pos("A1")) {
            Value::Error(ValueError::Ref) => {}
            other => panic!("expected Ref error, got {:?}", other),
        }
    }

    #[test]
    fn printable_size_shrinks_when_frontier_cleared() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("C3"), "x").unwrap();
        assert_eq!(sheet.size(), Size::new(3, 3));
        sheet.clear_cell(pos("C3")).unwrap();
        assert_eq!(sheet.size(), Size::new(0, 0));
    }

    #[test]
    fn invalid_position_is_rejected() {
        let mut sheet = Sheet::new();
        let bad = Position::new(MAX_ROWS, 0);
        assert_eq!(sheet.set_cell(bad, "1").unwrap_err(), SheetError::InvalidPosition);
        assert_eq!(sheet.clear_cell(bad).unwrap_err(), SheetError::InvalidPosition);
    }

    #[test]
    fn whitespace_insensitive_noop_inside_formula() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "=1+2*3").unwrap();
        sheet.set_cell(pos("A1"), "  =1 + 2 * 3  ").unwrap();
        assert_eq!(sheet.get_cell(pos("A1")).unwrap().source_text(), "=1+2*3");
    }

    #[test]
    fn print_values_renders_tab_separated_grid() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos("A1"), "1").unwrap();
        sheet.set_cell(pos("B1"), "hello").unwrap();
        assert_eq!(sheet.print_values(), "1\thello\n");
    }

    #[test]
    fn empty_sheet_prints_nothing() {
        let mut sheet = Sheet::new();
        assert_eq!(sheet.print_values(), "");
        assert_eq!(sheet.print_texts(), "");
    }
}
