//! An in-memory mixed-integer linear program.
//!
//! The builder adds columns and rows here, addressed by [`VariableKey`] and [`ConstraintKey`]. The
//! program is solver-independent: a [`Solver`](crate::solver::Solver) translates it into whatever
//! representation its backend needs. Once built, it is only ever read.
use super::keys::{ConstraintKey, VariableKey};
use indexmap::IndexMap;
use indexmap::map::Entry;

/// The index of a column in a [`Program`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub usize);

/// A decision variable
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Objective coefficient
    pub cost: f64,
    /// Lower bound
    pub lower: f64,
    /// Upper bound (may be infinite)
    pub upper: f64,
    /// Whether the variable must take an integer value
    pub integer: bool,
}

/// A linear constraint `lower <= Σ coeff · x <= upper`
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// What the constraint represents
    pub key: ConstraintKey,
    /// Lower bound (may be `-inf`)
    pub lower: f64,
    /// Upper bound (may be `inf`)
    pub upper: f64,
    /// Non-zero coefficients, one per column
    pub terms: Vec<(ColumnId, f64)>,
}

/// A minimisation program with continuous and binary columns
#[derive(Clone, Debug, Default)]
pub struct Program {
    columns: IndexMap<VariableKey, Column>,
    rows: Vec<Row>,
}

impl Program {
    fn add_column(&mut self, key: VariableKey, column: Column) -> ColumnId {
        let id = ColumnId(self.columns.len());
        match self.columns.entry(key) {
            Entry::Occupied(entry) => panic!("Duplicate entry for variable {}", entry.key()),
            Entry::Vacant(entry) => {
                entry.insert(column);
            }
        }

        id
    }

    /// Add a continuous column with the given bounds and no objective cost
    pub fn add_continuous(&mut self, key: VariableKey, lower: f64, upper: f64) -> ColumnId {
        self.add_column(
            key,
            Column {
                cost: 0.0,
                lower,
                upper,
                integer: false,
            },
        )
    }

    /// Add a binary column with no objective cost
    pub fn add_binary(&mut self, key: VariableKey) -> ColumnId {
        self.add_column(
            key,
            Column {
                cost: 0.0,
                lower: 0.0,
                upper: 1.0,
                integer: true,
            },
        )
    }

    /// Get the column for the given key.
    ///
    /// # Panics
    ///
    /// If the program has no such column. The builder only asks for columns it has added.
    pub fn col(&self, key: &VariableKey) -> ColumnId {
        self.column_id(key)
            .unwrap_or_else(|| panic!("No variable found for {key}"))
    }

    /// Get the column for the given key, if it exists
    pub fn column_id(&self, key: &VariableKey) -> Option<ColumnId> {
        self.columns.get_index_of(key).map(ColumnId)
    }

    /// Add to a column's objective coefficient.
    ///
    /// # Panics
    ///
    /// If the column is not part of this program.
    pub fn add_cost(&mut self, column: ColumnId, cost: f64) {
        let (_, col) = self
            .columns
            .get_index_mut(column.0)
            .expect("Column is not part of the program");
        col.cost += cost;
    }

    /// Add a row with the given bounds.
    ///
    /// Repeated columns are merged and zero coefficients dropped.
    pub fn add_row<I>(&mut self, key: ConstraintKey, lower: f64, upper: f64, terms: I)
    where
        I: IntoIterator<Item = (ColumnId, f64)>,
    {
        let mut merged: IndexMap<ColumnId, f64> = IndexMap::new();
        for (column, coeff) in terms {
            *merged.entry(column).or_default() += coeff;
        }
        let terms = merged
            .into_iter()
            .filter(|(_, coeff)| *coeff != 0.0)
            .collect();

        self.rows.push(Row {
            key,
            lower,
            upper,
            terms,
        });
    }

    /// Add a row `Σ terms <= rhs`
    pub fn add_le<I>(&mut self, key: ConstraintKey, terms: I, rhs: f64)
    where
        I: IntoIterator<Item = (ColumnId, f64)>,
    {
        self.add_row(key, f64::NEG_INFINITY, rhs, terms);
    }

    /// Add a row `Σ terms >= rhs`
    pub fn add_ge<I>(&mut self, key: ConstraintKey, terms: I, rhs: f64)
    where
        I: IntoIterator<Item = (ColumnId, f64)>,
    {
        self.add_row(key, rhs, f64::INFINITY, terms);
    }

    /// Add a row `Σ terms = rhs`
    pub fn add_eq<I>(&mut self, key: ConstraintKey, terms: I, rhs: f64)
    where
        I: IntoIterator<Item = (ColumnId, f64)>,
    {
        self.add_row(key, rhs, rhs, terms);
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Iterate over the columns, in index order
    pub fn columns(&self) -> impl Iterator<Item = (ColumnId, &VariableKey, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, (key, column))| (ColumnId(idx), key, column))
    }

    /// Get a column by index
    pub fn column(&self, column: ColumnId) -> (&VariableKey, &Column) {
        self.columns
            .get_index(column.0)
            .expect("Column index out of range")
    }

    /// The rows of the program
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The objective value of the given column values
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.columns
            .values()
            .zip(values)
            .map(|(column, value)| column.cost * value)
            .sum()
    }

    /// The value of a row's linear expression for the given column values
    pub fn row_activity(row: &Row, values: &[f64]) -> f64 {
        row.terms
            .iter()
            .map(|(column, coeff)| coeff * values[column.0])
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::keys::ConstraintKind;

    fn capacity(id: &str) -> VariableKey {
        VariableKey::Capacity(id.into())
    }

    #[test]
    fn test_add_columns() {
        let mut program = Program::default();
        let pv = program.add_continuous(capacity("pv"), 0.0, 100.0);
        let build = program.add_binary(VariableKey::Build("pv".into()));
        assert_eq!(pv, ColumnId(0));
        assert_eq!(build, ColumnId(1));
        assert_eq!(program.col(&capacity("pv")), pv);
        assert!(program.column_id(&capacity("wind")).is_none());
        assert!(program.column(build).1.integer);
    }

    #[test]
    #[should_panic(expected = "Duplicate entry for variable capacity[pv]")]
    fn test_add_duplicate_column() {
        let mut program = Program::default();
        program.add_continuous(capacity("pv"), 0.0, 100.0);
        program.add_continuous(capacity("pv"), 0.0, 100.0);
    }

    #[test]
    fn test_add_row_merges_terms() {
        let mut program = Program::default();
        let x = program.add_continuous(capacity("a"), 0.0, 1.0);
        let y = program.add_continuous(capacity("b"), 0.0, 1.0);
        let key = ConstraintKey::global(ConstraintKind::EmissionCap);
        program.add_le(key, [(x, 1.0), (y, 2.0), (x, 0.5), (y, -2.0)], 3.0);

        let row = &program.rows()[0];
        assert_eq!(row.terms, [(x, 1.5)]);
        assert_eq!(row.lower, f64::NEG_INFINITY);
        assert_eq!(row.upper, 3.0);
        assert_eq!(Program::row_activity(row, &[2.0, 7.0]), 3.0);
    }

    #[test]
    fn test_objective_value() {
        let mut program = Program::default();
        let x = program.add_continuous(capacity("a"), 0.0, 1.0);
        let y = program.add_continuous(capacity("b"), 0.0, 1.0);
        program.add_cost(x, 2.0);
        program.add_cost(y, -1.0);
        program.add_cost(x, 1.0);
        assert_eq!(program.objective_value(&[1.0, 4.0]), -1.0);
    }

    #[test]
    #[should_panic(expected = "Column is not part of the program")]
    fn test_add_cost_unknown_column() {
        let mut program = Program::default();
        program.add_continuous(capacity("a"), 0.0, 1.0);
        program.add_cost(ColumnId(1), 1.0);
    }
}
