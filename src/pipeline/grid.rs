//! Table model behind the filter and sort surface
//!
//! The full row set is kept untouched; filtering and sorting only rearrange a
//! list of indices into it.

use std::collections::HashMap;

use crate::error::GridError;

pub type Row = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn toggled(self) -> SortDirection {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GridModel {
    columns: Vec<String>,
    rows: Vec<Row>,
    visible: Vec<usize>,
    filter: String,
    /// Direction the next sort on each column will use
    next_sort: HashMap<String, SortDirection>,
}

impl GridModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace columns and rows; resets filter and sort state.
    pub fn populate(&mut self, columns: Vec<String>, rows: Vec<Row>) -> Result<(), GridError> {
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
            .map(|(i, r)| (i, r.len()))
        {
            return Err(GridError::ArityMismatch {
                row,
                expected: columns.len(),
                found,
            });
        }

        self.next_sort = columns
            .iter()
            .map(|c| (c.clone(), SortDirection::Ascending))
            .collect();
        self.visible = (0..rows.len()).collect();
        self.columns = columns;
        self.rows = rows;
        self.filter.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = GridModel::default();
    }

    /// Show rows with any cell containing `term`, case-insensitively, in
    /// document order. An empty term shows everything.
    pub fn filter(&mut self, term: &str) {
        self.filter = term.to_string();
        let needle = term.to_lowercase();
        self.visible = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                needle.is_empty() || row.iter().any(|cell| cell.to_lowercase().contains(&needle))
            })
            .map(|(i, _)| i)
            .collect();
    }

    /// Sort the visible rows by `column` and flip that column's direction for
    /// the next call. Returns the direction that was applied.
    pub fn sort_by_column(&mut self, column: &str) -> Result<SortDirection, GridError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| GridError::UnknownColumn(column.to_string()))?;

        let direction = self
            .next_sort
            .get(column)
            .copied()
            .unwrap_or(SortDirection::Ascending);

        let numbers: Option<Vec<f64>> = self
            .visible
            .iter()
            .map(|&i| parse_number(&self.rows[i][idx]))
            .collect();

        match numbers {
            Some(numbers) => {
                let mut keyed: Vec<(f64, usize)> = numbers.into_iter().zip(self.visible.iter().copied()).collect();
                keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
                self.visible = keyed.into_iter().map(|(_, i)| i).collect();
            }
            None => {
                let mut keyed: Vec<(String, usize)> = self
                    .visible
                    .iter()
                    .map(|&i| (self.rows[i][idx].to_lowercase(), i))
                    .collect();
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
                self.visible = keyed.into_iter().map(|(_, i)| i).collect();
            }
        }

        if direction == SortDirection::Descending {
            self.visible.reverse();
        }

        self.next_sort.insert(column.to_string(), direction.toggled());
        Ok(direction)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in current display order
    pub fn visible_rows(&self) -> Vec<&Row> {
        self.visible.iter().map(|&i| &self.rows[i]).collect()
    }

    /// Unfiltered rows in document order
    pub fn all_rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn filter_term(&self) -> &str {
        &self.filter
    }

    pub fn next_sort_direction(&self, column: &str) -> Option<SortDirection> {
        self.next_sort.get(column).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Empty cells count as zero
fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(0.0);
    }
    cell.parse::<f64>().ok()
}
