//! Cell grid model and record materialization.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::SpreadError;
use crate::keys::SpecColumnKeys;
use crate::spec::{EnumCellValue, SpecSpreadReport};
use crate::value::EnumValue;

////////////////////////////////////////////////////////////////////////////////
// #region CellReference

/// Spreadsheet column label for a zero-based column index (0 -> `A`, 26 -> `AA`).
pub fn column_label(n_idx_col: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n = n_idx_col as i64;
    while n >= 0 {
        l_chars.push((b'A' + (n % 26) as u8) as char);
        n = n / 26 - 1;
    }
    l_chars.iter().rev().collect()
}

/// Parse an A1-style reference into zero-based `(row, col)`.
pub fn parse_cell_ref(cell_ref: &str) -> Result<(usize, usize), SpreadError> {
    let c_ref = cell_ref.trim();
    let n_len_letters = c_ref
        .chars()
        .take_while(|chr| chr.is_ascii_alphabetic())
        .count();
    let (c_letters, c_digits) = c_ref.split_at(n_len_letters);

    if c_letters.is_empty()
        || c_digits.is_empty()
        || !c_digits.chars().all(|chr| chr.is_ascii_digit())
    {
        return Err(SpreadError::InvalidCellRef(cell_ref.to_string()));
    }

    let mut n_col = 0usize;
    for chr in c_letters.chars() {
        let n_digit = (chr.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n_col = n_col
            .checked_mul(26)
            .and_then(|val| val.checked_add(n_digit))
            .ok_or_else(|| SpreadError::InvalidCellRef(cell_ref.to_string()))?;
    }

    let n_row: usize = c_digits
        .parse()
        .map_err(|_| SpreadError::InvalidCellRef(cell_ref.to_string()))?;
    if n_row == 0 {
        return Err(SpreadError::InvalidCellRef(cell_ref.to_string()));
    }

    Ok((n_row - 1, n_col - 1))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellGrid

/// Sparse `(row, col)` cell store with an explicit extent.
///
/// Row 0 is the header row. Cells never written read back as
/// [`EnumCellValue::None`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCellGrid {
    n_rows: usize,
    n_cols: usize,
    dict_cells: BTreeMap<(usize, usize), EnumCellValue>,
}

impl SpecCellGrid {
    /// Empty grid with zero extent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows (header included).
    pub fn height(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.n_cols
    }

    /// Number of rows after the header.
    pub fn height_data(&self) -> usize {
        self.n_rows.saturating_sub(1)
    }

    /// Grow the extent to at least `n_rows` x `n_cols`.
    pub fn ensure_extent(&mut self, n_rows: usize, n_cols: usize) {
        self.n_rows = usize::max(self.n_rows, n_rows);
        self.n_cols = usize::max(self.n_cols, n_cols);
    }

    /// Write one cell; blank values clear the cell but still grow the extent.
    pub fn set(&mut self, n_row: usize, n_col: usize, value: EnumCellValue) {
        self.ensure_extent(n_row + 1, n_col + 1);
        if value.is_none() {
            self.dict_cells.remove(&(n_row, n_col));
        } else {
            self.dict_cells.insert((n_row, n_col), value);
        }
    }

    /// Read one cell.
    pub fn get(&self, n_row: usize, n_col: usize) -> &EnumCellValue {
        static CELL_NONE: EnumCellValue = EnumCellValue::None;
        self.dict_cells.get(&(n_row, n_col)).unwrap_or(&CELL_NONE)
    }

    /// Write one cell by A1 reference.
    pub fn set_by_ref(&mut self, cell_ref: &str, value: EnumCellValue) -> Result<(), SpreadError> {
        let (n_row, n_col) = parse_cell_ref(cell_ref)?;
        self.set(n_row, n_col, value);
        Ok(())
    }

    /// Read one cell by A1 reference.
    pub fn get_by_ref(&self, cell_ref: &str) -> Result<&EnumCellValue, SpreadError> {
        let (n_row, n_col) = parse_cell_ref(cell_ref)?;
        Ok(self.get(n_row, n_col))
    }

    /// One full row across the grid width.
    pub fn row(&self, n_row: usize) -> Vec<EnumCellValue> {
        (0..self.n_cols)
            .map(|n_col| self.get(n_row, n_col).clone())
            .collect()
    }

    /// Header row (row 0).
    pub fn header(&self) -> Vec<EnumCellValue> {
        self.row(0)
    }

    /// Iterate non-blank cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, &EnumCellValue)> {
        self.dict_cells
            .iter()
            .map(|((n_row, n_col), value)| (*n_row, *n_col, value))
    }

    /// Overlay every non-blank cell of `other` onto this grid.
    pub fn overlay(&mut self, other: &SpecCellGrid) {
        self.ensure_extent(other.n_rows, other.n_cols);
        for (n_row, n_col, value) in other.iter_cells() {
            self.dict_cells.insert((n_row, n_col), value.clone());
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Materialization

/// Lay records out under a header of display keys.
///
/// Records whose shape differs from the key sample produce a row of blank
/// cells and a report warning instead of failing the pass.
pub fn materialize(
    records: &[EnumValue],
    keys: &SpecColumnKeys,
    sheet_name: &str,
    report: &mut SpecSpreadReport,
) -> SpecCellGrid {
    let n_width = keys.len();
    let mut grid = SpecCellGrid::new();
    grid.ensure_extent(1 + records.len(), n_width);

    keys.check_override(sheet_name, report);
    for (n_idx_col, c_label) in keys.display().into_iter().enumerate() {
        grid.set(0, n_idx_col, EnumCellValue::String(c_label));
    }

    let mut n_records_degraded = 0usize;
    for (n_idx_record, record) in records.iter().enumerate() {
        let n_row = n_idx_record + 1;
        if !keys.accepts(record) {
            n_records_degraded += 1;
            warn!(
                sheet = sheet_name,
                row = n_row + 1,
                kind = record.kind_name(),
                "record shape differs from first record; writing blank cells"
            );
            report.warn(format!(
                "Sheet {sheet_name:?} row {}: {} record does not match the first record; cells left blank.",
                n_row + 1,
                record.kind_name()
            ));
            continue;
        }

        for n_idx_col in 0..n_width {
            if let Some(value) = keys.lookup(record, n_idx_col) {
                grid.set(n_row, n_idx_col, value.to_cell_value());
            }
        }
    }

    debug!(
        sheet = sheet_name,
        rows = grid.height(),
        cols = grid.width(),
        degraded = n_records_degraded,
        "materialized grid"
    );
    grid
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
