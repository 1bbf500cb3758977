//! Per-format workbook encoders.
//!
//! Every encoder turns already materialized grids into a complete in-memory
//! payload; nothing here touches the filesystem.

mod csv;
mod ods;
mod xls;
mod xlsx;

pub use self::csv::CsvEncoder;
pub use self::ods::OdsEncoder;
pub use self::xls::XlsEncoder;
pub use self::xlsx::XlsxEncoder;

use crate::error::SpreadError;
use crate::grid::SpecCellGrid;
use crate::spec::{EnumSheetFormat, SpecSpreadReport};
use crate::workbook::Spread;

/// Encode a workbook's materialized grids into one file payload.
pub trait SheetEncoder {
    /// Format this encoder produces.
    fn format(&self) -> EnumSheetFormat;

    /// Encode `l_grids` (one per sheet of `spread`, same order).
    fn encode(
        &self,
        spread: &Spread,
        l_grids: &[SpecCellGrid],
        report: &mut SpecSpreadReport,
    ) -> Result<Vec<u8>, SpreadError>;
}

/// Pick the encoder for `format`.
pub fn derive_sheet_encoder(format: EnumSheetFormat) -> Box<dyn SheetEncoder> {
    match format {
        EnumSheetFormat::Xlsx => Box::new(XlsxEncoder),
        EnumSheetFormat::Xls => Box::new(XlsEncoder),
        EnumSheetFormat::Ods => Box::new(OdsEncoder),
        EnumSheetFormat::Csv => Box::new(CsvEncoder),
    }
}

/// Reject grids larger than the format allows.
pub(crate) fn validate_extent(
    format: EnumSheetFormat,
    sheet_name: &str,
    grid: &SpecCellGrid,
    n_rows_max: usize,
    n_cols_max: usize,
) -> Result<(), SpreadError> {
    if grid.height() > n_rows_max || grid.width() > n_cols_max {
        return Err(SpreadError::encode(
            format,
            format!(
                "sheet {sheet_name:?} is {}x{}; {format} allows at most {n_rows_max}x{n_cols_max}",
                grid.height(),
                grid.width()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_sheet_encoder_matches_format() {
        for format in [
            EnumSheetFormat::Xlsx,
            EnumSheetFormat::Xls,
            EnumSheetFormat::Ods,
            EnumSheetFormat::Csv,
        ] {
            assert_eq!(derive_sheet_encoder(format).format(), format);
        }
    }

    #[test]
    fn test_validate_extent() {
        let mut grid = SpecCellGrid::new();
        grid.ensure_extent(10, 3);
        assert!(validate_extent(EnumSheetFormat::Xls, "s", &grid, 10, 3).is_ok());
        assert!(matches!(
            validate_extent(EnumSheetFormat::Xls, "s", &grid, 9, 3),
            Err(SpreadError::Encode {
                format: EnumSheetFormat::Xls,
                ..
            })
        ));
    }
}
