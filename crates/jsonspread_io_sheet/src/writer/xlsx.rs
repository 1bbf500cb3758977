//! XLSX encoder backed by `rust_xlsxwriter`.

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::debug;

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::error::SpreadError;
use crate::grid::SpecCellGrid;
use crate::spec::{EnumCellValue, EnumSheetFormat, SpecSpreadReport};
use crate::util::{cast_col_num, cast_row_num};
use crate::workbook::Spread;
use crate::writer::{SheetEncoder, validate_extent};

/// Office Open XML workbook encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxEncoder;

impl SheetEncoder for XlsxEncoder {
    fn format(&self) -> EnumSheetFormat {
        EnumSheetFormat::Xlsx
    }

    fn encode(
        &self,
        spread: &Spread,
        l_grids: &[SpecCellGrid],
        _report: &mut SpecSpreadReport,
    ) -> Result<Vec<u8>, SpreadError> {
        let mut workbook = Workbook::new();

        for (n_idx_sheet, (sheet, grid)) in spread.sheets().iter().zip(l_grids).enumerate() {
            validate_extent(
                EnumSheetFormat::Xlsx,
                sheet.title(),
                grid,
                N_NROWS_EXCEL_MAX,
                N_NCOLS_EXCEL_MAX,
            )?;

            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(sheet.title())
                .map_err(derive_xlsx_error)?;
            if n_idx_sheet == spread.active_sheet_index() {
                worksheet.set_active(true);
            }

            for (n_row, n_col, value) in grid.iter_cells() {
                write_cell(worksheet, n_row, n_col, value)?;
            }
            debug!(
                sheet = sheet.title(),
                rows = grid.height(),
                cols = grid.width(),
                "xlsx sheet written"
            );
        }

        workbook.save_to_buffer().map_err(derive_xlsx_error)
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
) -> Result<(), SpreadError> {
    let n_row = cast_row_num(row_idx).map_err(derive_text_error)?;
    let n_col = cast_col_num(col_idx).map_err(derive_text_error)?;
    match value {
        EnumCellValue::None => {}
        EnumCellValue::String(val) => {
            worksheet
                .write_string(n_row, n_col, val)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Number(_) | EnumCellValue::Integer(_) => {
            let val = value.as_f64().unwrap_or_default();
            worksheet
                .write_number(n_row, n_col, val)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Boolean(val) => {
            worksheet
                .write_boolean(n_row, n_col, *val)
                .map_err(derive_xlsx_error)?;
        }
    }
    Ok(())
}

fn derive_xlsx_error(err: XlsxError) -> SpreadError {
    SpreadError::encode(EnumSheetFormat::Xlsx, format!("xlsx write error: {err}"))
}

fn derive_text_error(message: String) -> SpreadError {
    SpreadError::encode(EnumSheetFormat::Xlsx, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_zip_package() {
        let mut spread =
            Spread::from_json_str(r#"[{"id":1,"ok":true,"name":"A"}]"#).expect("decode");
        spread.add_sheet("Second", None).expect("add");
        let mut report = SpecSpreadReport::default();
        let l_grids = spread.materialize(&mut report);

        let v_bytes = XlsxEncoder
            .encode(&spread, &l_grids, &mut report)
            .expect("encode");
        assert!(v_bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_encode_rejects_oversized_string() {
        let mut spread = Spread::from_json_str("[]").expect("decode");
        spread
            .set_cell_value("A1", "x".repeat(40_000))
            .expect("cell");
        let mut report = SpecSpreadReport::default();
        let l_grids = spread.materialize(&mut report);

        assert!(matches!(
            XlsxEncoder.encode(&spread, &l_grids, &mut report),
            Err(SpreadError::Encode {
                format: EnumSheetFormat::Xlsx,
                ..
            })
        ));
    }
}
