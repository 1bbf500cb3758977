//! Workbook constants and default preset factories.

use crate::spec::SpecSpreadOptions;

/// Default base file name (without extension).
pub const C_DEFAULT_FILE_NAME: &str = "spreadsheet";
/// Default file extension.
pub const C_DEFAULT_EXTENSION: &str = "xlsx";
/// Title of the sheet every new workbook starts with.
pub const C_DEFAULT_SHEET_TITLE: &str = "Worksheet";

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// BIFF8 worksheet maximum row count.
pub const N_NROWS_XLS_MAX: usize = 65_536;
/// BIFF8 worksheet maximum column count.
pub const N_NCOLS_XLS_MAX: usize = 256;

/// Largest integer magnitude an `f64` represents exactly (2^53).
pub const N_INT_F64_EXACT_MAX: u128 = 1 << 53;

/// MIME type sent for every non-CSV download unless strict content types are enabled.
pub const C_MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// Legacy Excel MIME type.
pub const C_MIME_XLS: &str = "application/vnd.ms-excel";
/// OpenDocument spreadsheet MIME type.
pub const C_MIME_ODS: &str = "application/vnd.oasis.opendocument.spreadsheet";
/// CSV MIME type.
pub const C_MIME_CSV: &str = "text/csv";

/// Build default conversion options.
pub fn derive_default_spread_options() -> SpecSpreadOptions {
    SpecSpreadOptions::default()
}
