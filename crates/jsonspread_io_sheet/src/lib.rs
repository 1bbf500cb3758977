//! `jsonspread_io_sheet` v1:
//! JSON records to spreadsheet workbook kernel.
//!
//! Module layout:
//! - `conf`     : constants and default presets
//! - `spec`     : options/models/reports
//! - `error`    : crate error type
//! - `value`    : decoded JSON value tree and parser
//! - `keys`     : column key resolution and label override
//! - `grid`     : cell grid and record materialization
//! - `workbook` : sheet/workbook state
//! - `writer`   : per-format encoders
//! - `sink`     : file/stream output
//! - `util`     : pure helper functions
pub mod conf;
pub mod error;
pub mod grid;
pub mod keys;
pub mod sink;
pub mod spec;
pub mod util;
pub mod value;
pub mod workbook;
pub mod writer;

pub use conf::{
    C_DEFAULT_EXTENSION, C_DEFAULT_FILE_NAME, C_DEFAULT_SHEET_TITLE, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_XLS_MAX, N_NROWS_XLS_MAX, TUP_EXCEL_ILLEGAL, derive_default_spread_options,
};
pub use error::SpreadError;
pub use grid::{SpecCellGrid, column_label, materialize, parse_cell_ref};
pub use keys::{EnumKeySource, SpecColumnKeys};
pub use sink::{CgiStream, DownloadStream, EnumSink, SpecDownloadBuffer, emit};
pub use spec::{
    EnumCellValue, EnumSheetFormat, SpecCsvOptions, SpecSheetReport, SpecSpreadOptions,
    SpecSpreadReport,
};
pub use util::{encode_file_name, sanitize_sheet_name};
pub use value::{EnumValue, JsonParser, is_json};
pub use workbook::{SpecSheet, Spread};
pub use writer::{SheetEncoder, derive_sheet_encoder};
