//! Shared workbook specification models.

use std::fmt;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer};

use crate::conf::{
    C_DEFAULT_SHEET_TITLE, C_MIME_CSV, C_MIME_ODS, C_MIME_XLS, C_MIME_XLSX, N_INT_F64_EXACT_MAX,
};

////////////////////////////////////////////////////////////////////////////////
// #region SheetFormat

/// Output container format, selected from the workbook extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumSheetFormat {
    /// Office Open XML workbook (default for unknown extensions).
    #[default]
    Xlsx,
    /// Legacy BIFF8 workbook.
    Xls,
    /// OpenDocument spreadsheet.
    Ods,
    /// Comma separated values (single sheet).
    Csv,
}

impl EnumSheetFormat {
    /// Map a normalized extension to a format. Anything unrecognized is XLSX.
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "xls" => Self::Xls,
            "ods" => Self::Ods,
            "csv" => Self::Csv,
            _ => Self::Xlsx,
        }
    }

    /// Canonical extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Ods => "ods",
            Self::Csv => "csv",
        }
    }

    /// Per-format MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Xlsx => C_MIME_XLSX,
            Self::Xls => C_MIME_XLS,
            Self::Ods => C_MIME_ODS,
            Self::Csv => C_MIME_CSV,
        }
    }

    /// `Content-Type` sent with a download.
    ///
    /// Without `if_strict`, only CSV gets its own type and every other format is
    /// announced as XLSX.
    pub fn content_type(&self, if_strict: bool) -> &'static str {
        match self {
            Self::Csv => C_MIME_CSV,
            _ if if_strict => self.mime_type(),
            _ => C_MIME_XLSX,
        }
    }
}

impl fmt::Display for EnumSheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Normalized scalar written into one grid cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Boolean value.
    Boolean(bool),
    /// Numeric value.
    Number(f64),
    /// Integer outside the range `f64` holds exactly; text output keeps every digit.
    Integer(i128),
    /// Text value.
    String(String),
}

impl EnumCellValue {
    /// Whether the cell is blank.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Integer cell. Values within `±2^53` stay [`Self::Number`].
    pub fn from_integer(value: i128) -> Self {
        if value.unsigned_abs() <= N_INT_F64_EXACT_MAX {
            Self::Number(value as f64)
        } else {
            Self::Integer(value)
        }
    }

    /// Numeric value for typed numeric cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Text rendering used by text-only encoders (CSV, ODS display text).
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Boolean(true) => "TRUE".to_string(),
            Self::Boolean(false) => "FALSE".to_string(),
            Self::Number(n) => n.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::from_integer(i128::from(value))
    }
}

impl From<u64> for EnumCellValue {
    fn from(value: u64) -> Self {
        Self::from_integer(i128::from(value))
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// CSV encoder options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecCsvOptions {
    /// Field delimiter byte. Config gives it as a one-character string (`";"`).
    #[serde(deserialize_with = "deserialize_ascii_byte")]
    pub delimiter: u8,
    /// Quote byte.
    #[serde(deserialize_with = "deserialize_ascii_byte")]
    pub quote: u8,
    /// Terminate records with `\r\n` instead of `\n`.
    pub if_crlf: bool,
    /// Prefix output with a UTF-8 byte order mark.
    pub if_write_bom: bool,
    /// Sheet to export; the active sheet when `None`.
    pub sheet_index: Option<usize>,
}

impl Default for SpecCsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            if_crlf: false,
            if_write_bom: false,
            sheet_index: None,
        }
    }
}

/// Accept a single ASCII character, or its byte value.
fn deserialize_ascii_byte<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    struct VisitorAsciiByte;

    impl Visitor<'_> for VisitorAsciiByte {
        type Value = u8;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a single ASCII character")
        }

        fn visit_char<E: de::Error>(self, value: char) -> Result<u8, E> {
            if value.is_ascii() {
                Ok(value as u8)
            } else {
                Err(E::invalid_value(Unexpected::Char(value), &self))
            }
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u8, E> {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(chr), None) => self.visit_char(chr),
                _ => Err(E::invalid_value(Unexpected::Str(value), &self)),
            }
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u8, E> {
            u8::try_from(value)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(value), &self))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u8, E> {
            u8::try_from(value)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| E::invalid_value(Unexpected::Signed(value), &self))
        }
    }

    deserializer.deserialize_any(VisitorAsciiByte)
}

/// Workbook-wide conversion options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecSpreadOptions {
    /// CSV encoder options.
    pub csv: SpecCsvOptions,
    /// Send the real per-format MIME type instead of the XLSX type for XLS/ODS.
    pub if_strict_content_type: bool,
    /// Title given to the initial sheet.
    pub default_sheet_title: String,
}

impl Default for SpecSpreadOptions {
    fn default() -> Self {
        Self {
            csv: SpecCsvOptions::default(),
            if_strict_content_type: false,
            default_sheet_title: C_DEFAULT_SHEET_TITLE.to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Extent of one emitted sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetReport {
    /// Sheet title in the workbook.
    pub sheet_name: String,
    /// Rows written, header included.
    pub n_rows: usize,
    /// Columns written.
    pub n_cols: usize,
}

/// Per-emit report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSpreadReport {
    /// Encoded file name (`name.extension`).
    pub file_name: String,
    /// Format actually encoded.
    pub format: EnumSheetFormat,
    /// Sheets materialized for this emit.
    pub sheets: Vec<SpecSheetReport>,
    /// Encoded payload size.
    pub n_bytes: usize,
    /// Non-fatal structure warnings.
    pub warnings: Vec<String>,
}

impl SpecSpreadReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
