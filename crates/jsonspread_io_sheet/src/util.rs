//! Stateless helper utilities shared by the workbook and encoders.

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};

////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to a valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Case-insensitive sheet title comparison (Excel treats `Data` and `DATA` as equal).
pub fn is_same_sheet_name(lhs: &str, rhs: &str) -> bool {
    lhs.to_lowercase() == rhs.to_lowercase()
}

/// Return `name`, or `name N` with the first free `N >= 1` if `name` is taken.
pub fn derive_unique_sheet_name<'a, I>(name: &str, names_existing: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let if_taken = |candidate: &str| {
        names_existing
            .clone()
            .into_iter()
            .any(|c_existing| is_same_sheet_name(c_existing, candidate))
    };
    if !if_taken(name) {
        return name.to_string();
    }

    let mut n_idx = 1usize;
    loop {
        let c_suffix = format!(" {n_idx}");
        let n_len_base_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len());
        let c_base: String = name.chars().take(usize::max(1, n_len_base_max)).collect();
        let candidate = format!("{c_base}{c_suffix}");
        if !if_taken(&candidate) {
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileNaming

/// Form-urlencode `name.extension` for use as an attachment filename or path segment.
///
/// Only `-`, `_`, `.` and alphanumerics pass through; `*` is escaped as `%2A`.
pub fn encode_file_name(name: &str, extension: &str) -> String {
    let c_full = format!("{name}.{extension}");
    let c_encoded: String = form_urlencoded::byte_serialize(c_full.as_bytes()).collect();
    c_encoded.replace('*', "%2A")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasting

/// Cast a grid row index to the encoder's row type.
pub fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

/// Cast a grid column index to the encoder's column type.
pub fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
