//! Workbook state: sheets, active-sheet selection and file metadata.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::conf::{C_DEFAULT_EXTENSION, C_DEFAULT_FILE_NAME};
use crate::error::SpreadError;
use crate::grid::{SpecCellGrid, materialize};
use crate::keys::{EnumKeySource, SpecColumnKeys};
use crate::sink::{DownloadStream, EnumSink, emit};
use crate::spec::{EnumCellValue, EnumSheetFormat, SpecSpreadOptions, SpecSpreadReport};
use crate::util::{
    derive_unique_sheet_name, encode_file_name, is_same_sheet_name, sanitize_sheet_name,
};
use crate::value::EnumValue;

////////////////////////////////////////////////////////////////////////////////
// #region Sheet

/// One named sheet: optional record data plus directly written cells.
#[derive(Debug, Clone, Default)]
pub struct SpecSheet {
    title: String,
    records: Option<Vec<EnumValue>>,
    keys: SpecColumnKeys,
    grid_direct: SpecCellGrid,
    l_warnings_load: Vec<String>,
}

impl SpecSheet {
    fn new(title: String) -> Self {
        Self {
            title,
            ..Default::default()
        }
    }

    /// Sheet title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Loaded records, if any.
    pub fn records(&self) -> Option<&[EnumValue]> {
        self.records.as_deref()
    }

    /// Column keys for this sheet.
    pub fn keys(&self) -> &SpecColumnKeys {
        &self.keys
    }

    /// Load records. Lookup keys come from the first non-empty load and stay fixed.
    pub fn set_data(&mut self, records: Vec<EnumValue>) {
        if self.keys.source() == EnumKeySource::Empty {
            let l_labels_custom = self.keys.custom_labels().map(<[String]>::to_vec);
            self.keys = SpecColumnKeys::resolve(records.first());
            if let Some(l_labels) = l_labels_custom {
                self.keys.override_labels(l_labels);
            }
        }
        self.records = Some(records);
        self.l_warnings_load.clear();
    }

    /// Load a decoded document: a sequence gives the records, a map its values,
    /// anything else no records. The last two are reported on the next emit.
    pub fn set_data_value(&mut self, data: EnumValue) {
        let (records, warning) = derive_records(data);
        self.set_data(records);
        self.l_warnings_load.extend(warning);
    }

    /// Override header labels.
    pub fn set_keys<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.override_labels(labels);
    }

    /// Write one cell directly. Record data wins where both set a cell.
    pub fn set_cell_value(
        &mut self,
        cell_ref: &str,
        value: impl Into<EnumCellValue>,
    ) -> Result<(), SpreadError> {
        self.grid_direct.set_by_ref(cell_ref, value.into())
    }

    /// Build this sheet's grid.
    pub fn materialize(&self, report: &mut SpecSpreadReport) -> SpecCellGrid {
        for c_warning in &self.l_warnings_load {
            report.warn(format!("Sheet {:?}: {c_warning}", self.title));
        }
        let mut grid = self.grid_direct.clone();
        if let Some(records) = &self.records {
            grid.overlay(&materialize(records, &self.keys, &self.title, report));
        }
        grid
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workbook

/// Per-conversion workbook.
///
/// Starts with one sheet holding the input records; output is produced by
/// [`Self::save`], [`Self::get_file`] or [`Self::emit`].
#[derive(Debug, Clone)]
pub struct Spread {
    l_sheets: Vec<SpecSheet>,
    n_idx_active: usize,
    file_name: String,
    extension: String,
    path: Option<PathBuf>,
    options: SpecSpreadOptions,
}

impl Spread {
    /// Create a workbook whose first sheet holds `data`.
    ///
    /// A top-level sequence supplies the records. A map supplies its values,
    /// and any other value yields an empty sheet.
    pub fn new(data: EnumValue) -> Self {
        Self::with_options(data, SpecSpreadOptions::default())
    }

    /// Same as [`Self::new`] with explicit options.
    pub fn with_options(data: EnumValue, options: SpecSpreadOptions) -> Self {
        let mut sheet = SpecSheet::new(sanitize_sheet_name(&options.default_sheet_title, "_"));
        sheet.set_data_value(data);
        Self {
            l_sheets: vec![sheet],
            n_idx_active: 0,
            file_name: C_DEFAULT_FILE_NAME.to_string(),
            extension: C_DEFAULT_EXTENSION.to_string(),
            path: None,
            options,
        }
    }

    /// Decode JSON text and create a workbook from it.
    pub fn from_json_str(text: &str) -> Result<Self, SpreadError> {
        Ok(Self::new(EnumValue::from_json_str(text)?))
    }

    /// Conversion options.
    pub fn options(&self) -> &SpecSpreadOptions {
        &self.options
    }

    /// Replace conversion options.
    pub fn set_options(&mut self, options: SpecSpreadOptions) {
        self.options = options;
    }

    ////////////////////////////////////////////////////////////////////////////
    // Sheets

    /// Insert an empty sheet at `index` (clamped) or append it.
    pub fn add_sheet(
        &mut self,
        title: &str,
        index: Option<usize>,
    ) -> Result<&mut SpecSheet, SpreadError> {
        let c_title = sanitize_sheet_name(title, "_");
        if self
            .l_sheets
            .iter()
            .any(|sheet| is_same_sheet_name(&sheet.title, &c_title))
        {
            return Err(SpreadError::DuplicateTitle(c_title));
        }

        let n_idx = index.map_or(self.l_sheets.len(), |val| {
            usize::min(val, self.l_sheets.len())
        });
        self.l_sheets.insert(n_idx, SpecSheet::new(c_title));
        if n_idx <= self.n_idx_active {
            self.n_idx_active += 1;
        }
        Ok(&mut self.l_sheets[n_idx])
    }

    /// Number of sheets.
    pub fn sheet_count(&self) -> usize {
        self.l_sheets.len()
    }

    /// Sheet titles in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.l_sheets.iter().map(|sheet| sheet.title.clone()).collect()
    }

    /// Index of the active sheet.
    pub fn active_sheet_index(&self) -> usize {
        self.n_idx_active
    }

    /// Select the active sheet by position.
    pub fn set_active_sheet(&mut self, index: usize) -> Result<(), SpreadError> {
        if index >= self.l_sheets.len() {
            return Err(SpreadError::IndexOutOfRange {
                index,
                n_sheets: self.l_sheets.len(),
            });
        }
        self.n_idx_active = index;
        Ok(())
    }

    /// Select the active sheet by title (case-insensitive).
    pub fn set_active_sheet_by_name(&mut self, name: &str) -> Result<(), SpreadError> {
        let n_idx = self
            .l_sheets
            .iter()
            .position(|sheet| is_same_sheet_name(&sheet.title, name))
            .ok_or_else(|| SpreadError::NotFound(name.to_string()))?;
        self.n_idx_active = n_idx;
        Ok(())
    }

    /// Rename the active sheet, suffixing a number if another sheet has the name.
    pub fn set_sheet_name(&mut self, name: &str) {
        let c_title = sanitize_sheet_name(name, "_");
        let c_title_unique = derive_unique_sheet_name(
            &c_title,
            self.l_sheets
                .iter()
                .enumerate()
                .filter(|(n_idx, _)| *n_idx != self.n_idx_active)
                .map(|(_, sheet)| sheet.title.as_str()),
        );
        if c_title_unique != c_title {
            warn!(
                requested = name,
                assigned = c_title_unique.as_str(),
                "sheet title already in use"
            );
        }
        self.l_sheets[self.n_idx_active].title = c_title_unique;
    }

    /// Borrow the active sheet.
    pub fn active_sheet(&self) -> &SpecSheet {
        &self.l_sheets[self.n_idx_active]
    }

    /// Mutably borrow the active sheet.
    pub fn active_sheet_mut(&mut self) -> &mut SpecSheet {
        &mut self.l_sheets[self.n_idx_active]
    }

    /// Borrow all sheets in order.
    pub fn sheets(&self) -> &[SpecSheet] {
        &self.l_sheets
    }

    ////////////////////////////////////////////////////////////////////////////
    // Active-sheet data

    /// Load records into the active sheet (same top-level rules as [`Self::new`]).
    pub fn set_data(&mut self, data: EnumValue) {
        self.active_sheet_mut().set_data_value(data);
    }

    /// Override header labels of the active sheet.
    pub fn set_keys<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_sheet_mut().set_keys(labels);
    }

    /// Override header labels of the active sheet from a value.
    pub fn set_keys_from_value(&mut self, labels: &EnumValue) {
        self.active_sheet_mut()
            .keys
            .override_labels_from_value(labels);
    }

    /// Lookup keys of the active sheet.
    pub fn keys(&self) -> &[String] {
        self.active_sheet().keys.internal()
    }

    /// Header labels of the active sheet.
    pub fn display_keys(&self) -> Vec<String> {
        self.active_sheet().keys.display()
    }

    /// Write one cell into the active sheet.
    pub fn set_cell_value(
        &mut self,
        cell_ref: &str,
        value: impl Into<EnumCellValue>,
    ) -> Result<(), SpreadError> {
        self.active_sheet_mut().set_cell_value(cell_ref, value)
    }

    /// Materialize every sheet, in workbook order.
    pub fn materialize(&self, report: &mut SpecSpreadReport) -> Vec<SpecCellGrid> {
        self.l_sheets
            .iter()
            .map(|sheet| sheet.materialize(report))
            .collect()
    }

    ////////////////////////////////////////////////////////////////////////////
    // File metadata

    /// Set the base file name.
    pub fn set_file_name(&mut self, name: &str) {
        self.file_name = name.to_string();
    }

    /// Base file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Set the extension (lowercased). Unknown extensions are kept and encode as XLSX.
    pub fn set_extension(&mut self, extension: &str) {
        self.extension = extension.to_lowercase();
    }

    /// Alias of [`Self::set_extension`].
    pub fn set_type_file(&mut self, extension: &str) {
        self.set_extension(extension);
    }

    /// Normalized extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Encoder selected by the extension.
    pub fn format(&self) -> EnumSheetFormat {
        EnumSheetFormat::from_extension(&self.extension)
    }

    /// Encoded `name.extension`.
    pub fn full_file_name(&self) -> String {
        encode_file_name(&self.file_name, &self.extension)
    }

    /// Set the directory used by [`Self::save`] when it gets no path.
    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    /// Configured save directory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    ////////////////////////////////////////////////////////////////////////////
    // Output

    /// Encode and send to `sink`.
    pub fn emit(&self, sink: EnumSink<'_>) -> Result<SpecSpreadReport, SpreadError> {
        emit(self, sink)
    }

    /// Write `full_file_name()` into `path`, or the configured/current directory.
    pub fn save(&self, path: Option<&Path>) -> Result<SpecSpreadReport, SpreadError> {
        let dir = path
            .or(self.path.as_deref())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        self.emit(EnumSink::File(dir))
    }

    /// Send the file as an attachment download on `stream`.
    pub fn get_file(
        &self,
        stream: &mut dyn DownloadStream,
    ) -> Result<SpecSpreadReport, SpreadError> {
        self.emit(EnumSink::Stream(stream))
    }
}

fn derive_records(data: EnumValue) -> (Vec<EnumValue>, Option<String>) {
    match data {
        EnumValue::Sequence(seq) => (seq, None),
        EnumValue::Map(map) => {
            warn!(
                n_values = map.len(),
                "top-level JSON is an object; using its values as records"
            );
            let c_warning = format!(
                "top-level JSON is an object; its {} value(s) were used as records.",
                map.len()
            );
            (map.into_values().collect(), Some(c_warning))
        }
        other => {
            warn!(
                kind = other.kind_name(),
                "top-level JSON is not an array; sheet left empty"
            );
            let c_warning = format!(
                "top-level JSON is a {}, not an array; no records were written.",
                other.kind_name()
            );
            (vec![], Some(c_warning))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn spread(text: &str) -> Spread {
        Spread::from_json_str(text).expect("decode")
    }

    #[test]
    fn test_defaults() {
        let book = spread("[]");
        assert_eq!(book.sheet_count(), 1);
        assert_eq!(book.sheet_names(), vec!["Worksheet"]);
        assert_eq!(book.file_name(), "spreadsheet");
        assert_eq!(book.extension(), "xlsx");
        assert_eq!(book.full_file_name(), "spreadsheet.xlsx");
        assert!(book.path().is_none());
    }

    #[test]
    fn test_add_sheet_appends_and_rejects_duplicates() {
        let mut book = spread(r#"[{"a":1}]"#);
        book.add_sheet("Extra", None).expect("add");
        assert_eq!(book.sheet_count(), 2);
        assert_eq!(book.sheet_names(), vec!["Worksheet", "Extra"]);

        assert!(matches!(
            book.add_sheet("extra", None),
            Err(SpreadError::DuplicateTitle(_))
        ));
        assert_eq!(book.sheet_count(), 2);
    }

    #[test]
    fn test_add_sheet_at_index_keeps_active_sheet() {
        let mut book = spread(r#"[{"a":1}]"#);
        book.add_sheet("First", Some(0)).expect("add");
        assert_eq!(book.sheet_names(), vec!["First", "Worksheet"]);
        assert_eq!(book.active_sheet().title(), "Worksheet");

        book.add_sheet("Last", Some(99)).expect("add");
        assert_eq!(book.sheet_names(), vec!["First", "Worksheet", "Last"]);
        assert_eq!(book.active_sheet_index(), 1);
    }

    #[test]
    fn test_set_active_sheet_errors() {
        let mut book = spread("[]");
        assert!(matches!(
            book.set_active_sheet(1),
            Err(SpreadError::IndexOutOfRange { index: 1, n_sheets: 1 })
        ));
        assert!(matches!(
            book.set_active_sheet_by_name("nope"),
            Err(SpreadError::NotFound(_))
        ));
        book.set_active_sheet(0).expect("index 0");
    }

    #[test]
    fn test_mutating_other_sheet_leaves_original_grid() {
        let mut book = spread(r#"[{"id":1,"name":"A"}]"#);
        let mut report = SpecSpreadReport::default();
        let grid_before = book.materialize(&mut report)[0].clone();

        book.add_sheet("Extra", None).expect("add");
        book.set_active_sheet_by_name("Extra").expect("select");
        book.set_cell_value("A1", "other").expect("cell");
        book.set_data(EnumValue::from_json_str(r#"[{"x":9}]"#).expect("decode"));
        book.set_keys(["X"]);

        let l_grids = book.materialize(&mut report);
        assert_eq!(l_grids[0], grid_before);
        assert_eq!(l_grids[1].header(), vec![EnumCellValue::from("X")]);
        assert_eq!(book.sheet_names(), vec!["Worksheet", "Extra"]);
    }

    #[test]
    fn test_set_sheet_name_renames_active_and_dedupes() {
        let mut book = spread("[]");
        book.add_sheet("Data", None).expect("add");
        book.set_sheet_name("user_export");
        assert_eq!(book.sheet_names(), vec!["user_export", "Data"]);

        book.set_sheet_name("data");
        assert_eq!(book.sheet_names(), vec!["data 1", "Data"]);

        book.set_active_sheet(1).expect("select");
        book.set_sheet_name("Data");
        assert_eq!(book.sheet_names(), vec!["data 1", "Data"]);
    }

    #[test]
    fn test_extension_is_lowercased_and_unknown_defaults_to_xlsx() {
        let mut book = spread("[]");
        book.set_type_file("CSV");
        assert_eq!(book.extension(), "csv");
        assert_eq!(book.format(), EnumSheetFormat::Csv);

        book.set_extension("PDF");
        assert_eq!(book.extension(), "pdf");
        assert_eq!(book.format(), EnumSheetFormat::Xlsx);
        assert_eq!(book.full_file_name(), "spreadsheet.pdf");
    }

    #[test]
    fn test_full_file_name_is_encoded() {
        let mut book = spread("[]");
        book.set_file_name("Q1 report/final");
        book.set_extension("ods");
        assert_eq!(book.full_file_name(), "Q1+report%2Ffinal.ods");
    }

    #[test]
    fn test_top_level_object_uses_values_as_records() {
        let book = spread(r#"{"r1":{"a":1},"r2":{"a":2}}"#);
        assert_eq!(book.keys(), ["a"]);
        let mut report = SpecSpreadReport::default();
        let grid = &book.materialize(&mut report)[0];
        assert_eq!(grid.height_data(), 2);
        assert_eq!(grid.get(2, 0), &EnumCellValue::Number(2.0));
    }

    #[test]
    fn test_top_level_scalar_gives_empty_sheet() {
        let book = spread("5");
        assert!(book.keys().is_empty());
        let mut report = SpecSpreadReport::default();
        let grid = &book.materialize(&mut report)[0];
        assert_eq!(grid.height_data(), 0);
        assert_eq!(grid.width(), 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("number"));
    }

    #[test]
    fn test_top_level_shape_warnings_reach_report() {
        let book = spread(r#"{"r1":{"a":1},"r2":{"a":2}}"#);
        let mut report = SpecSpreadReport::default();
        book.materialize(&mut report);
        assert_eq!(report.warnings.len(), 1);
        assert!(
            report.warnings[0].starts_with("Sheet \"Worksheet\": top-level JSON is an object")
        );

        let mut book = spread("[]");
        let mut report = SpecSpreadReport::default();
        book.materialize(&mut report);
        assert!(report.warnings.is_empty());

        book.set_data(EnumValue::from("text"));
        let mut report = SpecSpreadReport::default();
        book.materialize(&mut report);
        assert_eq!(report.warnings.len(), 1);

        book.set_data(EnumValue::Sequence(vec![]));
        let mut report = SpecSpreadReport::default();
        book.materialize(&mut report);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_keys_fixed_after_first_load() {
        let mut book = spread(r#"[{"a":1,"b":2}]"#);
        book.set_data(EnumValue::from_json_str(r#"[{"b":3,"c":4}]"#).expect("decode"));
        assert_eq!(book.keys(), ["a", "b"]);
        assert_eq!(book.display_keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_keys_resolved_when_first_load_was_empty() {
        let mut book = spread("[]");
        book.set_keys(["Label"]);
        book.set_data(EnumValue::from_json_str(r#"[{"k":1}]"#).expect("decode"));
        assert_eq!(book.keys(), ["k"]);
        assert_eq!(book.display_keys(), vec!["Label"]);
    }

    #[test]
    fn test_direct_cells_sit_under_record_data() {
        let mut book = spread(r#"[{"a":1}]"#);
        book.set_cell_value("A1", "ignored").expect("cell");
        book.set_cell_value("C5", "note").expect("cell");
        let mut report = SpecSpreadReport::default();
        let grid = &book.materialize(&mut report)[0];
        assert_eq!(grid.get_by_ref("A1").expect("ref"), &EnumCellValue::from("a"));
        assert_eq!(grid.get_by_ref("C5").expect("ref"), &EnumCellValue::from("note"));
        assert_eq!((grid.height(), grid.width()), (5, 3));
    }
}
