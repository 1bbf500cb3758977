//! OpenDocument spreadsheet encoder (zip package plus `quick-xml` content).

use std::io::{Cursor, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::conf::{C_MIME_ODS, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::error::SpreadError;
use crate::grid::SpecCellGrid;
use crate::spec::{EnumCellValue, EnumSheetFormat, SpecSpreadReport};
use crate::workbook::Spread;
use crate::writer::{SheetEncoder, validate_extent};

type TypeXmlWriter = Writer<Vec<u8>>;

const C_NS_OFFICE: &str = "urn:oasis:names:tc:opendocument:xmlns:office:1.0";
const C_NS_TABLE: &str = "urn:oasis:names:tc:opendocument:xmlns:table:1.0";
const C_NS_TEXT: &str = "urn:oasis:names:tc:opendocument:xmlns:text:1.0";
const C_NS_CONFIG: &str = "urn:oasis:names:tc:opendocument:xmlns:config:1.0";
const C_NS_MANIFEST: &str = "urn:oasis:names:tc:opendocument:xmlns:manifest:1.0";
const C_ODF_VERSION: &str = "1.2";

/// OpenDocument spreadsheet encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdsEncoder;

impl SheetEncoder for OdsEncoder {
    fn format(&self) -> EnumSheetFormat {
        EnumSheetFormat::Ods
    }

    fn encode(
        &self,
        spread: &Spread,
        l_grids: &[SpecCellGrid],
        _report: &mut SpecSpreadReport,
    ) -> Result<Vec<u8>, SpreadError> {
        for (sheet, grid) in spread.sheets().iter().zip(l_grids) {
            validate_extent(
                EnumSheetFormat::Ods,
                sheet.title(),
                grid,
                N_NROWS_EXCEL_MAX,
                N_NCOLS_EXCEL_MAX,
            )?;
        }

        let l_names: Vec<&str> = spread.sheets().iter().map(|sheet| sheet.title()).collect();
        let v_content = derive_content_xml(&l_names, l_grids).map_err(derive_ods_error)?;
        let v_settings = derive_settings_xml(l_names[spread.active_sheet_index()])
            .map_err(derive_ods_error)?;
        let v_manifest = derive_manifest_xml().map_err(derive_ods_error)?;

        let v_out = write_package(&[
            ("content.xml", v_content.as_slice()),
            ("settings.xml", v_settings.as_slice()),
            ("META-INF/manifest.xml", v_manifest.as_slice()),
        ])
        .map_err(derive_ods_error)?;
        debug!(
            sheets = l_grids.len(),
            bytes = v_out.len(),
            "ods package written"
        );
        Ok(v_out)
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Package

/// Zip the parts behind a stored, uncompressed `mimetype` entry.
fn write_package(l_parts: &[(&str, &[u8])]) -> Result<Vec<u8>, String> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts_stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let opts_deflated =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", opts_stored)
        .map_err(|err| err.to_string())?;
    zip.write_all(C_MIME_ODS.as_bytes())
        .map_err(|err| err.to_string())?;

    for (c_path, v_part) in l_parts {
        zip.start_file(*c_path, opts_deflated)
            .map_err(|err| err.to_string())?;
        zip.write_all(v_part).map_err(|err| err.to_string())?;
    }

    let cursor = zip.finish().map_err(|err| err.to_string())?;
    Ok(cursor.into_inner())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parts

fn derive_content_xml(l_names: &[&str], l_grids: &[SpecCellGrid]) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    write_decl(&mut writer)?;

    write_start(
        &mut writer,
        "office:document-content",
        &[
            ("xmlns:office", C_NS_OFFICE),
            ("xmlns:table", C_NS_TABLE),
            ("xmlns:text", C_NS_TEXT),
            ("office:version", C_ODF_VERSION),
        ],
    )?;
    write_start(&mut writer, "office:body", &[])?;
    write_start(&mut writer, "office:spreadsheet", &[])?;

    for (c_name, grid) in l_names.iter().zip(l_grids) {
        write_table(&mut writer, c_name, grid)?;
    }

    write_end(&mut writer, "office:spreadsheet")?;
    write_end(&mut writer, "office:body")?;
    write_end(&mut writer, "office:document-content")?;
    Ok(writer.into_inner())
}

fn write_table(writer: &mut TypeXmlWriter, name: &str, grid: &SpecCellGrid) -> Result<(), String> {
    write_start(writer, "table:table", &[("table:name", name)])?;

    // A table needs at least one column and one row to open cleanly.
    let n_cols = usize::max(1, grid.width());
    let n_rows = usize::max(1, grid.height());
    let c_cols = n_cols.to_string();
    write_empty(
        writer,
        "table:table-column",
        &[("table:number-columns-repeated", c_cols.as_str())],
    )?;

    let l_cells: Vec<(usize, usize, &EnumCellValue)> = grid.iter_cells().collect();
    let mut n_row_next = 0usize;
    for l_row_cells in l_cells.chunk_by(|lhs, rhs| lhs.0 == rhs.0) {
        let n_row = l_row_cells[0].0;
        write_blank_rows(writer, n_row - n_row_next, n_cols)?;

        write_start(writer, "table:table-row", &[])?;
        let mut n_col_next = 0usize;
        for &(_, n_col, value) in l_row_cells {
            write_blank_run(writer, n_col - n_col_next)?;
            write_cell(writer, value)?;
            n_col_next = n_col + 1;
        }
        write_blank_run(writer, n_cols - n_col_next)?;
        write_end(writer, "table:table-row")?;
        n_row_next = n_row + 1;
    }
    write_blank_rows(writer, n_rows.saturating_sub(n_row_next), n_cols)?;

    write_end(writer, "table:table")
}

/// `n_blank_rows` empty rows as one repeated row element.
fn write_blank_rows(
    writer: &mut TypeXmlWriter,
    n_blank_rows: usize,
    n_cols: usize,
) -> Result<(), String> {
    if n_blank_rows == 0 {
        return Ok(());
    }
    let c_repeat = n_blank_rows.to_string();
    let l_attrs_repeat = [("table:number-rows-repeated", c_repeat.as_str())];
    let l_attrs: &[(&str, &str)] = if n_blank_rows == 1 {
        &[]
    } else {
        &l_attrs_repeat
    };
    write_start(writer, "table:table-row", l_attrs)?;
    write_blank_run(writer, n_cols)?;
    write_end(writer, "table:table-row")
}

fn write_blank_run(writer: &mut TypeXmlWriter, n_blank_run: usize) -> Result<(), String> {
    match n_blank_run {
        0 => Ok(()),
        1 => write_empty(writer, "table:table-cell", &[]),
        n => {
            let c_repeat = n.to_string();
            write_empty(
                writer,
                "table:table-cell",
                &[("table:number-columns-repeated", c_repeat.as_str())],
            )
        }
    }
}

fn write_cell(writer: &mut TypeXmlWriter, value: &EnumCellValue) -> Result<(), String> {
    let c_text = value.to_text();
    match value {
        EnumCellValue::None => return write_empty(writer, "table:table-cell", &[]),
        EnumCellValue::Number(_) | EnumCellValue::Integer(_) => write_start(
            writer,
            "table:table-cell",
            &[("office:value-type", "float"), ("office:value", c_text.as_str())],
        )?,
        EnumCellValue::Boolean(val) => write_start(
            writer,
            "table:table-cell",
            &[
                ("office:value-type", "boolean"),
                ("office:boolean-value", if *val { "true" } else { "false" }),
            ],
        )?,
        EnumCellValue::String(_) => write_start(
            writer,
            "table:table-cell",
            &[("office:value-type", "string")],
        )?,
    }

    let c_text = c_text.replace("\r\n", "\n").replace('\r', "\n");
    for c_line in c_text.split('\n') {
        write_start(writer, "text:p", &[])?;
        write_paragraph_text(writer, c_line)?;
        write_end(writer, "text:p")?;
    }
    write_end(writer, "table:table-cell")
}

/// Paragraph body with whitespace that survives ODF space collapsing.
///
/// A lone inner space stays literal. Leading, trailing and repeated spaces
/// become `<text:s/>`, tabs become `<text:tab/>`.
fn write_paragraph_text(writer: &mut TypeXmlWriter, line: &str) -> Result<(), String> {
    let l_chars: Vec<char> = line.chars().collect();
    let mut c_run = String::new();
    let mut n_idx = 0usize;
    while n_idx < l_chars.len() {
        match l_chars[n_idx] {
            ' ' => {
                let n_spaces = l_chars[n_idx..].iter().take_while(|chr| **chr == ' ').count();
                let if_edge = n_idx == 0 || n_idx + n_spaces == l_chars.len();
                let n_spaces_escaped = if if_edge {
                    n_spaces
                } else {
                    c_run.push(' ');
                    n_spaces - 1
                };
                if n_spaces_escaped > 0 {
                    write_text(writer, &c_run)?;
                    c_run.clear();
                    write_space_run(writer, n_spaces_escaped)?;
                }
                n_idx += n_spaces;
            }
            '\t' => {
                write_text(writer, &c_run)?;
                c_run.clear();
                write_empty(writer, "text:tab", &[])?;
                n_idx += 1;
            }
            chr => {
                c_run.push(chr);
                n_idx += 1;
            }
        }
    }
    write_text(writer, &c_run)
}

fn write_space_run(writer: &mut TypeXmlWriter, n_spaces: usize) -> Result<(), String> {
    if n_spaces == 1 {
        return write_empty(writer, "text:s", &[]);
    }
    let c_count = n_spaces.to_string();
    write_empty(writer, "text:s", &[("text:c", c_count.as_str())])
}

fn derive_settings_xml(active_table: &str) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    write_decl(&mut writer)?;

    write_start(
        &mut writer,
        "office:document-settings",
        &[
            ("xmlns:office", C_NS_OFFICE),
            ("xmlns:config", C_NS_CONFIG),
            ("office:version", C_ODF_VERSION),
        ],
    )?;
    write_start(&mut writer, "office:settings", &[])?;
    write_start(
        &mut writer,
        "config:config-item-set",
        &[("config:name", "ooo:view-settings")],
    )?;
    write_start(
        &mut writer,
        "config:config-item-map-indexed",
        &[("config:name", "Views")],
    )?;
    write_start(&mut writer, "config:config-item-map-entry", &[])?;
    write_config_item(&mut writer, "ViewId", "view1")?;
    write_config_item(&mut writer, "ActiveTable", active_table)?;
    write_end(&mut writer, "config:config-item-map-entry")?;
    write_end(&mut writer, "config:config-item-map-indexed")?;
    write_end(&mut writer, "config:config-item-set")?;
    write_end(&mut writer, "office:settings")?;
    write_end(&mut writer, "office:document-settings")?;
    Ok(writer.into_inner())
}

fn write_config_item(writer: &mut TypeXmlWriter, name: &str, value: &str) -> Result<(), String> {
    write_start(
        writer,
        "config:config-item",
        &[("config:name", name), ("config:type", "string")],
    )?;
    write_text(writer, value)?;
    write_end(writer, "config:config-item")
}

fn derive_manifest_xml() -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    write_decl(&mut writer)?;

    write_start(
        &mut writer,
        "manifest:manifest",
        &[
            ("xmlns:manifest", C_NS_MANIFEST),
            ("manifest:version", C_ODF_VERSION),
        ],
    )?;
    write_empty(
        &mut writer,
        "manifest:file-entry",
        &[
            ("manifest:full-path", "/"),
            ("manifest:version", C_ODF_VERSION),
            ("manifest:media-type", C_MIME_ODS),
        ],
    )?;
    for c_path in ["content.xml", "settings.xml"] {
        write_empty(
            &mut writer,
            "manifest:file-entry",
            &[
                ("manifest:full-path", c_path),
                ("manifest:media-type", "text/xml"),
            ],
        )?;
    }
    write_end(&mut writer, "manifest:manifest")?;
    Ok(writer.into_inner())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region XmlHelpers

fn write_decl(writer: &mut TypeXmlWriter) -> Result<(), String> {
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|err| err.to_string())
}

fn derive_start<'a>(name: &'a str, l_attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut elem = BytesStart::new(name);
    for attr in l_attrs {
        elem.push_attribute(*attr);
    }
    elem
}

fn write_start(
    writer: &mut TypeXmlWriter,
    name: &str,
    l_attrs: &[(&str, &str)],
) -> Result<(), String> {
    writer
        .write_event(Event::Start(derive_start(name, l_attrs)))
        .map_err(|err| err.to_string())
}

fn write_empty(
    writer: &mut TypeXmlWriter,
    name: &str,
    l_attrs: &[(&str, &str)],
) -> Result<(), String> {
    writer
        .write_event(Event::Empty(derive_start(name, l_attrs)))
        .map_err(|err| err.to_string())
}

fn write_end(writer: &mut TypeXmlWriter, name: &str) -> Result<(), String> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|err| err.to_string())
}

fn write_text(writer: &mut TypeXmlWriter, text: &str) -> Result<(), String> {
    if text.is_empty() {
        return Ok(());
    }
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|err| err.to_string())
}

fn derive_ods_error(message: String) -> SpreadError {
    SpreadError::encode(EnumSheetFormat::Ods, message)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
