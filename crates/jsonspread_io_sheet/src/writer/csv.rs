//! CSV encoder for a single sheet.

use ::csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::debug;

use crate::error::SpreadError;
use crate::grid::SpecCellGrid;
use crate::spec::{EnumCellValue, EnumSheetFormat, SpecSpreadReport};
use crate::workbook::Spread;
use crate::writer::SheetEncoder;

const C_UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Delimited-text encoder. Writes the active sheet unless options pin another one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvEncoder;

impl SheetEncoder for CsvEncoder {
    fn format(&self) -> EnumSheetFormat {
        EnumSheetFormat::Csv
    }

    fn encode(
        &self,
        spread: &Spread,
        l_grids: &[SpecCellGrid],
        report: &mut SpecSpreadReport,
    ) -> Result<Vec<u8>, SpreadError> {
        let options = &spread.options().csv;
        let n_idx_sheet = options
            .sheet_index
            .unwrap_or_else(|| spread.active_sheet_index());
        let grid = l_grids
            .get(n_idx_sheet)
            .ok_or(SpreadError::IndexOutOfRange {
                index: n_idx_sheet,
                n_sheets: l_grids.len(),
            })?;
        if l_grids.len() > 1 {
            let c_title = spread.sheets()[n_idx_sheet].title();
            report.warn(format!(
                "CSV holds one sheet; only {c_title:?} was written, {} other sheet(s) skipped.",
                l_grids.len() - 1
            ));
        }

        let mut v_out = Vec::new();
        if options.if_write_bom {
            v_out.extend_from_slice(C_UTF8_BOM);
        }

        let mut writer = WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .quote_style(QuoteStyle::Necessary)
            .terminator(if options.if_crlf {
                Terminator::CRLF
            } else {
                Terminator::Any(b'\n')
            })
            .flexible(true)
            .from_writer(v_out);

        if grid.width() > 0 {
            for n_row in 0..grid.height() {
                writer
                    .write_record(grid.row(n_row).iter().map(EnumCellValue::to_text))
                    .map_err(derive_csv_error)?;
            }
        }

        let v_out = writer
            .into_inner()
            .map_err(|err| derive_csv_error(err.error()))?;
        debug!(
            rows = grid.height(),
            cols = grid.width(),
            bytes = v_out.len(),
            "csv sheet written"
        );
        Ok(v_out)
    }
}

fn derive_csv_error(err: impl ToString) -> SpreadError {
    SpreadError::encode(EnumSheetFormat::Csv, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EnumValue;

    fn encode_text(spread: &Spread) -> (String, SpecSpreadReport) {
        let mut report = SpecSpreadReport::default();
        let l_grids = spread.materialize(&mut report);
        let v_bytes = CsvEncoder
            .encode(spread, &l_grids, &mut report)
            .expect("encode");
        (String::from_utf8(v_bytes).expect("utf8"), report)
    }

    #[test]
    fn test_records_and_quoting() {
        let spread = Spread::from_json_str(
            r#"[{"id":1,"note":"a,b","ok":true},{"id":2.5,"note":"say \"hi\"","ok":null}]"#,
        )
        .expect("decode");
        let (c_out, report) = encode_text(&spread);
        assert_eq!(
            c_out,
            "id,note,ok\n1,\"a,b\",TRUE\n2.5,\"say \"\"hi\"\"\",\n"
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_large_integers_are_written_exactly() {
        let spread = Spread::from_json_str(
            r#"[{"id":9007199254740993,"u":18446744073709551615,"f":0.1}]"#,
        )
        .expect("decode");
        let (c_out, _) = encode_text(&spread);
        assert_eq!(c_out, "id,u,f\n9007199254740993,18446744073709551615,0.1\n");
    }

    #[test]
    fn test_nested_values_are_json_text() {
        let spread = Spread::from_json_str(r#"[{"tags":["x","y"]}]"#).expect("decode");
        let (c_out, _) = encode_text(&spread);
        assert_eq!(c_out, "tags\n\"[\"\"x\"\",\"\"y\"\"]\"\n");
    }

    #[test]
    fn test_empty_input_is_empty_file() {
        let spread = Spread::from_json_str("[]").expect("decode");
        let (c_out, _) = encode_text(&spread);
        assert_eq!(c_out, "");
    }

    #[test]
    fn test_options_delimiter_crlf_and_bom() {
        let mut spread = Spread::from_json_str(r#"[{"a":1,"b":2}]"#).expect("decode");
        let mut options = spread.options().clone();
        options.csv.delimiter = b';';
        options.csv.if_crlf = true;
        options.csv.if_write_bom = true;
        spread.set_options(options);

        let (c_out, _) = encode_text(&spread);
        assert_eq!(c_out, "\u{FEFF}a;b\r\n1;2\r\n");
    }

    #[test]
    fn test_writes_active_sheet_and_warns_about_others() {
        let mut spread = Spread::from_json_str(r#"[{"a":1}]"#).expect("decode");
        spread.add_sheet("Other", None).expect("add");
        spread.set_active_sheet(1).expect("select");
        spread.set_data(EnumValue::from_json_str(r#"[{"z":"q"}]"#).expect("decode"));

        let (c_out, report) = encode_text(&spread);
        assert_eq!(c_out, "z\nq\n");
        assert_eq!(report.warnings.len(), 1);

        let mut options = spread.options().clone();
        options.csv.sheet_index = Some(0);
        spread.set_options(options);
        let (c_out, _) = encode_text(&spread);
        assert_eq!(c_out, "a\n1\n");
    }

    #[test]
    fn test_sheet_index_out_of_range() {
        let mut spread = Spread::from_json_str("[]").expect("decode");
        let mut options = spread.options().clone();
        options.csv.sheet_index = Some(3);
        spread.set_options(options);

        let mut report = SpecSpreadReport::default();
        let l_grids = spread.materialize(&mut report);
        assert!(matches!(
            CsvEncoder.encode(&spread, &l_grids, &mut report),
            Err(SpreadError::IndexOutOfRange { index: 3, .. })
        ));
    }
}
