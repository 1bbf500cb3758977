//! Legacy XLS (BIFF8) encoder.
//!
//! The `Workbook` stream holds one globals substream (fonts, cell formats,
//! sheet directory, shared string table) followed by one substream per sheet.
//! The stream is wrapped in an OLE compound file via `cfb`.

use std::io::{Cursor, Write};

use cfb::CompoundFile;
use indexmap::IndexMap;
use tracing::debug;

use crate::conf::{N_NCOLS_XLS_MAX, N_NROWS_XLS_MAX};
use crate::error::SpreadError;
use crate::grid::SpecCellGrid;
use crate::spec::{EnumCellValue, EnumSheetFormat, SpecSpreadReport};
use crate::workbook::Spread;
use crate::writer::{SheetEncoder, validate_extent};

const N_RT_BOF: u16 = 0x0809;
const N_RT_EOF: u16 = 0x000A;
const N_RT_CODEPAGE: u16 = 0x0042;
const N_RT_WINDOW1: u16 = 0x003D;
const N_RT_FONT: u16 = 0x0031;
const N_RT_XF: u16 = 0x00E0;
const N_RT_STYLE: u16 = 0x0293;
const N_RT_BOUNDSHEET: u16 = 0x0085;
const N_RT_SST: u16 = 0x00FC;
const N_RT_CONTINUE: u16 = 0x003C;
const N_RT_EXTSST: u16 = 0x00FF;
const N_RT_DIMENSIONS: u16 = 0x0200;
const N_RT_NUMBER: u16 = 0x0203;
const N_RT_LABELSST: u16 = 0x00FD;
const N_RT_BOOLERR: u16 = 0x0205;
const N_RT_WINDOW2: u16 = 0x023E;

const N_BOF_GLOBALS: u16 = 0x0005;
const N_BOF_WORKSHEET: u16 = 0x0010;

/// Largest record body BIFF8 allows.
const N_LEN_RECORD_BODY_MAX: usize = 8224;
/// Longest cell text, in UTF-16 code units.
const N_LEN_CELL_TEXT_MAX: usize = 32_767;
/// Excel refuses `Workbook` streams shorter than this.
const N_LEN_STREAM_MIN: usize = 4096;

const N_COUNT_FONTS: usize = 4;
const N_COUNT_STYLE_XFS: usize = 15;
/// Index of the single cell XF, right after the style XFs.
const N_IXFE_CELL: u16 = N_COUNT_STYLE_XFS as u16;

/// BIFF8 workbook encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsEncoder;

impl SheetEncoder for XlsEncoder {
    fn format(&self) -> EnumSheetFormat {
        EnumSheetFormat::Xls
    }

    fn encode(
        &self,
        spread: &Spread,
        l_grids: &[SpecCellGrid],
        _report: &mut SpecSpreadReport,
    ) -> Result<Vec<u8>, SpreadError> {
        for (sheet, grid) in spread.sheets().iter().zip(l_grids) {
            validate_extent(
                EnumSheetFormat::Xls,
                sheet.title(),
                grid,
                N_NROWS_XLS_MAX,
                N_NCOLS_XLS_MAX,
            )?;
        }

        let table = SpecStringTable::collect(l_grids)?;
        let n_idx_active = spread.active_sheet_index();

        let l_names: Vec<&str> = spread.sheets().iter().map(|sheet| sheet.title()).collect();
        let (mut v_stream, l_pos_ply) = derive_globals(&l_names, n_idx_active, &table);

        for (n_idx_sheet, grid) in l_grids.iter().enumerate() {
            let n_pos_sheet = u32::try_from(v_stream.len()).map_err(|_| {
                SpreadError::encode(EnumSheetFormat::Xls, "workbook stream exceeds 4 GiB")
            })?;
            let n_pos_ply = l_pos_ply[n_idx_sheet];
            v_stream[n_pos_ply..n_pos_ply + 4].copy_from_slice(&n_pos_sheet.to_le_bytes());

            write_sheet(&mut v_stream, grid, n_idx_sheet == n_idx_active, &table);
        }

        if v_stream.len() < N_LEN_STREAM_MIN {
            v_stream.resize(N_LEN_STREAM_MIN, 0);
        }

        let v_out = write_compound_file(&v_stream).map_err(|err| {
            SpreadError::encode(EnumSheetFormat::Xls, format!("compound file error: {err}"))
        })?;
        debug!(
            sheets = l_grids.len(),
            strings = table.dict_idx.len(),
            bytes = v_out.len(),
            "xls workbook written"
        );
        Ok(v_out)
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region StringTable

/// Workbook-wide shared string table.
struct SpecStringTable<'a> {
    dict_idx: IndexMap<&'a str, u32>,
    n_refs: u32,
}

impl<'a> SpecStringTable<'a> {
    fn collect(l_grids: &'a [SpecCellGrid]) -> Result<Self, SpreadError> {
        let mut dict_idx: IndexMap<&'a str, u32> = IndexMap::new();
        let mut n_refs = 0u32;
        for grid in l_grids {
            for (_, _, value) in grid.iter_cells() {
                let EnumCellValue::String(c_text) = value else {
                    continue;
                };
                if c_text.encode_utf16().count() > N_LEN_CELL_TEXT_MAX {
                    return Err(SpreadError::encode(
                        EnumSheetFormat::Xls,
                        format!("cell text longer than {N_LEN_CELL_TEXT_MAX} characters"),
                    ));
                }
                let n_next = dict_idx.len() as u32;
                dict_idx.entry(c_text.as_str()).or_insert(n_next);
                n_refs += 1;
            }
        }
        Ok(Self { dict_idx, n_refs })
    }

    fn index_of(&self, text: &str) -> u32 {
        self.dict_idx.get(text).copied().unwrap_or_default()
    }
}

/// Write SST plus CONTINUE records, then the EXTSST lookup record.
///
/// A string header never straddles two records; character data that does
/// restarts with its option byte in the CONTINUE record.
fn write_string_table(v_out: &mut Vec<u8>, table: &SpecStringTable<'_>) {
    let n_unique = table.dict_idx.len();
    let n_per_bucket = usize::max(8, n_unique / 128 + 1);

    let mut l_bodies: Vec<Vec<u8>> = vec![Vec::new()];
    let mut l_buckets: Vec<(usize, usize)> = Vec::new();
    push_u32(&mut l_bodies[0], table.n_refs);
    push_u32(&mut l_bodies[0], n_unique as u32);

    for (n_idx, c_text) in table.dict_idx.keys().enumerate() {
        let l_units: Vec<u16> = c_text.encode_utf16().collect();
        let n_len_head = 3 + if l_units.is_empty() { 0 } else { 2 };
        if current_body(&l_bodies).len() + n_len_head > N_LEN_RECORD_BODY_MAX {
            l_bodies.push(Vec::new());
        }
        if n_idx % n_per_bucket == 0 {
            l_buckets.push((l_bodies.len() - 1, current_body(&l_bodies).len()));
        }

        let body = current_body_mut(&mut l_bodies);
        push_u16(body, l_units.len() as u16);
        body.push(0x01);

        let mut l_rest = l_units.as_slice();
        loop {
            let body = current_body_mut(&mut l_bodies);
            let n_room = (N_LEN_RECORD_BODY_MAX - body.len()) / 2;
            let n_take = usize::min(n_room, l_rest.len());
            for n_unit in &l_rest[..n_take] {
                push_u16(body, *n_unit);
            }
            l_rest = &l_rest[n_take..];
            if l_rest.is_empty() {
                break;
            }
            l_bodies.push(vec![0x01]);
        }
    }

    let mut l_pos_bodies = Vec::with_capacity(l_bodies.len());
    for (n_idx, body) in l_bodies.iter().enumerate() {
        l_pos_bodies.push(v_out.len());
        let n_type = if n_idx == 0 { N_RT_SST } else { N_RT_CONTINUE };
        push_record(v_out, n_type, body);
    }

    let mut v_ext = Vec::with_capacity(2 + 8 * l_buckets.len());
    push_u16(&mut v_ext, n_per_bucket as u16);
    for (n_idx_body, n_offset) in l_buckets {
        let n_offset_record = 4 + n_offset;
        push_u32(&mut v_ext, (l_pos_bodies[n_idx_body] + n_offset_record) as u32);
        push_u16(&mut v_ext, n_offset_record as u16);
        push_u16(&mut v_ext, 0);
    }
    push_record(v_out, N_RT_EXTSST, &v_ext);
}

fn current_body(l_bodies: &[Vec<u8>]) -> &Vec<u8> {
    &l_bodies[l_bodies.len() - 1]
}

fn current_body_mut(l_bodies: &mut [Vec<u8>]) -> &mut Vec<u8> {
    let n_last = l_bodies.len() - 1;
    &mut l_bodies[n_last]
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Globals

/// Build the globals substream. Returns it with the stream offset of every
/// sheet's `lbPlyPos` field, to be patched once sheet positions are known.
fn derive_globals(
    l_names: &[&str],
    n_idx_active: usize,
    table: &SpecStringTable<'_>,
) -> (Vec<u8>, Vec<usize>) {
    let mut v_out = Vec::new();
    write_bof(&mut v_out, N_BOF_GLOBALS);

    // UTF-16
    push_record(&mut v_out, N_RT_CODEPAGE, &1200u16.to_le_bytes());

    let mut v_window = Vec::with_capacity(18);
    push_u16(&mut v_window, 0); // xWn
    push_u16(&mut v_window, 0); // yWn
    push_u16(&mut v_window, 0x4000); // dxWn
    push_u16(&mut v_window, 0x2000); // dyWn
    push_u16(&mut v_window, 0x0038); // scroll bars, tabs
    push_u16(&mut v_window, n_idx_active as u16);
    push_u16(&mut v_window, 0); // itabFirst
    push_u16(&mut v_window, 1); // ctabSel
    push_u16(&mut v_window, 0x0258); // wTabRatio
    push_record(&mut v_out, N_RT_WINDOW1, &v_window);

    for _ in 0..N_COUNT_FONTS {
        push_record(&mut v_out, N_RT_FONT, &derive_font_body("Arial"));
    }
    for _ in 0..N_COUNT_STYLE_XFS {
        push_record(&mut v_out, N_RT_XF, &derive_xf_body(0xFFF5, 0xF4));
    }
    push_record(&mut v_out, N_RT_XF, &derive_xf_body(0x0001, 0x00));

    // Builtin "Normal" style on XF 0.
    push_record(&mut v_out, N_RT_STYLE, &[0x00, 0x80, 0x00, 0xFF]);

    let mut l_pos_ply = Vec::with_capacity(l_names.len());
    for c_name in l_names {
        let mut v_sheet = Vec::new();
        l_pos_ply.push(v_out.len() + 4);
        push_u32(&mut v_sheet, 0);
        v_sheet.push(0x00); // visible
        v_sheet.push(0x00); // worksheet
        push_short_unicode(&mut v_sheet, c_name);
        push_record(&mut v_out, N_RT_BOUNDSHEET, &v_sheet);
    }

    write_string_table(&mut v_out, table);
    push_record(&mut v_out, N_RT_EOF, &[]);
    (v_out, l_pos_ply)
}

fn derive_font_body(name: &str) -> Vec<u8> {
    let mut v_body = Vec::with_capacity(16 + name.len());
    push_u16(&mut v_body, 200); // 10pt in twips
    push_u16(&mut v_body, 0);
    push_u16(&mut v_body, 0x7FFF); // automatic color
    push_u16(&mut v_body, 400); // normal weight
    push_u16(&mut v_body, 0);
    v_body.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    v_body.push(name.len() as u8);
    v_body.push(0x00);
    v_body.extend_from_slice(name.as_bytes());
    v_body
}

fn derive_xf_body(n_flags: u16, n_used_attrs: u8) -> Vec<u8> {
    let mut v_body = Vec::with_capacity(20);
    push_u16(&mut v_body, 0); // font
    push_u16(&mut v_body, 0); // General
    push_u16(&mut v_body, n_flags);
    v_body.push(0x20); // bottom aligned
    v_body.push(0x00);
    v_body.push(0x00);
    v_body.push(n_used_attrs);
    push_u32(&mut v_body, 0);
    push_u32(&mut v_body, 0);
    push_u16(&mut v_body, 0x20C0);
    v_body
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Worksheet

fn write_sheet(
    v_out: &mut Vec<u8>,
    grid: &SpecCellGrid,
    if_active: bool,
    table: &SpecStringTable<'_>,
) {
    write_bof(v_out, N_BOF_WORKSHEET);

    let mut v_dim = Vec::with_capacity(14);
    push_u32(&mut v_dim, 0);
    push_u32(&mut v_dim, grid.height() as u32);
    push_u16(&mut v_dim, 0);
    push_u16(&mut v_dim, grid.width() as u16);
    push_u16(&mut v_dim, 0);
    push_record(v_out, N_RT_DIMENSIONS, &v_dim);

    for (n_row, n_col, value) in grid.iter_cells() {
        let mut v_cell = Vec::with_capacity(14);
        push_u16(&mut v_cell, n_row as u16);
        push_u16(&mut v_cell, n_col as u16);
        push_u16(&mut v_cell, N_IXFE_CELL);
        let n_type = match value {
            EnumCellValue::None => continue,
            EnumCellValue::Number(_) | EnumCellValue::Integer(_) => {
                let val = value.as_f64().unwrap_or_default();
                v_cell.extend_from_slice(&val.to_le_bytes());
                N_RT_NUMBER
            }
            EnumCellValue::Boolean(val) => {
                v_cell.push(u8::from(*val));
                v_cell.push(0x00);
                N_RT_BOOLERR
            }
            EnumCellValue::String(c_text) => {
                push_u32(&mut v_cell, table.index_of(c_text));
                N_RT_LABELSST
            }
        };
        push_record(v_out, n_type, &v_cell);
    }

    let mut v_window = Vec::with_capacity(18);
    push_u16(&mut v_window, if if_active { 0x06B6 } else { 0x00B6 });
    push_u16(&mut v_window, 0); // rwTop
    push_u16(&mut v_window, 0); // colLeft
    push_u32(&mut v_window, 0x40); // icvHdr
    push_u16(&mut v_window, 0);
    push_u16(&mut v_window, 0);
    push_u32(&mut v_window, 0);
    push_record(v_out, N_RT_WINDOW2, &v_window);

    push_record(v_out, N_RT_EOF, &[]);
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Bytes

fn write_bof(v_out: &mut Vec<u8>, n_dt: u16) {
    let mut v_body = Vec::with_capacity(16);
    push_u16(&mut v_body, 0x0600);
    push_u16(&mut v_body, n_dt);
    push_u16(&mut v_body, 0x0DBB);
    push_u16(&mut v_body, 0x07CC);
    push_u32(&mut v_body, 0);
    push_u32(&mut v_body, 0x0006);
    push_record(v_out, N_RT_BOF, &v_body);
}

fn push_record(v_out: &mut Vec<u8>, n_type: u16, v_body: &[u8]) {
    push_u16(v_out, n_type);
    push_u16(v_out, v_body.len() as u16);
    v_out.extend_from_slice(v_body);
}

/// `cch` byte, high-byte flag, UTF-16LE characters.
fn push_short_unicode(v_out: &mut Vec<u8>, text: &str) {
    let l_units: Vec<u16> = text.encode_utf16().collect();
    v_out.push(l_units.len() as u8);
    v_out.push(0x01);
    for n_unit in l_units {
        push_u16(v_out, n_unit);
    }
}

fn push_u16(v_out: &mut Vec<u8>, value: u16) {
    v_out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(v_out: &mut Vec<u8>, value: u32) {
    v_out.extend_from_slice(&value.to_le_bytes());
}

fn write_compound_file(v_stream: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut comp = CompoundFile::create(Cursor::new(Vec::new()))?;
    {
        let mut stream = comp.create_stream("/Workbook")?;
        stream.write_all(v_stream)?;
        stream.flush()?;
    }
    comp.flush()?;
    Ok(comp.into_inner().into_inner())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
