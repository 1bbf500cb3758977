//! Output sinks: a file in a directory, or an attachment download stream.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::SpreadError;
use crate::spec::{SpecSheetReport, SpecSpreadReport};
use crate::workbook::Spread;
use crate::writer::derive_sheet_encoder;

////////////////////////////////////////////////////////////////////////////////
// #region DownloadStream

/// Byte stream that carries response framing headers ahead of the body.
pub trait DownloadStream: Write {
    /// Record one header. Called before any body bytes are written.
    fn set_header(&mut self, name: &str, value: &str) -> io::Result<()>;
}

/// In-memory download: collected headers plus body bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecDownloadBuffer {
    /// Headers in the order they were set.
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl SpecDownloadBuffer {
    /// First header value with `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(c_name, _)| c_name.eq_ignore_ascii_case(name))
            .map(|(_, c_value)| c_value.as_str())
    }
}

impl Write for SpecDownloadBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DownloadStream for SpecDownloadBuffer {
    fn set_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// CGI-style stream: header lines, a blank line, then the body.
#[derive(Debug)]
pub struct CgiStream<W: Write> {
    inner: W,
    l_headers_pending: Vec<(String, String)>,
    if_headers_sent: bool,
}

impl<W: Write> CgiStream<W> {
    /// Wrap `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            l_headers_pending: Vec::new(),
            if_headers_sent: false,
        }
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn send_headers(&mut self) -> io::Result<()> {
        if self.if_headers_sent {
            return Ok(());
        }
        for (c_name, c_value) in &self.l_headers_pending {
            write!(self.inner, "{c_name}: {c_value}\r\n")?;
        }
        self.inner.write_all(b"\r\n")?;
        self.l_headers_pending.clear();
        self.if_headers_sent = true;
        Ok(())
    }
}

impl<W: Write> Write for CgiStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send_headers()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_headers()?;
        self.inner.flush()
    }
}

impl<W: Write> DownloadStream for CgiStream<W> {
    fn set_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        if self.if_headers_sent {
            return Err(io::Error::other("headers already sent"));
        }
        self.l_headers_pending
            .push((name.to_string(), value.to_string()));
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Emit

/// Output destination.
pub enum EnumSink<'a> {
    /// Directory; the file is named after the workbook's full file name.
    File(PathBuf),
    /// Open download stream.
    Stream(&'a mut dyn DownloadStream),
}

/// Materialize every sheet, encode for the workbook's format and write to `sink`.
///
/// Encoding finishes before the destination is touched, so an encoder error
/// never leaves a partial file behind.
pub fn emit(spread: &Spread, sink: EnumSink<'_>) -> Result<SpecSpreadReport, SpreadError> {
    let format = spread.format();
    let mut report = SpecSpreadReport {
        file_name: spread.full_file_name(),
        format,
        ..Default::default()
    };

    let l_grids = spread.materialize(&mut report);
    report.sheets = spread
        .sheets()
        .iter()
        .zip(&l_grids)
        .map(|(sheet, grid)| SpecSheetReport {
            sheet_name: sheet.title().to_string(),
            n_rows: grid.height(),
            n_cols: grid.width(),
        })
        .collect();
    let encoder = derive_sheet_encoder(format);
    let v_bytes = encoder.encode(spread, &l_grids, &mut report)?;
    report.n_bytes = v_bytes.len();

    match sink {
        EnumSink::File(dir) => {
            let path_file_out = dir.join(&report.file_name);
            write_file(&path_file_out, &v_bytes)?;
            info!(
                path = %path_file_out.display(),
                format = %format,
                bytes = v_bytes.len(),
                "saved spreadsheet"
            );
        }
        EnumSink::Stream(stream) => {
            let c_content_type = format.content_type(spread.options().if_strict_content_type);
            let c_disposition = format!("attachment; filename=\"{}\"", report.file_name);
            write_stream(stream, c_content_type, &c_disposition, &v_bytes)?;
            info!(
                file_name = report.file_name.as_str(),
                format = %format,
                bytes = v_bytes.len(),
                "streamed spreadsheet"
            );
        }
    }

    Ok(report)
}

fn write_file(path_file_out: &Path, v_bytes: &[u8]) -> Result<(), SpreadError> {
    let c_target = path_file_out.display().to_string();
    let mut file = File::create(path_file_out).map_err(|err| SpreadError::io(&c_target, err))?;

    let res_write = file.write_all(v_bytes).and_then(|_| file.flush());
    drop(file);

    if let Err(err) = res_write {
        if let Err(err_remove) = fs::remove_file(path_file_out) {
            warn!(path = c_target.as_str(), error = %err_remove, "failed to remove partial file");
        }
        return Err(SpreadError::io(c_target, err));
    }
    Ok(())
}

fn write_stream(
    stream: &mut dyn DownloadStream,
    content_type: &str,
    disposition: &str,
    v_bytes: &[u8],
) -> Result<(), SpreadError> {
    send_download(stream, content_type, disposition, v_bytes)
        .map_err(|err| SpreadError::io("download stream", err))
}

fn send_download(
    stream: &mut dyn DownloadStream,
    content_type: &str,
    disposition: &str,
    v_bytes: &[u8],
) -> io::Result<()> {
    stream.set_header("Content-Type", content_type)?;
    stream.set_header("Content-Disposition", disposition)?;
    stream.write_all(v_bytes)?;
    stream.flush()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStream;

    impl Write for BrokenStream {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DownloadStream for BrokenStream {
        fn set_header(&mut self, _name: &str, _value: &str) -> io::Result<()> {
            Ok(())
        }
    }

    fn spread_csv() -> Spread {
        let mut spread =
            Spread::from_json_str(r#"[{"id":1,"name":"A"},{"id":2,"name":"B"}]"#).expect("decode");
        spread.set_extension("csv");
        spread
    }

    #[test]
    fn test_stream_sets_csv_headers() {
        let spread = spread_csv();
        let mut buffer = SpecDownloadBuffer::default();
        let report = spread.get_file(&mut buffer).expect("emit");

        assert_eq!(buffer.header("content-type"), Some("text/csv"));
        assert_eq!(
            buffer.header("Content-Disposition"),
            Some("attachment; filename=\"spreadsheet.csv\"")
        );
        assert_eq!(String::from_utf8_lossy(&buffer.body), "id,name\n1,A\n2,B\n");
        assert_eq!(report.n_bytes, buffer.body.len());
        assert_eq!(report.sheets.len(), 1);
        assert_eq!((report.sheets[0].n_rows, report.sheets[0].n_cols), (3, 2));
        assert_eq!(buffer.headers[0].0, "Content-Type");
    }

    #[test]
    fn test_stream_uses_xlsx_type_for_ods_unless_strict() {
        let mut spread = spread_csv();
        spread.set_extension("ods");
        let mut buffer = SpecDownloadBuffer::default();
        spread.get_file(&mut buffer).expect("emit");
        assert_eq!(
            buffer.header("Content-Type"),
            Some(crate::conf::C_MIME_XLSX)
        );

        let mut options = spread.options().clone();
        options.if_strict_content_type = true;
        spread.set_options(options);
        let mut buffer = SpecDownloadBuffer::default();
        spread.get_file(&mut buffer).expect("emit");
        assert_eq!(buffer.header("Content-Type"), Some(crate::conf::C_MIME_ODS));
    }

    #[test]
    fn test_cgi_stream_writes_header_block_first() {
        let spread = spread_csv();
        let mut stream = CgiStream::new(Vec::new());
        spread.get_file(&mut stream).expect("emit");
        let c_out = String::from_utf8(stream.into_inner()).expect("utf8");
        assert_eq!(
            c_out,
            "Content-Type: text/csv\r\n\
             Content-Disposition: attachment; filename=\"spreadsheet.csv\"\r\n\
             \r\n\
             id,name\n1,A\n2,B\n"
        );
    }

    #[test]
    fn test_cgi_stream_rejects_late_headers() {
        let mut stream = CgiStream::new(Vec::new());
        stream.write_all(b"x").expect("write");
        assert!(stream.set_header("X-Late", "1").is_err());
    }

    #[test]
    fn test_broken_stream_reports_io_error() {
        let spread = spread_csv();
        let mut stream = BrokenStream;
        assert!(matches!(
            spread.get_file(&mut stream),
            Err(SpreadError::Io { .. })
        ));
    }

    #[test]
    fn test_file_sink_writes_named_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut spread = spread_csv();
        spread.set_file_name("people list");
        let report = spread.save(Some(dir.path())).expect("save");

        let path_out = dir.path().join("people+list.csv");
        assert_eq!(report.file_name, "people+list.csv");
        assert_eq!(
            fs::read_to_string(path_out).expect("read"),
            "id,name\n1,A\n2,B\n"
        );
    }

    #[test]
    fn test_file_sink_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spread = spread_csv();
        let res = spread.save(Some(&dir.path().join("does/not/exist")));
        assert!(matches!(res, Err(SpreadError::Io { .. })));
    }
}
