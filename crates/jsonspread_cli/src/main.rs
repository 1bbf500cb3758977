//! `jsonspread`: convert a JSON array of records into a spreadsheet file.

mod config;
mod logging;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use jsonspread_io_sheet::{CgiStream, EnumValue, SpecSpreadOptions, SpecSpreadReport, Spread};
use tracing::{info, warn};

use crate::config::{SpecCliConfig, load_config};

#[derive(Debug, Parser)]
#[command(name = "jsonspread")]
#[command(about = "Convert JSON records into an xlsx/xls/ods/csv spreadsheet")]
#[command(version)]
struct Args {
    /// Input JSON file; `-` reads stdin
    #[arg(default_value = "-")]
    input: String,

    /// Output extension (xlsx, xls, ods, csv); unknown values encode as xlsx
    #[arg(short, long)]
    format: Option<String>,

    /// Base output file name (defaults to the input file stem)
    #[arg(short, long)]
    name: Option<String>,

    /// Directory to save into
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Write a header block and the file body to stdout instead of saving
    #[arg(long)]
    stdout: bool,

    /// Header labels replacing the record keys, comma separated
    #[arg(long, value_delimiter = ',')]
    keys: Vec<String>,

    /// Title of the data sheet
    #[arg(long)]
    sheet_name: Option<String>,

    /// CSV field delimiter
    #[arg(long)]
    delimiter: Option<char>,

    /// Announce the real MIME type for xls/ods downloads
    #[arg(long)]
    strict_content_type: bool,

    /// Config file (defaults to ./jsonspread.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    logging::init(&config.log_filter);

    let text = read_input(&args.input)?;
    let data = EnumValue::from_json_str(&text)
        .with_context(|| format!("Input {} is not valid JSON", derive_input_label(&args.input)))?;

    let options = derive_spread_options(&args, &config)?;
    let mut spread = Spread::with_options(data, options);
    if let Some(c_title) = &args.sheet_name {
        spread.set_sheet_name(c_title);
    }
    if !args.keys.is_empty() {
        spread.set_keys(args.keys.iter().map(String::as_str));
    }
    if let Some(c_name) = derive_file_name(&args, &config) {
        spread.set_file_name(&c_name);
    }
    if let Some(c_extension) = args.format.as_ref().or(config.extension.as_ref()) {
        spread.set_extension(c_extension);
    }

    let report = if args.stdout {
        let mut stream = CgiStream::new(io::stdout().lock());
        spread.get_file(&mut stream)?
    } else {
        let dir_out = args
            .out_dir
            .clone()
            .or_else(|| config.out_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        spread.save(Some(&dir_out))?
    };

    log_report(&report);
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
}

fn derive_input_label(input: &str) -> String {
    if input == "-" {
        "<stdin>".to_string()
    } else {
        input.to_string()
    }
}

/// Config options with command-line flags applied on top.
fn derive_spread_options(args: &Args, config: &SpecCliConfig) -> Result<SpecSpreadOptions> {
    let mut options = config.spread.clone();
    if args.strict_content_type {
        options.if_strict_content_type = true;
    }
    if let Some(chr) = args.delimiter {
        if !chr.is_ascii() {
            bail!("CSV delimiter must be a single ASCII character, got {chr:?}");
        }
        options.csv.delimiter = chr as u8;
    }
    Ok(options)
}

/// `--name`, then config, then the input file stem. `None` keeps the library default.
fn derive_file_name(args: &Args, config: &SpecCliConfig) -> Option<String> {
    if let Some(c_name) = args.name.as_ref().or(config.file_name.as_ref()) {
        return Some(c_name.clone());
    }
    if args.input == "-" {
        return None;
    }
    Path::new(&args.input)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
}

fn log_report(report: &SpecSpreadReport) {
    for c_warning in &report.warnings {
        warn!("{c_warning}");
    }
    for sheet in &report.sheets {
        info!(
            sheet = sheet.sheet_name.as_str(),
            rows = sheet.n_rows,
            cols = sheet.n_cols,
            "sheet"
        );
    }
    info!(
        file = report.file_name.as_str(),
        format = %report.format,
        bytes = report.n_bytes,
        warnings = report.warnings.len(),
        "done"
    );
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(l_args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("jsonspread").chain(l_args.iter().copied()))
            .expect("args")
    }

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_stdin() {
        let args = parse(&[]);
        assert_eq!(args.input, "-");
        assert!(!args.stdout);
        assert!(args.keys.is_empty());
        assert_eq!(derive_file_name(&args, &SpecCliConfig::default()), None);
    }

    #[test]
    fn test_keys_are_comma_separated() {
        let args = parse(&["data.json", "--keys", "# ID,Name"]);
        assert_eq!(args.keys, vec!["# ID", "Name"]);
    }

    #[test]
    fn test_file_name_precedence() {
        let mut config = SpecCliConfig::default();
        let args = parse(&["exports/users.json"]);
        assert_eq!(derive_file_name(&args, &config).as_deref(), Some("users"));

        config.file_name = Some("from_config".to_string());
        assert_eq!(
            derive_file_name(&args, &config).as_deref(),
            Some("from_config")
        );

        let args = parse(&["exports/users.json", "--name", "flag"]);
        assert_eq!(derive_file_name(&args, &config).as_deref(), Some("flag"));
    }

    #[test]
    fn test_flags_override_config_options() {
        let mut config = SpecCliConfig::default();
        config.spread.csv.delimiter = b';';
        let options = derive_spread_options(&parse(&[]), &config).expect("options");
        assert_eq!(options.csv.delimiter, b';');

        let args = parse(&["--delimiter", "\t", "--strict-content-type"]);
        let options = derive_spread_options(&args, &config).expect("options");
        assert_eq!(options.csv.delimiter, b'\t');
        assert!(options.if_strict_content_type);

        let args = parse(&["--delimiter", "é"]);
        assert!(derive_spread_options(&args, &config).is_err());
    }
}
