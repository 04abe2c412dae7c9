//! Upload format detection and conversion.
//!
//! The tablet only understands PDF and EPUB containers, so anything
//! dropped onto the mount is sniffed by magic bytes and, for DJVU and
//! PostScript, piped through an external converter before persisting.

use crate::error::{RemfsError, Result};
use log::debug;
use std::io::Write;
use std::process::Command;

/// Container formats recognised on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Djvu,
    Ps,
    Epub,
}

impl Format {
    /// The `fileType` the persisted document will carry. DJVU and PS
    /// both convert to PDF.
    pub fn file_type(self) -> &'static str {
        match self {
            Format::Pdf | Format::Djvu | Format::Ps => "pdf",
            Format::Epub => "epub",
        }
    }
}

/// Sniff the container format from the first bytes of an upload.
/// Anything unrecognised is a conversion error; the caller unwinds the
/// pending node.
pub fn detect(data: &[u8]) -> Result<Format> {
    if data.starts_with(b"%PDF") {
        Ok(Format::Pdf)
    } else if data.starts_with(b"AT&TFORM") {
        Ok(Format::Djvu)
    } else if data.starts_with(b"%!PS-Adobe") {
        Ok(Format::Ps)
    } else if data.starts_with(b"PK") {
        // EPUB is a zip container.
        Ok(Format::Epub)
    } else {
        Err(RemfsError::Conversion(
            "only PDF, EPUB, DJVU and PS files are supported".to_string(),
        ))
    }
}

/// Convert `data` to the bytes that will be persisted. PDF and EPUB
/// pass through; DJVU and PS run the external converter over scratch
/// files.
pub fn to_upload_bytes(format: Format, data: Vec<u8>) -> Result<Vec<u8>> {
    match format {
        Format::Pdf | Format::Epub => Ok(data),
        Format::Djvu => run_converter("ddjvu", &["--format=pdf"], ".djvu", &data),
        Format::Ps => run_converter("ps2pdf", &[], ".ps", &data),
    }
}

fn run_converter(program: &str, args: &[&str], in_suffix: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut infile = tempfile::Builder::new().suffix(in_suffix).tempfile()?;
    infile.write_all(data)?;
    infile.flush()?;
    let outfile = tempfile::Builder::new().suffix(".pdf").tempfile()?;

    debug!("converting {} byte upload via {}", data.len(), program);
    let status = Command::new(program)
        .args(args)
        .arg(infile.path())
        .arg(outfile.path())
        .status()
        .map_err(|e| RemfsError::Conversion(format!("failed to run {}: {}", program, e)))?;
    if !status.success() {
        return Err(RemfsError::Conversion(format!(
            "{} exited with {}",
            program, status
        )));
    }

    let converted = std::fs::read(outfile.path())?;
    if converted.is_empty() {
        return Err(RemfsError::Conversion(format!(
            "{} produced no output",
            program
        )));
    }
    Ok(converted)
}
