use crate::error::{Error, Result};
use crate::profile::ProfileRegistry;
use crate::structs::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str =
    "source_ip,destination_ip,source_port,destination_port,protocol,byte_estimate";

/// Write the records as CSV, one record per line after the header
pub fn write_csv(mut output: impl Write, records: &[SyntheticRecord]) -> std::io::Result<()> {
    writeln!(output, "{CSV_HEADER}")?;
    for r in records {
        writeln!(output, "{}", r.fields().join(","))?;
    }
    output.flush()
}

/// Export the records into a CSV file.
///
/// The data is first written next to the target and renamed once complete, so
/// a failure never leaves a truncated file behind.
pub fn export_csv(path: impl AsRef<Path>, records: &[SyntheticRecord]) -> Result<()> {
    let path = path.as_ref();
    let output_err = |source| Error::Output {
        path: path.to_path_buf(),
        source,
    };
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = File::create(&partial).and_then(|f| write_csv(BufWriter::new(f), records));
    if let Err(e) = written.and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(output_err(e));
    }
    log::info!("{} records saved into {}", records.len(), path.display());
    Ok(())
}

/// Print the records on a console-like output
pub fn print_records(mut output: impl Write, records: &[SyntheticRecord]) -> std::io::Result<()> {
    writeln!(output, "Simulated network events:")?;
    for r in records {
        writeln!(output, "{r}")?;
    }
    output.flush()
}

/// Dump the whole profile as JSON
pub fn export_profile(path: impl AsRef<Path>, registry: &ProfileRegistry) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })?;
    let mut output = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut output, registry)?;
    output.flush().map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Profile saved into {}", path.display());
    Ok(())
}
