//! Spike file export
//!
//! One spike per line, `<gid> <time>` with exactly four fractional digits,
//! written to `<output_path>/<file_name>_<rank>.<file_extension>`. When
//! overwriting is disabled an existing file is a fatal pre-flight error, so
//! the check happens at construction, before the simulation starts.

use crate::error::CliResult;
use cabletree_core::Spike;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes spike streams for one rank.
#[derive(Debug)]
pub struct SpikeFileExporter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl SpikeFileExporter {
    /// Open the spike file for the given rank, refusing to clobber an
    /// existing file unless `over_write` is set.
    pub fn new(
        file_name: &str,
        output_path: &str,
        file_extension: &str,
        over_write: bool,
        rank: usize,
    ) -> CliResult<Self> {
        let path = Self::output_file_path(file_name, output_path, file_extension, rank);
        if !over_write && path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "spike file {} exists and over_write is false",
                    path.display()
                ),
            )
            .into());
        }
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { writer, path })
    }

    /// The indexed output path for a rank.
    pub fn output_file_path(
        file_name: &str,
        output_path: &str,
        file_extension: &str,
        rank: usize,
    ) -> PathBuf {
        Path::new(output_path).join(format!("{}_{}.{}", file_name, rank, file_extension))
    }

    /// Append a batch of spikes.
    pub fn output(&mut self, spikes: &[Spike]) -> CliResult<()> {
        for spike in spikes {
            write!(self.writer, "{} {:.4}\n", spike.source.gid, spike.time)?;
        }
        Ok(())
    }

    /// Flush buffered output to disk.
    pub fn flush(&mut self) -> CliResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Path of the file being written.
    pub fn file_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabletree_core::CellMember;
    use tempfile::tempdir;

    #[test]
    fn path_template_includes_rank() {
        let path = SpikeFileExporter::output_file_path("spikes", "/out", "gdf", 3);
        assert_eq!(path, PathBuf::from("/out/spikes_3.gdf"));
    }

    #[test]
    fn writes_fixed_point_lines() {
        let dir = tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let mut exporter = SpikeFileExporter::new("spikes", out, "gdf", true, 3).unwrap();
        exporter
            .output(&[
                Spike::new(CellMember::new(7, 0), 1.2345),
                Spike::new(CellMember::new(9, 0), 3.0001),
            ])
            .unwrap();
        exporter.flush().unwrap();

        let written = std::fs::read_to_string(exporter.file_path()).unwrap();
        assert_eq!(written, "7 1.2345\n9 3.0001\n");
    }

    #[test]
    fn time_is_rounded_to_four_digits() {
        let dir = tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let mut exporter = SpikeFileExporter::new("spikes", out, "gdf", true, 0).unwrap();
        exporter
            .output(&[Spike::new(CellMember::new(0, 0), 0.123456)])
            .unwrap();
        exporter.flush().unwrap();

        let written = std::fs::read_to_string(exporter.file_path()).unwrap();
        assert_eq!(written, "0 0.1235\n");
    }

    #[test]
    fn refuses_existing_file_without_overwrite() {
        let dir = tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let path = SpikeFileExporter::output_file_path("spikes", out, "gdf", 0);
        std::fs::write(&path, "old").unwrap();

        assert!(SpikeFileExporter::new("spikes", out, "gdf", false, 0).is_err());
        // with over_write the file is truncated
        let exporter = SpikeFileExporter::new("spikes", out, "gdf", true, 0).unwrap();
        drop(exporter);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
