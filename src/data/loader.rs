use crate::data::SequenceRecord;
use crate::error::PipelineError;
use crate::Result;
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cell-type label to FASTA path
pub type CellTypeSources = BTreeMap<String, PathBuf>;

/// Supported FASTA encodings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Fasta,
    GzippedFasta,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => FileFormat::GzippedFasta,
            _ => FileFormat::Fasta,
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedFasta)
    }
}

/// Parse a `LABEL=PATH` source argument
pub fn parse_source(spec: &str) -> std::result::Result<(String, PathBuf), String> {
    match spec.split_once('=') {
        Some((label, path)) if !label.trim().is_empty() && !path.trim().is_empty() => {
            Ok((label.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected LABEL=PATH, got `{}`", spec)),
    }
}

/// Loader configuration
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Maximum number of records to read per source (0 = unlimited)
    pub max_records: usize,
}

/// Reads FASTA sources into [`SequenceRecord`]s
#[derive(Debug, Default)]
pub struct FastaLoader {
    config: LoaderConfig,
}

impl FastaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load every source, in label order
    pub fn load_all(&self, sources: &CellTypeSources) -> Result<Vec<SequenceRecord>> {
        let mut records = Vec::new();
        for (cell_type, path) in sources {
            records.extend(self.load(path, cell_type)?);
        }
        info!("Loaded {} sequences from {} sources", records.len(), sources.len());
        Ok(records)
    }

    /// Load one FASTA file, tagging each record with `cell_type`
    pub fn load<P: AsRef<Path>>(&self, path: P, cell_type: &str) -> Result<Vec<SequenceRecord>> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path);
        debug!("Reading {:?} as {:?} for {}", path, format, cell_type);

        let file = File::open(path).map_err(|e| PipelineError::data_source(path, e))?;
        let records = if format.is_gzipped() {
            self.parse_records(BufReader::new(GzDecoder::new(file)), cell_type, path)?
        } else {
            self.parse_records(BufReader::new(file), cell_type, path)?
        };

        if records.is_empty() {
            warn!("No FASTA records found in {:?}", path);
        }
        info!("{}: {} sequences", cell_type, records.len());
        Ok(records)
    }

    fn parse_records<R: Read>(
        &self,
        reader: R,
        cell_type: &str,
        path: &Path,
    ) -> Result<Vec<SequenceRecord>> {
        let fasta = bio::io::fasta::Reader::new(reader);
        let mut records = Vec::new();

        for (i, result) in fasta.records().enumerate() {
            let record = result.map_err(|e| {
                PipelineError::data_source(path, format!("record {}: {}", i + 1, e))
            })?;
            if !record.seq().is_ascii() {
                return Err(PipelineError::data_source(
                    path,
                    format!("record {} has a non-ASCII sequence", i + 1),
                ));
            }
            let sequence = String::from_utf8_lossy(record.seq()).into_owned();
            records.push(SequenceRecord::new(record.id(), sequence, cell_type));

            if self.config.max_records > 0 && records.len() >= self.config.max_records {
                warn!("Reached maximum record limit: {}", self.config.max_records);
                break;
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path("cells.fa"), FileFormat::Fasta);
        assert_eq!(FileFormat::from_path("cells.fasta"), FileFormat::Fasta);
        assert_eq!(FileFormat::from_path("cells.fa.gz"), FileFormat::GzippedFasta);
    }

    #[test]
    fn test_parse_source() {
        assert_eq!(
            parse_source("HepG2=data/HepG2.fa").unwrap(),
            ("HepG2".to_string(), PathBuf::from("data/HepG2.fa"))
        );
        assert!(parse_source("HepG2").is_err());
        assert!(parse_source("=x.fa").is_err());
    }

    #[test]
    fn test_parse_simple_fasta() {
        let fasta = ">seq1 desc\nACGT\nGG\n>seq2\nttaa\n";
        let loader = FastaLoader::new();
        let records = loader
            .parse_records(Cursor::new(fasta), "K562", Path::new("mem.fa"))
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], SequenceRecord::new("seq1", "ACGTGG", "K562"));
        assert_eq!(records[1].sequence, "ttaa");
    }

    #[test]
    fn test_malformed_fasta() {
        let loader = FastaLoader::new();
        let err = loader
            .parse_records(Cursor::new("ACGT\n>seq\nAC\n"), "K562", Path::new("bad.fa"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataSource { .. }));
    }

    #[test]
    fn test_empty_header_id_accepted() {
        let records = FastaLoader::new()
            .parse_records(Cursor::new(">\nACGT\n>named\nGG\n"), "hESC", Path::new("mem.fa"))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "");
        assert_eq!(records[0].sequence, "ACGT");
    }

    #[test]
    fn test_non_ascii_sequence_rejected() {
        let err = FastaLoader::new()
            .parse_records(Cursor::new(">s\nAC\u{e9}GT\n"), "hESC", Path::new("bad.fa"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataSource { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = FastaLoader::new()
            .load("/nonexistent/cells.fa", "HepG2")
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataSource { .. }));
    }

    #[test]
    fn test_max_records() {
        let loader = FastaLoader::with_config(LoaderConfig { max_records: 1 });
        let records = loader
            .parse_records(Cursor::new(">a\nAC\n>b\nGT\n"), "X", Path::new("mem.fa"))
            .unwrap();
        assert_eq!(records.len(), 1);
    }
}
