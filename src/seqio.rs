//! Streaming FASTA and FASTQ readers and writers.
//!
//! FASTQ input is consumed read-by-read so that whole read files never sit
//! in memory; files ending in `.gz` are decompressed transparently.

use crate::error::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

/// A FASTA record: identifier, optional description and sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    /// Sequence identifier (text after '>' up to the first whitespace).
    pub id: String,
    /// Remainder of the header line, if any.
    pub description: Option<String>,
    /// Sequence, concatenated across lines.
    pub seq: String,
}

/// Sequential reader for FASTA data.
pub struct FastaReader<R: Read> {
    reader: BufReader<R>,
    line_buf: String,
    current_header: Option<String>,
}

impl FastaReader<File> {
    /// Opens a FASTA file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::open(path.as_ref())?))
    }
}

impl<R: Read> FastaReader<R> {
    /// Wraps any byte source in a FASTA reader.
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(1 << 20, inner),
            line_buf: String::with_capacity(256),
            current_header: None,
        }
    }

    fn next_line(&mut self) -> Result<bool> {
        self.line_buf.clear();
        Ok(self.reader.read_line(&mut self.line_buf)? > 0)
    }

    /// Reads the next FASTA record, or `None` at end of input.
    pub fn read_next(&mut self) -> Result<Option<FastaRecord>> {
        if self.current_header.is_none() {
            loop {
                if !self.next_line()? {
                    return Ok(None);
                }
                if self.line_buf.starts_with('>') {
                    self.current_header = Some(self.line_buf[1..].trim_end().to_string());
                    break;
                }
            }
        }
        let header = match self.current_header.take() {
            Some(h) => h,
            None => return Ok(None),
        };
        let mut seq = String::with_capacity(1024);
        loop {
            if !self.next_line()? {
                break;
            }
            if self.line_buf.starts_with('>') {
                self.current_header = Some(self.line_buf[1..].trim_end().to_string());
                break;
            }
            seq.push_str(self.line_buf.trim_end());
        }
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let description = parts
            .next()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(Some(FastaRecord {
            id,
            description,
            seq,
        }))
    }
}

impl<R: Read> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Writes one FASTA record with an unwrapped sequence line.
pub fn write_fasta_record<W: Write>(w: &mut W, header: &str, seq: &str) -> Result<()> {
    writeln!(w, ">{header}")?;
    writeln!(w, "{seq}")?;
    Ok(())
}

/// Writes a set of FASTA records to a file, one sequence line per record.
pub fn write_fasta_file(path: &Path, records: &[FastaRecord]) -> Result<()> {
    let mut w = std::io::BufWriter::new(File::create(path)?);
    for record in records {
        match &record.description {
            Some(d) => write_fasta_record(&mut w, &format!("{} {}", record.id, d), &record.seq)?,
            None => write_fasta_record(&mut w, &record.id, &record.seq)?,
        }
    }
    w.flush()?;
    Ok(())
}

/// A FASTQ record.
#[derive(Debug, Clone, PartialEq)]
pub struct FastqRecord {
    /// Full title line (text after '@', including any description).
    pub title: String,
    /// Nucleotide sequence.
    pub seq: String,
    /// Quality string (Phred+33 encoded).
    pub qual: String,
}

impl FastqRecord {
    /// Read name: the title up to the first whitespace.
    pub fn name(&self) -> &str {
        self.title.split_whitespace().next().unwrap_or("")
    }
}

/// Generic FASTQ reader over any byte source.
pub struct FastqReader<R: Read> {
    reader: BufReader<R>,
    line_buf: String,
}

impl<R: Read> FastqReader<R> {
    /// Wraps any byte source in a FASTQ reader.
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(1 << 20, inner),
            line_buf: String::with_capacity(512),
        }
    }

    /// Reads the next FASTQ record (4 lines), or `None` at end of input.
    pub fn read_next(&mut self) -> Result<Option<FastqRecord>> {
        self.line_buf.clear();
        if self.reader.read_line(&mut self.line_buf)? == 0 {
            return Ok(None);
        }
        let title = self
            .line_buf
            .trim_end()
            .strip_prefix('@')
            .unwrap_or(self.line_buf.trim_end())
            .to_string();
        if title.is_empty() {
            return Ok(None);
        }

        self.line_buf.clear();
        self.reader.read_line(&mut self.line_buf)?;
        let seq = self.line_buf.trim_end().to_string();

        // separator line, ignored
        self.line_buf.clear();
        self.reader.read_line(&mut self.line_buf)?;

        self.line_buf.clear();
        self.reader.read_line(&mut self.line_buf)?;
        let qual = self.line_buf.trim_end().to_string();

        Ok(Some(FastqRecord { title, seq, qual }))
    }
}

/// Auto-detecting FASTQ file reader; `.gz` paths are gunzipped on the fly.
pub enum FastqFile {
    /// Plain text FASTQ file.
    Plain(FastqReader<File>),
    /// Gzip-compressed FASTQ file.
    Gzipped(FastqReader<MultiGzDecoder<File>>),
}

impl FastqFile {
    /// Opens a FASTQ file, choosing the reader from the file extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext == "gz" {
            Ok(FastqFile::Gzipped(FastqReader::new(MultiGzDecoder::new(
                file,
            ))))
        } else {
            Ok(FastqFile::Plain(FastqReader::new(file)))
        }
    }

    /// Reads the next FASTQ record.
    pub fn read_next(&mut self) -> Result<Option<FastqRecord>> {
        match self {
            FastqFile::Plain(r) => r.read_next(),
            FastqFile::Gzipped(r) => r.read_next(),
        }
    }
}
