//! Output streams.
//!
//! Three logical streams back a scan:
//!
//! - **raw** - every online host and every found file, in discovery order
//! - **filtered** - file URLs matching the extension filter
//! - **binary** - binary findings, buffered in memory and written grouped
//!   by `scheme://host` in sorted order when the sink closes
//!
//! All writes go through one mutex; the streams themselves are boxed
//! writers so tests can swap the files for in-memory buffers.

pub mod summary;

use std::collections::BTreeMap;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use url::Url;

use crate::config::OUTPUT_BUFFER_SIZE;

/// One binary finding: a URL and the content-type it advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BinaryFinding {
    url: String,
    content_type: String,
}

struct SinkInner {
    raw: BufWriter<Box<dyn Write + Send>>,
    filtered: BufWriter<Box<dyn Write + Send>>,
    binary: BufWriter<Box<dyn Write + Send>>,
    /// Findings grouped by `scheme://host`; the map is ordered, which is
    /// exactly the order groups are emitted in at close.
    binary_findings: BTreeMap<String, Vec<BinaryFinding>>,
    closed: bool,
}

/// Concurrent-safe, buffered writer for the three output streams.
pub struct OutputSink {
    inner: Mutex<SinkInner>,
}

/// Handles to the in-memory buffers backing a test sink.
#[derive(Clone)]
pub struct MemoryOutputs {
    pub raw: SharedBuffer,
    pub filtered: SharedBuffer,
    pub binary: SharedBuffer,
}

/// A `Write` target whose contents remain readable after the sink is
/// closed.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        SharedBuffer::default()
    }

    /// The accumulated bytes as a UTF-8 string.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink {
    /// Opens `raw.txt`, `filtered.txt` and `binary_found.txt` in the
    /// output directory, truncating existing files.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or any of the files cannot be
    /// created.
    pub fn create(output_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let raw = std::fs::File::create(output_dir.join("raw.txt"))?;
        let filtered = std::fs::File::create(output_dir.join("filtered.txt"))?;
        let binary = std::fs::File::create(output_dir.join("binary_found.txt"))?;
        log::info!(
            "Output files created in {} (raw.txt, filtered.txt, binary_found.txt)",
            output_dir.display()
        );
        Ok(Self::from_writers(
            Box::new(raw),
            Box::new(filtered),
            Box::new(binary),
        ))
    }

    /// Builds a sink over arbitrary writers.
    pub fn from_writers(
        raw: Box<dyn Write + Send>,
        filtered: Box<dyn Write + Send>,
        binary: Box<dyn Write + Send>,
    ) -> Self {
        OutputSink {
            inner: Mutex::new(SinkInner {
                raw: BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, raw),
                filtered: BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, filtered),
                binary: BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, binary),
                binary_findings: BTreeMap::new(),
                closed: false,
            }),
        }
    }

    /// Builds a sink over in-memory buffers, returning the buffers for
    /// later inspection.
    pub fn in_memory() -> (Self, MemoryOutputs) {
        let outputs = MemoryOutputs {
            raw: SharedBuffer::new(),
            filtered: SharedBuffer::new(),
            binary: SharedBuffer::new(),
        };
        let sink = Self::from_writers(
            Box::new(outputs.raw.clone()),
            Box::new(outputs.filtered.clone()),
            Box::new(outputs.binary.clone()),
        );
        (sink, outputs)
    }

    /// Appends a line to the raw stream.
    pub fn write_raw(&self, line: &str) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        writeln!(inner.raw, "{line}")
    }

    /// Appends a line to the filtered stream.
    pub fn write_filtered(&self, line: &str) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        writeln!(inner.filtered, "{line}")
    }

    /// Records a binary finding for grouped output at close.
    ///
    /// The expected line format is `URL with Content-Type: CT`. Findings
    /// are grouped by `scheme://host`; a URL already present in its group
    /// is dropped, which makes the binary stream globally deduplicated.
    ///
    /// # Errors
    ///
    /// A line that does not match the expected format is an error.
    pub fn write_binary(&self, line: &str) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }

        let (file_url, content_type) = line
            .split_once(" with Content-Type: ")
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid binary output format: {line}"),
                )
            })?;
        let file_url = file_url.trim();
        let content_type = content_type.trim();

        let group = host_group(file_url).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("binary finding has no parseable host: {file_url}"),
            )
        })?;

        let findings = inner.binary_findings.entry(group).or_default();
        if findings.iter().any(|finding| finding.url == file_url) {
            return Ok(());
        }
        findings.push(BinaryFinding {
            url: file_url.to_string(),
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    /// Flushes the raw and filtered streams, emits the grouped binary
    /// findings and closes all three streams. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first flush or write error encountered; later streams
    /// are still flushed on a best-effort basis.
    pub fn close(&self) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        log::info!("Closing output files and flushing buffers");

        let mut first_error: Option<io::Error> = None;
        let mut note = |result: io::Result<()>| {
            if let Err(error) = result {
                log::error!("Output flush failed: {error}");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        };

        note(inner.raw.flush());
        note(inner.filtered.flush());

        // The binary artifact is produced only now, so its on-disk order
        // is independent of worker scheduling.
        let findings = std::mem::take(&mut inner.binary_findings);
        let total: usize = findings.values().map(Vec::len).sum();
        log::info!("Writing {total} binary findings grouped by host");
        note(write_grouped_findings(&mut inner.binary, &findings));
        note(inner.binary.flush());

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Writes every group as a `=== host (n files) ===` header followed by
/// its URLs in insertion order.
fn write_grouped_findings(
    writer: &mut impl Write,
    findings: &BTreeMap<String, Vec<BinaryFinding>>,
) -> io::Result<()> {
    for (group, group_findings) in findings {
        if group_findings.is_empty() {
            continue;
        }
        write!(writer, "\n=== {} ({} files) ===\n", group, group_findings.len())?;
        for finding in group_findings {
            writeln!(writer, "{}", finding.url)?;
        }
    }
    Ok(())
}

/// Group key of a finding: `scheme://host`, keeping an explicit
/// non-default port.
fn host_group(file_url: &str) -> Option<String> {
    let url = Url::parse(file_url).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
