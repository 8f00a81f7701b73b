use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// TranscriptSink receives every console submission and the bytes echoed back
pub trait TranscriptSink: Send {
    fn record(&mut self, command: &str, output: &str) -> io::Result<()>;

    /// Flush and close; returns where the transcript was kept, if anywhere
    fn finish(&mut self) -> io::Result<Option<String>>;
}

/// TranscriptStore opens one transcript per provisioned switch
pub trait TranscriptStore: Send + Sync {
    fn open(&self, hostname: &str) -> io::Result<Box<dyn TranscriptSink>>;
}

/// Writes `<dir>/<hostname>_<YYYYmmdd_HHMMSS>.log`
pub struct FileTranscriptStore {
    dir: PathBuf,
}

impl FileTranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn open(&self, hostname: &str) -> io::Result<Box<dyn TranscriptSink>> {
        std::fs::create_dir_all(&self.dir)?;

        let now = Utc::now();
        let safe_name = hostname.replace(['/', '\\'], "_");
        let stem = format!("{}_{}", safe_name, now.format("%Y%m%d_%H%M%S"));
        let (path, file) = create_unique(&self.dir, &stem)?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "# {} console transcript, started {}", hostname, now.to_rfc3339())?;

        tracing::debug!("Transcript for {} at {}", hostname, path.display());
        Ok(Box::new(FileTranscript { path, writer }))
    }
}

/// `<stem>.log`, or `<stem>_2.log` and up when a transcript for the same
/// hostname was started within the same second. Existing files are never
/// truncated.
fn create_unique(dir: &Path, stem: &str) -> io::Result<(PathBuf, File)> {
    let mut attempt = 1;
    loop {
        let filename = if attempt == 1 {
            format!("{}.log", stem)
        } else {
            format!("{}_{}.log", stem, attempt)
        };
        let path = dir.join(filename);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 1000 => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

struct FileTranscript {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TranscriptSink for FileTranscript {
    fn record(&mut self, command: &str, output: &str) -> io::Result<()> {
        writeln!(self.writer, ">>> {}", command)?;
        if !output.is_empty() {
            writeln!(self.writer, "{}", output.trim_end())?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<Option<String>> {
        self.writer.flush()?;
        Ok(Some(self.path.display().to_string()))
    }
}

/// Discards everything; used when transcripts are disabled
pub struct NullTranscriptStore;

impl TranscriptStore for NullTranscriptStore {
    fn open(&self, _hostname: &str) -> io::Result<Box<dyn TranscriptSink>> {
        Ok(Box::new(NullTranscript))
    }
}

pub struct NullTranscript;

impl TranscriptSink for NullTranscript {
    fn record(&mut self, _command: &str, _output: &str) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> io::Result<Option<String>> {
        Ok(None)
    }
}
