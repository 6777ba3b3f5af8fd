pub mod record;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub use record::{header_line, LogFileId, LogRecord};

pub const DEFAULT_FLUSH_THRESHOLD: usize = 60;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("не удалось создать каталог журнала {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("не удалось записать заголовок в {path}: {source}")]
    Header {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("не удалось дописать {lines} строк в {path}: {source}")]
    Write {
        path: PathBuf,
        lines: usize,
        source: std::io::Error,
    },
}

/// Writes the CSV header when the file is missing or empty.
///
/// Returns `true` when a header was written. A non-empty file is left alone,
/// so repeated calls never duplicate the header.
pub fn ensure_header(path: &Path) -> Result<bool, LogError> {
    let needs_header = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };
    if !needs_header {
        return Ok(false);
    }

    let header_err = |source| LogError::Header {
        path: path.to_path_buf(),
        source,
    };
    let mut file = open_for_append(path).map_err(header_err)?;
    append_or_rollback(&mut file, header_line().as_bytes()).map_err(header_err)?;
    Ok(true)
}

#[derive(Debug, Clone)]
struct PendingLine {
    file: LogFileId,
    line: String,
}

/// In-memory batch of log lines awaiting a durable append.
///
/// Lines are kept in append order together with the file they belong to. A
/// flush performs one append per file; lines leave the buffer only after
/// their file was written successfully.
#[derive(Debug)]
pub struct BatchLogger {
    dir: PathBuf,
    threshold: usize,
    pending: Vec<PendingLine>,
}

impl BatchLogger {
    pub fn new(dir: impl Into<PathBuf>, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            dir: dir.into(),
            threshold,
            pending: Vec::with_capacity(threshold),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn append(&mut self, record: &LogRecord) {
        self.pending.push(PendingLine {
            file: record.file_id(),
            line: record.to_line(),
        });
    }

    pub fn should_flush(&self) -> bool {
        self.pending.len() >= self.threshold
    }

    pub fn flush(&mut self) -> Result<usize, LogError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        self.write_pending()
    }

    /// Flush regardless of the threshold. An empty buffer performs no I/O.
    pub fn force_flush(&mut self) -> Result<usize, LogError> {
        if self.pending.is_empty() {
            debug!("буфер журнала пуст, сбрасывать нечего");
            return Ok(0);
        }
        self.flush()
    }

    fn write_pending(&mut self) -> Result<usize, LogError> {
        fs::create_dir_all(&self.dir).map_err(|source| LogError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut batches: BTreeMap<&LogFileId, (String, usize)> = BTreeMap::new();
        for pending in &self.pending {
            let entry = batches.entry(&pending.file).or_default();
            entry.0.push_str(&pending.line);
            entry.1 += 1;
        }

        let mut written_files: Vec<LogFileId> = Vec::new();
        let mut written = 0_usize;
        let mut first_error = None;
        for (file, (block, lines)) in batches {
            let path = file.path_in(&self.dir);
            if let Err(err) = ensure_header(&path) {
                warn!(error = %err, "заголовок не записан, пробуем дописать данные");
            }

            match append_block(&path, &block) {
                Ok(()) => {
                    debug!(path = %path.display(), lines, "пакет записан в журнал");
                    written += lines;
                    written_files.push(file.clone());
                }
                Err(source) => {
                    if first_error.is_none() {
                        first_error = Some(LogError::Write {
                            path,
                            lines,
                            source,
                        });
                    }
                }
            }
        }

        self.pending.retain(|p| !written_files.contains(&p.file));

        match first_error {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }
}

/// A log file that can be cut back to an earlier length.
trait AppendTarget: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

fn open_for_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
}

fn append_block(path: &Path, block: &str) -> io::Result<()> {
    let mut file = open_for_append(path)?;
    append_or_rollback(&mut file, block.as_bytes())
}

/// Appends `block` at the end of `target` as a whole. On a write error the
/// target is truncated back to its previous length, so a torn batch never
/// stays in the file.
fn append_or_rollback<T: AppendTarget>(target: &mut T, block: &[u8]) -> io::Result<()> {
    let committed = target.seek(SeekFrom::End(0))?;
    let result = target.write_all(block).and_then(|()| target.flush());
    if let Err(err) = result {
        let rollback = target
            .truncate_to(committed)
            .and_then(|()| target.seek(SeekFrom::Start(committed)).map(drop));
        if let Err(rollback_err) = rollback {
            warn!(
                error = %rollback_err,
                length = committed,
                "не удалось откатить частично записанный пакет"
            );
        }
        return Err(err);
    }
    Ok(())
}
