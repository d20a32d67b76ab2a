//! # Append-Only Log
//!
//! Durability for write commands: every successful write is appended to a
//! plain-text log as the exact line the client sent, and replayed through
//! the same line parser and evaluator on startup.
//!
//! ## Durability Gate
//!
//! A command is appended only *after* the store has already applied it and
//! produced a non-error reply. A command that fails type-checking (a
//! `WRONGTYPE`, a bad arity) never reaches the log — replaying the log can
//! never fail partway through for a reason the original run didn't also hit.
//!
//! ## I/O Model
//!
//! Appends go through a `std::fs::File` behind a `parking_lot::Mutex`,
//! matching the synchronous-file, single-writer discipline of the original
//! log. Call sites that run on the async runtime are expected to keep
//! individual commands small; there is no internal buffering beyond what
//! the OS page cache gives a `flush()`ed file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// An append-only command log backed by a single file.
pub struct Aol {
    file: Mutex<File>,
    path: PathBuf,
}

impl Aol {
    /// Opens (creating if necessary) the log at `path` for appending.
    ///
    /// Does not replay existing content — call [`Aol::replay`] first if the
    /// caller wants prior commands re-applied, then construct the `Aol` for
    /// subsequent appends.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Aol {
            file: Mutex::new(file),
            path,
        })
    }

    /// Reads every complete line already in the log at `path` and calls
    /// `apply` with each one, in file order. A missing file is treated as an
    /// empty log, not an error, since a fresh deployment has nothing to
    /// replay.
    ///
    /// A partial trailing line (no terminating `\n`, e.g. left behind by a
    /// crash mid-`append`) is discarded rather than replayed — the log is
    /// treated as ending at the last newline.
    pub fn replay(path: impl AsRef<Path>, mut apply: impl FnMut(&[u8])) -> io::Result<()> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let bytes_read = reader.read_until(b'\n', &mut buf)?;
            if bytes_read == 0 {
                break;
            }
            if buf.last() != Some(&b'\n') {
                break;
            }
            buf.pop();
            if buf.is_empty() {
                continue;
            }
            apply(&buf);
        }
        Ok(())
    }

    /// Appends `line` (without a trailing newline) to the log and flushes.
    pub fn append(&self, line: &[u8]) -> io::Result<()> {
        let mut file = self.file.lock();
        file.write_all(line)?;
        file.write_all(b"\n")?;
        file.flush()
    }

    /// Path this log was opened against.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and drops the underlying file handle.
    pub fn close(self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;

    static FILE_LOCK: StdMutex<()> = StdMutex::new(());
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_path(name: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("fkv-aol-test-{name}-{n}-{}.log", std::process::id()))
    }

    #[test]
    fn append_and_replay_roundtrip() {
        let _guard = FILE_LOCK.lock().unwrap();
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        {
            let aol = Aol::open(&path).unwrap();
            aol.append(b"SET a 1").unwrap();
            aol.append(b"SET b 2").unwrap();
            aol.close().unwrap();
        }

        let mut lines = Vec::new();
        Aol::replay(&path, |line| lines.push(line.to_vec())).unwrap();

        assert_eq!(lines, vec![b"SET a 1".to_vec(), b"SET b 2".to_vec()]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_discards_undelimited_trailing_line() {
        let _guard = FILE_LOCK.lock().unwrap();
        let path = temp_path("truncated");
        let _ = std::fs::remove_file(&path);

        std::fs::write(&path, b"SET a 1\nSET b 2\nSET c 3").unwrap();

        let mut lines = Vec::new();
        Aol::replay(&path, |line| lines.push(line.to_vec())).unwrap();
        assert_eq!(lines, vec![b"SET a 1".to_vec(), b"SET b 2".to_vec()]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_of_missing_file_is_empty() {
        let _guard = FILE_LOCK.lock().unwrap();
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);

        let mut lines: Vec<Vec<u8>> = Vec::new();
        Aol::replay(&path, |line| lines.push(line.to_vec())).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn append_is_durable_across_reopen() {
        let _guard = FILE_LOCK.lock().unwrap();
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        {
            let aol = Aol::open(&path).unwrap();
            aol.append(b"SET a 1").unwrap();
        }
        {
            let aol = Aol::open(&path).unwrap();
            aol.append(b"SET b 2").unwrap();
        }

        let mut lines = Vec::new();
        Aol::replay(&path, |line| lines.push(line.to_vec())).unwrap();
        assert_eq!(lines, vec![b"SET a 1".to_vec(), b"SET b 2".to_vec()]);
        let _ = std::fs::remove_file(&path);
    }
}
