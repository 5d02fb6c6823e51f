use crate::error::{LogError, LogResult};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::SystemTime;

/// The current log file plus its timestamped archives inside one directory.
#[derive(Clone, Debug)]
pub struct LogFile {
    directory: PathBuf,
    prefix: String,
}

impl LogFile {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    pub fn current_path(&self) -> PathBuf {
        self.directory.join(format!("{}.log", self.prefix))
    }

    /// Renames the current file to an archive when it is larger than
    /// `max_bytes`. Returns the archive path when a rotation happened.
    pub fn rotate_if_needed(&self, max_bytes: u64) -> LogResult<Option<PathBuf>> {
        let current = self.current_path();
        let size = match fs::metadata(&current) {
            Ok(metadata) => metadata.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(LogError::io("stat log file", current, err)),
        };
        if size <= max_bytes {
            return Ok(None);
        }

        let archive = self.next_archive_path();
        fs::rename(&current, &archive)
            .map_err(|err| LogError::io("rotate log file", &current, err))?;
        Ok(Some(archive))
    }

    /// Deletes the oldest archives until at most `max_files` remain.
    pub fn prune_archives(&self, max_files: usize) -> LogResult<Vec<PathBuf>> {
        let archives = self.archives()?;
        if archives.len() <= max_files {
            return Ok(Vec::new());
        }

        let excess = archives.len() - max_files;
        let mut removed = Vec::with_capacity(excess);
        for path in archives.into_iter().take(excess) {
            fs::remove_file(&path).map_err(|err| LogError::io("remove archive", &path, err))?;
            removed.push(path);
        }
        Ok(removed)
    }

    pub fn append(&self, block: &str) -> LogResult<()> {
        fs::create_dir_all(&self.directory)
            .map_err(|err| LogError::io("create log directory", &self.directory, err))?;
        let current = self.current_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current)
            .map_err(|err| LogError::io("open log file", &current, err))?;
        file.write_all(block.as_bytes())
            .map_err(|err| LogError::io("append log file", &current, err))
    }

    /// Archive files for this prefix, oldest first.
    pub fn archives(&self) -> LogResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(LogError::io("list log directory", &self.directory, err)),
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| LogError::io("list log directory", &self.directory, err))?;
            if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.is_archive_name(name) {
                continue;
            }
            let created = entry
                .metadata()
                .ok()
                .and_then(|metadata| metadata.created().or_else(|_| metadata.modified()).ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            archives.push((created, name.to_string(), entry.path()));
        }

        archives.sort();
        Ok(archives.into_iter().map(|(_, _, path)| path).collect())
    }

    fn is_archive_name(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(".log"))
            .is_some_and(|stamp| stamp.starts_with(|ch: char| ch.is_ascii_digit()))
    }

    // Collision suffixes sort after the bare stamp so name order stays chronological.
    fn next_archive_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string();
        let candidate = self.directory.join(format!("{}-{stamp}.log", self.prefix));
        if !candidate.exists() {
            return candidate;
        }
        let mut counter = 1u32;
        loop {
            let candidate = self
                .directory
                .join(format!("{}-{stamp}_{counter:03}.log", self.prefix));
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}
