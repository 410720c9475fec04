//! Sequential file writing with explicit sealing.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use shardsplit_common::{Result, error::Error};

/// A sequential writer with an explicit `seal()` that commits the written data.
///
/// Data written through `write_all` is not guaranteed to be durable (or even visible)
/// until `seal` returns successfully. Once sealed, further writes fail.
pub trait SealingWrite: Send {
    /// Appends the entire buffer; either all bytes are written or an error is returned.
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Flushes buffered data and syncs it to the storage medium.
    fn seal(&mut self) -> std::io::Result<()>;
}

/// A buffered file writer implementing [`SealingWrite`].
pub struct FileWriter {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileWriter {
    /// Creates (or truncates) the file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<FileWriter> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(FileWriter {
            path,
            file: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SealingWrite for FileWriter {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?
            .write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?;
        file.flush()?;
        let file = file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

/// Writes `content` to `path` through a sibling temporary file followed by a rename.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut writer = FileWriter::create(&tmp)
        .map_err(|e| Error::io(format!("create {}", tmp.display()), e))?;
    writer
        .write_all(content)
        .and_then(|_| writer.seal())
        .map_err(|e| Error::io(format!("write {}", tmp.display()), e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        Error::io(
            format!("rename {} to {}", tmp.display(), path.display()),
            e,
        )
    })?;
    Ok(())
}
