use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, LineWriter, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use log::{debug, error};
use tokio::runtime::Runtime;
use crate::errors::MichiError::{BackendError, InvalidArgumentError, NotFoundError};
use crate::errors::{MichiError, MichiResult};
use crate::services::ObjectStore;
use crate::utils::mode::{ModeKind, OpenMode};
use crate::utils::parser::ObjectLocation;
use crate::utils::text::Newline;

pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Open file on either backend.
///
/// The handle is released when it goes out of scope: buffered data is flushed and
/// remote objects are uploaded. Dropping can only log a failure, call [FileHandle::close]
/// (or use `FileAccess::with_file`) to get the error.
///
/// Dropping a handle with pending remote writes blocks on the upload, so it must not
/// happen inside an async task.
pub struct FileHandle {
    name: String,
    mode: OpenMode,
    newline: Newline,
    stream: Option<Stream>,
}

enum Stream {
    Local(LocalStream),
    Remote(RemoteStream),
}

enum LocalStream {
    Raw(File),
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
    Line(LineWriter<File>),
}

impl LocalStream {
    fn new(file: File, mode: &OpenMode, buffering: Option<usize>) -> Self {
        if mode.is_update() {
            return Self::Raw(file);
        }
        match (mode.readable(), buffering) {
            (_, Some(0)) => Self::Raw(file),
            (true, size) => Self::Reader(BufReader::with_capacity(size.unwrap_or(DEFAULT_BUFFER_SIZE), file)),
            (false, Some(1)) if !mode.is_binary() => Self::Line(LineWriter::new(file)),
            (false, size) => Self::Writer(BufWriter::with_capacity(size.unwrap_or(DEFAULT_BUFFER_SIZE), file)),
        }
    }

    fn reader(&mut self) -> io::Result<&mut dyn Read> {
        match self {
            Self::Raw(file) => Ok(file),
            Self::Reader(reader) => Ok(reader),
            Self::Writer(_) | Self::Line(_) => Err(not_readable()),
        }
    }

    fn writer(&mut self) -> io::Result<&mut dyn Write> {
        match self {
            Self::Raw(file) => Ok(file),
            Self::Writer(writer) => Ok(writer),
            Self::Line(writer) => Ok(writer),
            Self::Reader(_) => Err(not_writable()),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Raw(file) => file.seek(pos),
            Self::Reader(reader) => reader.seek(pos),
            Self::Writer(writer) => writer.seek(pos),
            Self::Line(writer) => {
                writer.flush()?;
                writer.get_mut().seek(pos)
            }
        }
    }

    fn close(self) -> io::Result<()> {
        match self {
            Self::Raw(mut file) => file.flush(),
            Self::Reader(_) => Ok(()),
            Self::Writer(mut writer) => writer.flush(),
            Self::Line(mut writer) => writer.flush(),
        }
    }
}

/// Remote object staged in memory. Reads come from the downloaded content,
/// writes are uploaded as a whole when the handle is closed.
pub(crate) struct RemoteStream {
    location: ObjectLocation,
    store: Arc<dyn ObjectStore>,
    runtime: Arc<Runtime>,
    buffer: Cursor<Vec<u8>>,
    append: bool,
    pending: bool,
}

impl RemoteStream {
    pub(crate) fn open(
        location: ObjectLocation,
        store: Arc<dyn ObjectStore>,
        runtime: Arc<Runtime>,
        mode: &OpenMode,
        capacity: usize,
    ) -> MichiResult<Self> {
        let content = match mode.kind() {
            ModeKind::Read => runtime.block_on(store.get(&location))?,
            ModeKind::Append => match runtime.block_on(store.get(&location)) {
                Ok(content) => content,
                Err(NotFoundError(_)) => Vec::with_capacity(capacity),
                Err(e) => return Err(e),
            },
            ModeKind::Write => Vec::with_capacity(capacity),
            ModeKind::CreateNew => {
                if runtime.block_on(store.exists(&location))? {
                    error!("Remote object already exists: {}", location);
                    return Err(BackendError(format!("{} already exists", location)));
                }
                Vec::with_capacity(capacity)
            }
        };

        let append = mode.kind() == ModeKind::Append;
        let mut buffer = Cursor::new(content);
        if append {
            buffer.set_position(buffer.get_ref().len() as u64);
        }

        Ok(Self {
            location,
            store,
            runtime,
            buffer,
            append,
            // Every mode except `r`/`r+` creates the object even without writes.
            pending: mode.kind() != ModeKind::Read,
        })
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.append {
            self.buffer.seek(SeekFrom::End(0))?;
        }
        self.pending = true;
        self.buffer.write(buf)
    }

    fn close(self) -> MichiResult<()> {
        if !self.pending {
            return Ok(());
        }
        let content = self.buffer.into_inner();
        debug!("Upload {} bytes to {} on close", content.len(), self.location);
        self.runtime.block_on(self.store.put(&self.location, content))
    }
}

fn not_readable() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "File not open for reading")
}

fn not_writable() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "File not open for writing")
}

impl FileHandle {
    pub(crate) fn local(name: &str, mode: OpenMode, newline: Newline, file: File, buffering: Option<usize>) -> Self {
        let stream = LocalStream::new(file, &mode, buffering);
        Self {
            name: name.to_string(),
            mode,
            newline,
            stream: Some(Stream::Local(stream)),
        }
    }

    pub(crate) fn remote(name: &str, mode: OpenMode, newline: Newline, stream: RemoteStream) -> Self {
        Self {
            name: name.to_string(),
            mode,
            newline,
            stream: Some(Stream::Remote(stream)),
        }
    }

    /// Path string the handle was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> &OpenMode {
        &self.mode
    }

    /// Read the rest of the file as text, applying the newline translation.
    pub fn read_text(&mut self) -> MichiResult<String> {
        self.ensure_text()?;
        let bytes = self.read_bytes()?;
        let text = String::from_utf8(bytes)
            .map_err(|e| BackendError(format!("{} is not valid UTF-8: {}", self.name, e)))?;
        Ok(self.newline.decode(&text))
    }

    /// Write text, returning the number of characters written.
    pub fn write_text(&mut self, text: &str) -> MichiResult<usize> {
        self.ensure_text()?;
        let encoded = self.newline.encode(text);
        self.write_all(encoded.as_bytes())
            .map_err(|e| MichiError::from_io(e, &self.name))?;
        Ok(text.chars().count())
    }

    /// Read the rest of the file.
    pub fn read_bytes(&mut self) -> MichiResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)
            .map_err(|e| MichiError::from_io(e, &self.name))?;
        Ok(bytes)
    }

    /// Flush and release the handle, reporting what `Drop` could only log.
    pub fn close(mut self) -> MichiResult<()> {
        self.close_stream()
    }

    fn ensure_text(&self) -> MichiResult<()> {
        if self.mode.is_binary() {
            return Err(InvalidArgumentError(format!("{} is open in binary mode {}", self.name, self.mode)));
        }
        Ok(())
    }

    fn stream(&mut self) -> io::Result<&mut Stream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "I/O operation on closed file"))
    }

    fn close_stream(&mut self) -> MichiResult<()> {
        match self.stream.take() {
            None => Ok(()),
            Some(Stream::Local(stream)) => stream.close().map_err(|e| MichiError::from_io(e, &self.name)),
            Some(Stream::Remote(stream)) => stream.close(),
        }
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.mode.readable() {
            return Err(not_readable());
        }
        match self.stream()? {
            Stream::Local(stream) => stream.reader()?.read(buf),
            Stream::Remote(stream) => stream.buffer.read(buf),
        }
    }
}

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.writable() {
            return Err(not_writable());
        }
        match self.stream()? {
            Stream::Local(stream) => stream.writer()?.write(buf),
            Stream::Remote(stream) => stream.write(buf),
        }
    }

    /// Remote content stays staged until close, only local buffers are flushed here.
    fn flush(&mut self) -> io::Result<()> {
        match self.stream()? {
            Stream::Local(LocalStream::Reader(_)) => Ok(()),
            Stream::Local(stream) => stream.writer()?.flush(),
            Stream::Remote(_) => Ok(()),
        }
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self.stream()? {
            Stream::Local(stream) => stream.seek(pos),
            Stream::Remote(stream) => stream.buffer.seek(pos),
        }
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close_stream() {
            error!("Failed to close {}: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryStore;
    use crate::utils::parser::{parse_object_location, Scheme};
    use tempfile::TempDir;

    fn runtime() -> Arc<Runtime> {
        Arc::new(tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap())
    }

    fn remote_handle(store: &Arc<MemoryStore>, runtime: &Arc<Runtime>, path: &str, mode: &str) -> MichiResult<FileHandle> {
        let mode = OpenMode::parse(mode)?;
        let location = parse_object_location(path)?;
        let stream = RemoteStream::open(location, store.clone(), runtime.clone(), &mode, DEFAULT_BUFFER_SIZE)?;
        Ok(FileHandle::remote(path, mode, Newline::Universal, stream))
    }

    #[test]
    fn test_local_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");

        let file = OpenMode::parse("w").unwrap().to_open_options().open(&path).unwrap();
        let mut handle = FileHandle::local("data.txt", OpenMode::parse("w").unwrap(), Newline::Universal, file, None);
        assert_eq!(handle.write_text("こんにちは\n").unwrap(), 6);
        assert!(handle.read_bytes().is_err());
        handle.close().unwrap();

        let file = File::open(&path).unwrap();
        let mut handle = FileHandle::local("data.txt", OpenMode::parse("r").unwrap(), Newline::Universal, file, None);
        assert_eq!(handle.read_text().unwrap(), "こんにちは\n");
        assert!(handle.write(b"x").is_err());
    }

    #[test]
    fn test_local_drop_flushes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dropped.bin");

        {
            let file = File::create(&path).unwrap();
            let mut handle = FileHandle::local("dropped.bin", OpenMode::parse("wb").unwrap(), Newline::Untranslated, file, Some(4096));
            handle.write_all(&[7; 100]).unwrap();
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 100);
    }

    #[test]
    fn test_remote_write_uploads_on_close() {
        let store = Arc::new(MemoryStore::new(Scheme::Gs));
        let runtime = runtime();

        let mut handle = remote_handle(&store, &runtime, "gs://bucket/out.bin", "wb").unwrap();
        handle.write_all(&[1; 100]).unwrap();
        handle.flush().unwrap();
        assert!(store.is_empty());
        handle.close().unwrap();

        let location = parse_object_location("gs://bucket/out.bin").unwrap();
        assert_eq!(runtime.block_on(store.get(&location)).unwrap().len(), 100);
    }

    #[test]
    fn test_remote_append_and_read_modes() {
        let store = Arc::new(MemoryStore::new(Scheme::Gs));
        store.insert("gs://bucket/log.txt", b"first\r\n").unwrap();
        let runtime = runtime();

        let mut handle = remote_handle(&store, &runtime, "gs://bucket/log.txt", "a").unwrap();
        handle.write_text("second\n").unwrap();
        drop(handle);

        let mut handle = remote_handle(&store, &runtime, "gs://bucket/log.txt", "r").unwrap();
        assert_eq!(handle.read_text().unwrap(), "first\nsecond\n");
        assert!(handle.write_text("nope").is_err());

        let error = remote_handle(&store, &runtime, "gs://bucket/none.txt", "r").err().unwrap();
        assert!(error.is_not_found());
        let error = remote_handle(&store, &runtime, "gs://bucket/log.txt", "x").err().unwrap();
        assert!(matches!(error, BackendError(_)));
    }

    #[test]
    fn test_remote_read_only_close_does_not_upload() {
        let store = Arc::new(MemoryStore::new(Scheme::Gs));
        let runtime = runtime();

        let handle = remote_handle(&store, &runtime, "gs://bucket/empty.txt", "w").unwrap();
        handle.close().unwrap();
        assert_eq!(store.len(), 1);

        let mut handle = remote_handle(&store, &runtime, "gs://bucket/empty.txt", "r+").unwrap();
        assert_eq!(handle.read_text().unwrap(), "");
        handle.close().unwrap();
        assert_eq!(store.len(), 1);
    }
}
