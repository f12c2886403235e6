//! Source and destination suppliers
//!
//! The driver only ever sees relative paths (`com/example/Foo.java`); suppliers map
//! them to a directory tree, a zip archive or memory and declare the character
//! encoding of the files they hand out.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Character encodings a source file may be stored in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    /// ISO-8859-1
    Latin1,
}

impl Encoding {
    pub fn decode(self, bytes: &[u8]) -> io::Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Characters outside ISO-8859-1 are written as `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Ok(Encoding::Latin1),
            other => Err(format!("unsupported encoding '{other}'")),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "UTF-8"),
            Encoding::Latin1 => write!(f, "ISO-8859-1"),
        }
    }
}

/// Normalize a relative path: forward slashes, no leading `/`.
fn relative(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Where source files come from.
pub trait InputSupplier: Send + Sync {
    /// Raw bytes of a file and the encoding they are stored in, `None` when the
    /// supplier does not have it.
    fn read(&self, path: &str) -> io::Result<Option<(Vec<u8>, Encoding)>>;
}

/// Where rewritten files go.
pub trait OutputSupplier: Send + Sync {
    fn write(&self, path: &str, data: &[u8]) -> io::Result<()>;

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Read a file and decode it with the encoding its supplier declares.
pub fn read_text(input: &dyn InputSupplier, path: &str) -> io::Result<Option<(String, Encoding)>> {
    let Some((bytes, encoding)) = input.read(path)? else {
        return Ok(None);
    };
    encoding.decode(&bytes).map(|text| Some((text, encoding)))
}

/// A directory tree, usable as input and as output.
#[derive(Debug, Clone)]
pub struct FolderSupplier {
    root: PathBuf,
    encoding: Encoding,
}

impl FolderSupplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            encoding: Encoding::Utf8,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(relative(path))
    }
}

impl InputSupplier for FolderSupplier {
    fn read(&self, path: &str) -> io::Result<Option<(Vec<u8>, Encoding)>> {
        match fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Some((bytes, self.encoding))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl OutputSupplier for FolderSupplier {
    fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, data)
    }
}

/// Several inputs searched in order; the first one holding a file wins.
#[derive(Default)]
pub struct ChainedInputSupplier {
    inputs: Vec<Box<dyn InputSupplier>>,
}

impl ChainedInputSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, input: impl InputSupplier + 'static) {
        self.inputs.push(Box::new(input));
    }

    pub fn push_boxed(&mut self, input: Box<dyn InputSupplier>) {
        self.inputs.push(input);
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl fmt::Debug for ChainedInputSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedInputSupplier")
            .field("inputs", &self.inputs.len())
            .finish()
    }
}

impl InputSupplier for ChainedInputSupplier {
    fn read(&self, path: &str) -> io::Result<Option<(Vec<u8>, Encoding)>> {
        for input in &self.inputs {
            if let Some(found) = input.read(path)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

fn lock_poisoned(what: &str) -> io::Error {
    io::Error::other(format!("{what} lock poisoned"))
}

/// A `.zip` or `.jar` archive read as a source root.
pub struct ZipInputSupplier {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
    encoding: Encoding,
}

impl ZipInputSupplier {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let archive = ZipArchive::new(File::open(&path)?).map_err(io::Error::other)?;
        tracing::debug!("Opened {} with {} entries", path.display(), archive.len());
        Ok(Self {
            path,
            archive: Mutex::new(archive),
            encoding: Encoding::Utf8,
        })
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for ZipInputSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipInputSupplier")
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl InputSupplier for ZipInputSupplier {
    fn read(&self, path: &str) -> io::Result<Option<(Vec<u8>, Encoding)>> {
        let mut archive = self.archive.lock().map_err(|_| lock_poisoned("archive"))?;
        let mut entry = match archive.by_name(&relative(path)) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(io::Error::other(e)),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some((bytes, self.encoding)))
    }
}

/// A `.zip` or `.jar` archive collecting the output; written out on `close`.
pub struct ZipOutputSupplier {
    path: PathBuf,
    writer: Mutex<Option<ZipWriter<File>>>,
}

impl ZipOutputSupplier {
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = ZipWriter::new(File::create(&path)?);
        Ok(Self {
            path,
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for ZipOutputSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipOutputSupplier")
            .field("path", &self.path)
            .finish()
    }
}

impl OutputSupplier for ZipOutputSupplier {
    fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let mut guard = self.writer.lock().map_err(|_| lock_poisoned("archive"))?;
        let Some(writer) = guard.as_mut() else {
            return Err(io::Error::other(format!("{} is already closed", self.path.display())));
        };
        writer
            .start_file(relative(path), SimpleFileOptions::default())
            .map_err(io::Error::other)?;
        writer.write_all(data)
    }

    fn close(&self) -> io::Result<()> {
        let mut guard = self.writer.lock().map_err(|_| lock_poisoned("archive"))?;
        if let Some(writer) = guard.take() {
            writer.finish().map_err(io::Error::other)?;
            tracing::debug!("Wrote {}", self.path.display());
        }
        Ok(())
    }
}

/// Input root for `path`: an archive when it has a `.zip` or `.jar` extension, a
/// directory tree otherwise.
pub fn open_input(path: &Path, encoding: Encoding) -> io::Result<Box<dyn InputSupplier>> {
    if is_archive(path) {
        return Ok(Box::new(ZipInputSupplier::open(path)?.with_encoding(encoding)));
    }
    Ok(Box::new(FolderSupplier::new(path).with_encoding(encoding)))
}

/// Output for `path`, following the same rule as [`open_input`].
pub fn create_output(path: &Path) -> io::Result<Box<dyn OutputSupplier>> {
    if is_archive(path) {
        return Ok(Box::new(ZipOutputSupplier::create(path)?));
    }
    Ok(Box::new(FolderSupplier::new(path)))
}

/// Whether `path` names a zip archive (`.zip` or `.jar`).
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip") || ext.eq_ignore_ascii_case("jar"))
}

/// In-memory files, for tests and for collecting output.
#[derive(Debug, Default)]
pub struct MemorySupplier {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    encoding: Encoding,
}

impl MemorySupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(relative(path), content.into());
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(&relative(path)).cloned()
    }

    pub fn get_text(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|bytes| self.encoding.decode(&bytes).ok())
    }

    /// Paths currently held, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl InputSupplier for MemorySupplier {
    fn read(&self, path: &str) -> io::Result<Option<(Vec<u8>, Encoding)>> {
        Ok(self.get(path).map(|bytes| (bytes, self.encoding)))
    }
}

impl OutputSupplier for MemorySupplier {
    fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let mut files = self.files.lock().map_err(|_| lock_poisoned("memory supplier"))?;
        files.insert(relative(path), data.to_vec());
        Ok(())
    }
}
