use std::{
    cell::RefCell,
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
    thread,
    time::{Duration, Instant},
};

use chrono::Local;

use super::{Env, FileLock, Logger, RandomAccessFile, SequentialFile, WritableFile};
use crate::error::{Error, Result};

pub struct PosixEnv {
    start: Instant,
}

impl Default for PosixEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl PosixEnv {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Env for PosixEnv {
    fn new_sequential_file(&self, fname: &str) -> Result<Box<dyn SequentialFile>> {
        match File::open(fname) {
            Ok(file) => Ok(Box::new(PosixSequentialFile { file })),
            Err(error) => Err(to_db_error(fname, error)),
        }
    }

    fn new_random_access_file(&self, fname: &str) -> Result<Box<dyn RandomAccessFile>> {
        match File::open(fname) {
            Ok(file) => Ok(Box::new(PosixRandomAccessFile {
                file: Mutex::new(file),
            })),
            Err(error) => Err(to_db_error(fname, error)),
        }
    }

    fn new_writable_file(&self, fname: &str) -> Result<Box<dyn WritableFile>> {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(fname)
        {
            Ok(file) => Ok(Box::new(PosixWritableFile::new(file))),
            Err(error) => Err(to_db_error(fname, error)),
        }
    }

    fn new_appendable_file(&self, fname: &str) -> Result<Box<dyn WritableFile>> {
        match OpenOptions::new().create(true).append(true).open(fname) {
            Ok(file) => Ok(Box::new(PosixWritableFile::new(file))),
            Err(error) => Err(to_db_error(fname, error)),
        }
    }

    fn file_exists(&self, fname: &str) -> bool {
        Path::new(fname).exists()
    }

    fn get_children(&self, dname: &str) -> Result<Vec<OsString>> {
        match fs::read_dir(dname) {
            Ok(entries) => Ok(entries
                .filter_map(|entry| entry.map(|e| e.file_name()).ok())
                .collect()),
            Err(error) => Err(to_db_error(dname, error)),
        }
    }

    fn remove_file(&self, fname: &str) -> Result<()> {
        match fs::remove_file(fname) {
            Ok(()) => Ok(()),
            Err(error) => Err(to_db_error(fname, error)),
        }
    }

    fn create_dir(&self, dname: &str) -> Result<()> {
        match fs::create_dir(dname) {
            Ok(()) => Ok(()),
            Err(error) => Err(to_db_error(dname, error)),
        }
    }

    fn remove_dir(&self, dname: &str) -> Result<()> {
        match fs::remove_dir(dname) {
            Ok(()) => Ok(()),
            Err(error) => Err(to_db_error(dname, error)),
        }
    }

    fn get_file_size(&self, fname: &str) -> Result<u64> {
        match fs::metadata(fname) {
            Ok(data) => Ok(data.len()),
            Err(error) => Err(to_db_error(fname, error)),
        }
    }

    fn rename_file(&self, src: &str, target: &str) -> Result<()> {
        match fs::rename(src, target) {
            Ok(()) => Ok(()),
            Err(error) => Err(to_db_error(src, error)),
        }
    }

    /// Advisory: takes exclusive ownership of a `fname.lock` marker file via
    /// `O_EXCL`-style creation. Does not call into `flock`, so it only
    /// excludes other callers of this same crate, not arbitrary processes.
    fn lock_file(&self, fname: &str) -> Result<Box<dyn FileLock>> {
        let lock_path = format!("{}.lock", fname);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => Ok(Box::new(PosixFileLock { path: lock_path })),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => Err(
                Error::io_error(format!("lock {}: already held", fname)),
            ),
            Err(error) => Err(to_db_error(&lock_path, error)),
        }
    }

    fn unlock_file(&self, lock: Box<dyn FileLock>) -> Result<()> {
        match fs::remove_file(lock.filename()) {
            Ok(()) => Ok(()),
            Err(error) => Err(to_db_error(lock.filename(), error)),
        }
    }

    fn new_logger(&self, fname: &str) -> Result<Box<dyn Logger + '_>> {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .append(true)
            .open(fname)
        {
            Ok(file) => Ok(Box::new(PosixLogger::new(file))),
            Err(error) => Err(to_db_error(fname, error)),
        }
    }

    fn schedule(&self, job: Box<dyn FnOnce() + Send>) {
        thread::spawn(job);
    }

    fn start_thread(&self, job: Box<dyn FnOnce() + Send>) {
        thread::spawn(job);
    }

    fn now_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn sleep_for_micros(&self, micros: u64) {
        thread::sleep(Duration::from_micros(micros));
    }
}

fn to_db_error(target: &str, error: io::Error) -> Error {
    let msg = format!("{}: {}", target, &error.to_string());
    match error.kind() {
        io::ErrorKind::NotFound => Error::not_found(msg),
        _ => Error::io_error(msg),
    }
}

struct PosixSequentialFile {
    file: File,
}

impl SequentialFile for PosixSequentialFile {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.file
            .read(dst)
            .map_err(|error| to_db_error("sequential read", error))
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.file
            .seek(SeekFrom::Current(n as i64))
            .map(|_| ())
            .map_err(|error| to_db_error("sequential skip", error))
    }
}

struct PosixRandomAccessFile {
    // `RandomAccessFile::read` takes `&self` because callers may issue reads
    // concurrently from multiple threads; the mutex serializes the
    // underlying seek+read pair without requiring platform-specific
    // positioned-read syscalls.
    file: Mutex<File>,
}

impl RandomAccessFile for PosixRandomAccessFile {
    fn read(&self, offset: u64, dst: &mut [u8]) -> Result<usize> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))
            .map_err(|error| to_db_error("random access seek", error))?;
        file.read(dst)
            .map_err(|error| to_db_error("random access read", error))
    }
}

struct PosixWritableFile {
    file: BufWriter<File>,
}

impl PosixWritableFile {
    fn new(file: File) -> Self {
        Self {
            file: BufWriter::new(file),
        }
    }
}

impl WritableFile for PosixWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .map_err(|error| to_db_error("append", error))
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|error| to_db_error("flush", error))
    }

    fn sync(&mut self) -> Result<()> {
        self.file.flush().map_err(|error| to_db_error("sync", error))?;
        self.file
            .get_ref()
            .sync_all()
            .map_err(|error| to_db_error("sync", error))
    }
}

struct PosixFileLock {
    path: String,
}

impl FileLock for PosixFileLock {
    fn filename(&self) -> &str {
        &self.path
    }
}

struct PosixLogger {
    file: RefCell<File>,
}

impl PosixLogger {
    fn new(file: File) -> Self {
        Self {
            file: RefCell::new(file),
        }
    }
}

impl Logger for PosixLogger {
    fn log(&self, info: &str) {
        // Record the time as close to the Logv() call as possible.
        let time = Local::now().format("%Y/%m/%d-%H:%M:%S%.6f").to_string();
        // Record the thread ID.
        let thread_id = thread::current().id();
        let mut info = format!("{} {:?} {}", time, thread_id, info);
        if info.chars().last().unwrap() != '\n' {
            info += "\n";
        }
        let mut file_inner = self.file.borrow_mut();
        file_inner.write(info.as_bytes()).unwrap();
        file_inner.flush().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_env_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let path = path.to_str().unwrap();
        let env = PosixEnv::new();

        let mut writer = env.new_writable_file(path).unwrap();
        writer.append(b"hello ").unwrap();
        writer.append(b"world").unwrap();
        writer.close().unwrap();

        let mut reader = env.new_sequential_file(path).unwrap();
        let mut buf = [0u8; 11];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");
    }

    #[test]
    fn test_posix_env_random_access_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let path = path.to_str().unwrap();
        let env = PosixEnv::new();

        let mut writer = env.new_writable_file(path).unwrap();
        writer.append(b"0123456789").unwrap();
        writer.close().unwrap();

        let reader = env.new_random_access_file(path).unwrap();
        let mut buf = [0u8; 4];
        let n = reader.read(3, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"3456");
    }

    #[test]
    fn test_posix_env_lock_file_excludes_second_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LOCK");
        let path = path.to_str().unwrap();
        let env = PosixEnv::new();

        let lock = env.lock_file(path).unwrap();
        assert!(env.lock_file(path).is_err());
        env.unlock_file(lock).unwrap();
        assert!(env.lock_file(path).is_ok());
    }

    #[test]
    fn test_posix_env_file_exists_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let path = path.to_str().unwrap();
        let env = PosixEnv::new();

        assert!(!env.file_exists(path));
        let mut writer = env.new_writable_file(path).unwrap();
        writer.append(b"x").unwrap();
        writer.close().unwrap();
        assert!(env.file_exists(path));
        env.remove_file(path).unwrap();
        assert!(!env.file_exists(path));
    }

    #[test]
    fn test_posix_env_now_micros_monotonic() {
        let env = PosixEnv::new();
        let a = env.now_micros();
        env.sleep_for_micros(1000);
        let b = env.now_micros();
        assert!(b > a);
    }
}
