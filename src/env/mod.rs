use crate::error::Result;
use std::{ffi::OsString, sync::Arc};

mod posix_env;

pub use posix_env::PosixEnv;

/// An Env is an interface used by the leveldb implementation to access
/// operating system functionality like the filesystem etc.  Callers
/// may wish to provide a custom Env object when opening a database to
/// get fine gain control; e.g., to rate limit file system operations.
///
/// All Env implementations are safe for concurrent access from
/// multiple threads without any external synchronization.
pub trait Env {
    /// The returned file will only be accessed by one thread at a time.
    fn new_sequential_file(&self, fname: &str) -> Result<Box<dyn SequentialFile>>;

    /// The returned file may be concurrently accessed by multiple threads.
    fn new_random_access_file(&self, fname: &str) -> Result<Box<dyn RandomAccessFile>>;

    /// The returned file will only be accessed by one thread at a time.
    fn new_writable_file(&self, fname: &str) -> Result<Box<dyn WritableFile>>;

    fn new_appendable_file(&self, fname: &str) -> Result<Box<dyn WritableFile>>;
    fn file_exists(&self, fname: &str) -> bool;
    fn get_children(&self, dname: &str) -> Result<Vec<OsString>>;
    fn remove_file(&self, fname: &str) -> Result<()>;
    fn create_dir(&self, dname: &str) -> Result<()>;
    fn remove_dir(&self, dname: &str) -> Result<()>;
    fn get_file_size(&self, fname: &str) -> Result<u64>;
    fn rename_file(&self, src: &str, target: &str) -> Result<()>;
    fn lock_file(&self, fname: &str) -> Result<Box<dyn FileLock>>;
    fn unlock_file(&self, lock: Box<dyn FileLock>) -> Result<()>;
    fn new_logger(&self, fname: &str) -> Result<Box<dyn Logger + '_>>;

    /// Queue `job` on a background worker. No ordering is guaranteed
    /// between jobs queued concurrently.
    fn schedule(&self, job: Box<dyn FnOnce() + Send>);

    /// Start a new thread running `job` and return without waiting for it.
    fn start_thread(&self, job: Box<dyn FnOnce() + Send>);

    /// Microseconds since some fixed but unspecified point in time.
    fn now_micros(&self) -> u64;

    /// Sleep for at least `micros` microseconds.
    fn sleep_for_micros(&self, micros: u64);
}

/// A file abstraction for reading sequentially through a file
pub trait SequentialFile {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize>;
    fn skip(&mut self, n: usize) -> Result<()>;
}

/// A file abstraction for randomly reading the contents of a file.
pub trait RandomAccessFile {
    fn read(&self, offset: u64, dst: &mut [u8]) -> Result<usize>;
}

/// A file abstraction for sequential writing.  The implementation
/// must provide buffering since callers may append small fragments
/// at a time to the file.
pub trait WritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}

/// A held advisory lock over a database directory. Dropping or unlocking
/// this releases the lock.
pub trait FileLock {
    fn filename(&self) -> &str;
}

pub trait Logger {
    fn log(&self, info: &str);
}

/// Forwards every method to a wrapped `Env`. Subclasses override only the
/// methods they need to change, the way `rebeldb`'s upstream (LevelDB's
/// `EnvWrapper`) lets callers layer in rate limiting or fault injection
/// without reimplementing the whole surface.
pub struct EnvWrapper<E: Env> {
    target: E,
}

impl<E: Env> EnvWrapper<E> {
    pub fn new(target: E) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &E {
        &self.target
    }
}

impl<E: Env> Env for EnvWrapper<E> {
    fn new_sequential_file(&self, fname: &str) -> Result<Box<dyn SequentialFile>> {
        self.target.new_sequential_file(fname)
    }

    fn new_random_access_file(&self, fname: &str) -> Result<Box<dyn RandomAccessFile>> {
        self.target.new_random_access_file(fname)
    }

    fn new_writable_file(&self, fname: &str) -> Result<Box<dyn WritableFile>> {
        self.target.new_writable_file(fname)
    }

    fn new_appendable_file(&self, fname: &str) -> Result<Box<dyn WritableFile>> {
        self.target.new_appendable_file(fname)
    }

    fn file_exists(&self, fname: &str) -> bool {
        self.target.file_exists(fname)
    }

    fn get_children(&self, dname: &str) -> Result<Vec<OsString>> {
        self.target.get_children(dname)
    }

    fn remove_file(&self, fname: &str) -> Result<()> {
        self.target.remove_file(fname)
    }

    fn create_dir(&self, dname: &str) -> Result<()> {
        self.target.create_dir(dname)
    }

    fn remove_dir(&self, dname: &str) -> Result<()> {
        self.target.remove_dir(dname)
    }

    fn get_file_size(&self, fname: &str) -> Result<u64> {
        self.target.get_file_size(fname)
    }

    fn rename_file(&self, src: &str, target: &str) -> Result<()> {
        self.target.rename_file(src, target)
    }

    fn lock_file(&self, fname: &str) -> Result<Box<dyn FileLock>> {
        self.target.lock_file(fname)
    }

    fn unlock_file(&self, lock: Box<dyn FileLock>) -> Result<()> {
        self.target.unlock_file(lock)
    }

    fn new_logger(&self, fname: &str) -> Result<Box<dyn Logger + '_>> {
        self.target.new_logger(fname)
    }

    fn schedule(&self, job: Box<dyn FnOnce() + Send>) {
        self.target.schedule(job)
    }

    fn start_thread(&self, job: Box<dyn FnOnce() + Send>) {
        self.target.start_thread(job)
    }

    fn now_micros(&self) -> u64 {
        self.target.now_micros()
    }

    fn sleep_for_micros(&self, micros: u64) {
        self.target.sleep_for_micros(micros)
    }
}

fn write_data_to_file_inner(
    env: Arc<dyn Env>,
    data: &[u8],
    fname: &str,
    should_sync: bool,
) -> Result<()> {
    let mut file = env.new_writable_file(fname)?;
    let mut result = file.append(data);
    if result.is_ok() && should_sync {
        result = file.sync();
    }
    if result.is_ok() {
        result = file.close();
    }
    drop(file);
    if result.is_err() {
        let _ = env.remove_file(fname);
    }
    result
}

pub fn write_data_to_file(env: Arc<dyn Env>, data: &[u8], fname: &str) -> Result<()> {
    write_data_to_file_inner(env, data, fname, false)
}

pub fn write_data_to_file_sync(env: Arc<dyn Env>, data: &[u8], fname: &str) -> Result<()> {
    write_data_to_file_inner(env, data, fname, true)
}
