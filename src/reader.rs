//! Background line reader feeding a [`LineCache`].

use crate::line_cache::LineCache;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Why the read loop stopped.
#[derive(Debug)]
pub enum ReaderExit {
    /// The stream reached end-of-file (process exited or was killed).
    EndOfStream,
    /// A read failed, e.g. the output was not valid UTF-8.
    Failed(io::Error),
}

/// Spawns the dedicated reader thread.
///
/// The thread publishes every non-empty line of `stream` into `cache` and
/// exits on end-of-stream or on the first read error, leaving the last
/// published line in place.
///
/// # Errors
///
/// Returns an error if the OS refuses to create the thread.
pub fn spawn_reader<R>(stream: R, cache: Arc<LineCache>) -> io::Result<JoinHandle<ReaderExit>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("neuron-monitor-reader".to_string())
        .spawn(move || read_lines(stream, &cache))
}

/// Runs the read loop on the current thread.
pub fn read_lines<R: Read>(stream: R, cache: &LineCache) -> ReaderExit {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                tracing::info!(published = cache.published(), "monitor output closed, keeping last report");
                return ReaderExit::EndOfStream;
            }
            Ok(_) => {
                if cache.publish(&line) {
                    tracing::trace!(bytes = line.len(), "published monitor line");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "monitor output read failed, no further updates");
                return ReaderExit::Failed(e);
            }
        }
    }
}

/// Spawns a thread that logs each stderr line of the monitor at debug level.
///
/// # Errors
///
/// Returns an error if the OS refuses to create the thread.
pub fn spawn_stderr_drain<R>(stream: R) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new().name("neuron-monitor-stderr".to_string()).spawn(move || {
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(line) if !line.trim().is_empty() => {
                    tracing::debug!(target: "neuron_monitor::stderr", "{}", line.trim_end());
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields its data, then fails every read.
    struct FailAfter {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_reader_publishes_last_line_before_eof() {
        let cache = LineCache::new();
        let exit = read_lines(Cursor::new("{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n"), &cache);

        assert!(matches!(exit, ReaderExit::EndOfStream));
        assert_eq!(cache.try_latest().as_deref(), Some("{\"n\":3}"));
        assert_eq!(cache.published(), 3);
    }

    #[test]
    fn test_reader_skips_blank_lines_and_trims() {
        let cache = LineCache::new();
        read_lines(Cursor::new("  one  \n\n   \r\n"), &cache);

        assert_eq!(cache.try_latest().as_deref(), Some("one"));
        assert_eq!(cache.published(), 1);
    }

    #[test]
    fn test_reader_accepts_unterminated_final_line() {
        let cache = LineCache::new();
        read_lines(Cursor::new("first\nsecond"), &cache);

        assert_eq!(cache.try_latest().as_deref(), Some("second"));
    }

    #[test]
    fn test_reader_stops_on_error_and_keeps_last_line() {
        let cache = LineCache::new();
        let stream = FailAfter { data: Cursor::new(b"kept\n".to_vec()) };

        let exit = read_lines(stream, &cache);

        assert!(matches!(exit, ReaderExit::Failed(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(cache.read_latest(), "kept");
    }

    #[test]
    fn test_reader_stops_on_invalid_utf8() {
        let cache = LineCache::new();
        let exit = read_lines(Cursor::new(b"good\n\xff\xfe\nnever\n".to_vec()), &cache);

        assert!(matches!(exit, ReaderExit::Failed(_)));
        assert_eq!(cache.try_latest().as_deref(), Some("good"));
    }

    #[test]
    fn test_spawned_reader_runs_in_background() {
        let cache = Arc::new(LineCache::new());
        let handle = spawn_reader(Cursor::new("a\nb\n"), Arc::clone(&cache)).unwrap();

        let exit = handle.join().unwrap();
        assert!(matches!(exit, ReaderExit::EndOfStream));
        assert_eq!(cache.read_latest(), "b");
    }

    #[test]
    fn test_stderr_drain_finishes_at_eof() {
        let handle = spawn_stderr_drain(Cursor::new("warning: x\n\nerror: y\n")).unwrap();
        handle.join().unwrap();
    }
}
