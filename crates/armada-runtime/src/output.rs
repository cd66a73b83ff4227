use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Output stream shared by every endpoint taking part in one group call.
///
/// Each `write`, `flush` and [`OutputSink::write_line`] call holds the lock
/// for its own duration only. Lines written with `write_line` arrive whole,
/// but output from different endpoints interleaves freely. Callers that need
/// one stream per endpoint must demultiplex inside the writer they supply.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// A sink backed by an in-memory buffer, plus a handle to read it back.
    pub fn capture() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::new(captured.clone()), captured)
    }

    /// Write `line` followed by a newline under a single lock acquisition.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut w = self.lock()?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Box<dyn Write + Send>>> {
        self.inner
            .lock()
            .map_err(|e| io::Error::other(format!("output sink poisoned: {e}")))
    }
}

impl Write for &OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

/// Read side of [`OutputSink::capture`].
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        match self.buf.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .map_err(|e| io::Error::other(format!("capture buffer poisoned: {e}")))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn capture_collects_lines() {
        let (sink, captured) = OutputSink::capture();
        sink.write_line("first").unwrap();
        writeln!(&sink, "second").unwrap();
        assert_eq!(captured.lines(), ["first", "second"]);
    }

    #[test]
    fn clones_share_one_stream() {
        let (sink, captured) = OutputSink::capture();
        let mut other = sink.clone();
        sink.write_line("a").unwrap();
        other.write_all(b"b\n").unwrap();
        other.flush().unwrap();
        assert_eq!(captured.contents(), "a\nb\n");
    }

    #[test]
    fn concurrent_write_line_keeps_lines_whole() {
        let (sink, captured) = OutputSink::capture();
        thread::scope(|s| {
            for t in 0..8 {
                let sink = &sink;
                s.spawn(move || {
                    for i in 0..50 {
                        sink.write_line(&format!("thread-{t} line-{i}")).unwrap();
                    }
                });
            }
        });

        let lines = captured.lines();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|l| l.starts_with("thread-") && l.contains(" line-")));
    }

    #[test]
    fn discard_accepts_writes() {
        let sink = OutputSink::discard();
        sink.write_line("dropped").unwrap();
    }
}
