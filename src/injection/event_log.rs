use super::record::InjectionEvent;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Append-only sink for injection events, one line per event.
///
/// Opened once per simulation run and shared by every injector instance;
/// appends arrive in simulated-cycle order because the host is
/// single-threaded. Each append is flushed so an aborted run keeps its tail,
/// and the writer is flushed again when the log is dropped at run teardown.
pub struct EventLog {
    writer: Box<dyn Write + Send>,
}

impl EventLog {
    /// Create or truncate the log file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
        })
    }

    /// Log into an arbitrary writer (in-memory capture for tests).
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    pub fn append(&mut self, event: &InjectionEvent) -> io::Result<()> {
        writeln!(self.writer, "{}", event.log_line())?;
        self.writer.flush()
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::faults::FaultModel;
    use crate::injection::record::TargetId;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn event(cycle: u64) -> InjectionEvent {
        InjectionEvent {
            cycle,
            target: TargetId::Memory { address: 0x1000 },
            model: FaultModel::BitFlip,
            original: vec![0xAA],
            corrupted: vec![0xAB],
            selected_bits: vec![0],
            changed_bits: vec![0],
            permanent: false,
        }
    }

    #[test]
    fn appends_one_line_per_event_in_order() {
        let buf = SharedBuf::default();
        let mut log = EventLog::from_writer(buf.clone());
        log.append(&event(1)).unwrap();
        log.append(&event(2)).unwrap();
        drop(log);

        let contents = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cycle=1 "));
        assert!(lines[1].starts_with("cycle=2 "));
        assert!(lines[0].contains("model=bit_flip"));
        assert!(lines[0].contains("permanent=false"));
    }
}
