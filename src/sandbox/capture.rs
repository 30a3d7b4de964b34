/// Bounded output capture
///
/// Pipe-based reads that stop (or discard) past a byte ceiling, and a
/// memory-backed file used as a submission's stdout.
use crate::config::types::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::os::fd::OwnedFd;

/// How a captured stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputIntegrity {
    /// Reached EOF within the limit
    Complete,
    /// Stopped at the judge's byte ceiling
    TruncatedByJudgeLimit,
    /// The read side failed before EOF
    ReadError,
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputIntegrity::Complete => "complete",
            OutputIntegrity::TruncatedByJudgeLimit => "truncated_by_judge_limit",
            OutputIntegrity::ReadError => "read_error",
        };
        f.write_str(name)
    }
}

/// What to do with bytes past the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Stop reading; the writer may block on a full pipe
    Stop,
    /// Keep draining to EOF but keep nothing more
    Discard,
}

/// Bytes read from one stream.
#[derive(Debug, Clone)]
pub struct CapturedStream {
    pub data: Vec<u8>,
    pub integrity: OutputIntegrity,
}

/// Output collected by `ProcessHandle::communicate`.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
}

impl CapturedOutput {
    pub fn stdout_truncated(&self) -> bool {
        self.stdout_integrity == OutputIntegrity::TruncatedByJudgeLimit
    }
}

/// Read `stream` keeping at most `limit` bytes.
pub fn read_bounded<R: Read>(mut stream: R, limit: usize, overflow: Overflow) -> CapturedStream {
    let mut data = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if integrity == OutputIntegrity::TruncatedByJudgeLimit {
                    continue;
                }
                if data.len() + n > limit {
                    let remaining = limit - data.len();
                    data.extend_from_slice(&chunk[..remaining]);
                    integrity = OutputIntegrity::TruncatedByJudgeLimit;
                    if overflow == Overflow::Stop {
                        break;
                    }
                } else {
                    data.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Stream read failed after {} bytes: {}", data.len(), e);
                if integrity == OutputIntegrity::Complete {
                    integrity = OutputIntegrity::ReadError;
                }
                break;
            }
        }
    }

    CapturedStream { data, integrity }
}

/// Anonymous memory-backed file used to capture a submission's stdout.
pub struct MemoryIO {
    file: File,
}

impl MemoryIO {
    pub fn new() -> Result<Self> {
        use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
        let fd = memfd_create(c"gradebox-output", MemFdCreateFlag::MFD_CLOEXEC)?;
        Ok(Self {
            file: File::from(fd),
        })
    }

    /// A second descriptor onto the same buffer, for handing to a child.
    pub fn to_stdio(&self) -> Result<OwnedFd> {
        Ok(OwnedFd::from(self.file.try_clone()?))
    }

    /// Everything written so far.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Bytes written so far.
    pub fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_bounded_complete() {
        let captured = read_bounded(&b"hello"[..], 16, Overflow::Stop);
        assert_eq!(captured.data, b"hello");
        assert_eq!(captured.integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_read_bounded_exact_limit_is_complete() {
        let captured = read_bounded(&b"12345"[..], 5, Overflow::Stop);
        assert_eq!(captured.data, b"12345");
        assert_eq!(captured.integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_read_bounded_truncates() {
        let input = vec![b'x'; 20_000];
        let captured = read_bounded(&input[..], 10_000, Overflow::Stop);
        assert_eq!(captured.data.len(), 10_000);
        assert_eq!(captured.integrity, OutputIntegrity::TruncatedByJudgeLimit);
    }

    #[test]
    fn test_read_bounded_discard_drains_everything() {
        let mut input = std::io::Cursor::new(vec![b'y'; 50_000]);
        let captured = read_bounded(&mut input, 100, Overflow::Discard);
        assert_eq!(captured.data.len(), 100);
        assert_eq!(captured.integrity, OutputIntegrity::TruncatedByJudgeLimit);
        assert_eq!(input.position(), 50_000);
    }

    #[test]
    fn test_output_integrity_display() {
        assert_eq!(OutputIntegrity::Complete.to_string(), "complete");
        assert_eq!(
            OutputIntegrity::TruncatedByJudgeLimit.to_string(),
            "truncated_by_judge_limit"
        );
    }

    #[test]
    fn test_memory_io_shares_buffer_with_clone() {
        let memory = MemoryIO::new().unwrap();
        let mut writer = File::from(memory.to_stdio().unwrap());
        writer.write_all(b"captured output").unwrap();
        drop(writer);
        assert_eq!(memory.to_bytes().unwrap(), b"captured output");
        assert_eq!(memory.size().unwrap(), 15);
    }
}
