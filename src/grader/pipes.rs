/// Cross-wired pipe pair between a submission and its interactor
use crate::config::types::{GraderError, Result};
use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use std::os::fd::OwnedFd;

/// Both pipes of one interactive case.
///
/// Each end is handed to exactly one process launch; whatever the judge still
/// holds is closed by [`CrossPipes::close`] or on drop.
#[derive(Debug)]
pub struct CrossPipes {
    /// Read end of interactor -> submission
    submission_stdin: Option<OwnedFd>,
    /// Write end of submission -> interactor
    submission_stdout: Option<OwnedFd>,
    /// Read end of submission -> interactor
    interactor_stdin: Option<OwnedFd>,
    /// Write end of interactor -> submission
    interactor_stdout: Option<OwnedFd>,
}

fn take(end: &mut Option<OwnedFd>, name: &str) -> Result<OwnedFd> {
    end.take()
        .ok_or_else(|| GraderError::Internal(format!("{name} pipe end was already handed out")))
}

impl CrossPipes {
    pub fn new() -> Result<Self> {
        let (to_submission_read, to_submission_write) = pipe2(OFlag::O_CLOEXEC)?;
        let (to_interactor_read, to_interactor_write) = pipe2(OFlag::O_CLOEXEC)?;
        Ok(Self {
            submission_stdin: Some(to_submission_read),
            submission_stdout: Some(to_interactor_write),
            interactor_stdin: Some(to_interactor_read),
            interactor_stdout: Some(to_submission_write),
        })
    }

    pub fn take_submission_stdin(&mut self) -> Result<OwnedFd> {
        take(&mut self.submission_stdin, "submission stdin")
    }

    pub fn take_submission_stdout(&mut self) -> Result<OwnedFd> {
        take(&mut self.submission_stdout, "submission stdout")
    }

    pub fn take_interactor_stdin(&mut self) -> Result<OwnedFd> {
        take(&mut self.interactor_stdin, "interactor stdin")
    }

    pub fn take_interactor_stdout(&mut self) -> Result<OwnedFd> {
        take(&mut self.interactor_stdout, "interactor stdout")
    }

    /// Number of ends the judge still holds.
    #[cfg(test)]
    fn held(&self) -> usize {
        [
            &self.submission_stdin,
            &self.submission_stdout,
            &self.interactor_stdin,
            &self.interactor_stdout,
        ]
        .iter()
        .filter(|end| end.is_some())
        .count()
    }

    pub fn close(&mut self) {
        self.submission_stdin = None;
        self.submission_stdout = None;
        self.interactor_stdin = None;
        self.interactor_stdout = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Write};

    #[test]
    fn test_pipes_are_cross_wired() {
        let mut pipes = CrossPipes::new().unwrap();
        assert_eq!(pipes.held(), 4);

        let mut submission_out = File::from(pipes.take_submission_stdout().unwrap());
        let mut interactor_in = File::from(pipes.take_interactor_stdin().unwrap());
        submission_out.write_all(b"? 5\n").unwrap();
        drop(submission_out);
        let mut received = String::new();
        interactor_in.read_to_string(&mut received).unwrap();
        assert_eq!(received, "? 5\n");

        let mut interactor_out = File::from(pipes.take_interactor_stdout().unwrap());
        let mut submission_in = File::from(pipes.take_submission_stdin().unwrap());
        interactor_out.write_all(b"<\n").unwrap();
        drop(interactor_out);
        let mut received = String::new();
        submission_in.read_to_string(&mut received).unwrap();
        assert_eq!(received, "<\n");

        assert_eq!(pipes.held(), 0);
    }

    #[test]
    fn test_end_can_only_be_taken_once() {
        let mut pipes = CrossPipes::new().unwrap();
        assert!(pipes.take_submission_stdin().is_ok());
        assert!(matches!(pipes.take_submission_stdin(), Err(GraderError::Internal(_))));
        pipes.close();
        assert_eq!(pipes.held(), 0);
    }
}
