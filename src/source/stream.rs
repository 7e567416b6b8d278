//! Candidate streams read from literals or newline-delimited files.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use super::SourceError;

/// Where candidates for one axis (identities or secrets) come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A single value given directly
    Literal(String),
    /// Every non-blank line of a file, in file order
    File(PathBuf),
    /// The lines of a file that follow the first line equal to `after`
    Resume { path: PathBuf, after: String },
}

impl Source {
    pub fn literal(value: impl Into<String>) -> Self {
        Source::Literal(value.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn resume(path: impl Into<PathBuf>, after: impl Into<String>) -> Self {
        Source::Resume {
            path: path.into(),
            after: after.into(),
        }
    }

    /// Returns the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Source::Literal(_) => None,
            Source::File(path) | Source::Resume { path, .. } => Some(path),
        }
    }

    /// Opens a fresh stream over this source.
    ///
    /// An unopenable file produces an empty stream; the failure is logged once
    /// and kept on the stream for [`Candidates::take_error`].
    pub fn open(&self) -> Candidates {
        match self {
            Source::Literal(value) => Candidates {
                origin: "literal".into(),
                state: State::Literal(Some(value.trim().to_string())),
                yielded: 0,
                error: None,
            },
            Source::File(path) => Candidates::from_file(path, None),
            Source::Resume { path, after } => {
                let sentinel = (!after.is_empty()).then(|| after.clone());
                Candidates::from_file(path, sentinel)
            }
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Literal(value) => write!(f, "literal {:?}", value),
            Source::File(path) => write!(f, "file {}", path.display()),
            Source::Resume { path, after } => {
                write!(f, "file {} after {:?}", path.display(), after)
            }
        }
    }
}

enum State {
    Literal(Option<String>),
    Lines {
        lines: Lines<BufReader<File>>,
        /// Still looking for this line before yielding anything
        sentinel: Option<String>,
    },
    Done,
}

/// Lazy, finite sequence of candidates.
pub struct Candidates {
    origin: String,
    state: State,
    yielded: u64,
    error: Option<SourceError>,
}

impl Candidates {
    fn from_file(path: &Path, sentinel: Option<String>) -> Self {
        let origin = path.display().to_string();
        match File::open(path) {
            Ok(file) => {
                debug!(source = %origin, resume_after = ?sentinel, "Opened candidate file");
                Self {
                    origin,
                    state: State::Lines {
                        lines: BufReader::new(file).lines(),
                        sentinel,
                    },
                    yielded: 0,
                    error: None,
                }
            }
            Err(e) => {
                let err = SourceError::Open {
                    path: path.to_path_buf(),
                    source: e,
                };
                error!("{}", err);
                Self {
                    origin,
                    state: State::Done,
                    yielded: 0,
                    error: Some(err),
                }
            }
        }
    }

    /// Number of candidates emitted so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Takes the open/read failure recorded by this stream, if any.
    pub fn take_error(&mut self) -> Option<SourceError> {
        self.error.take()
    }

    fn next_line(&mut self) -> Option<String> {
        let State::Lines { lines, sentinel } = &mut self.state else {
            return None;
        };

        let mut failure = None;
        for line in lines.by_ref() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if sentinel.is_some() {
                if sentinel.as_deref() == Some(line) {
                    debug!(source = %self.origin, "Found resume point");
                    *sentinel = None;
                }
                continue;
            }
            return Some(line.to_string());
        }

        if let Some(e) = failure {
            let err = SourceError::Read {
                path: PathBuf::from(&self.origin),
                source: e,
            };
            error!("{}", err);
            self.error = Some(err);
        } else if let Some(target) = sentinel.as_deref() {
            warn!(
                source = %self.origin,
                "Resume value {:?} not found; nothing left to read",
                target
            );
        }
        debug!(source = %self.origin, count = self.yielded, "Finished reading candidates");
        self.state = State::Done;
        None
    }
}

impl Iterator for Candidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let next = match self.state {
            State::Literal(ref mut value) => {
                let value = value.take();
                if value.is_none() {
                    self.state = State::Done;
                }
                value
            }
            State::Lines { .. } => self.next_line(),
            State::Done => None,
        };
        if next.is_some() {
            self.yielded += 1;
        }
        next
    }
}

impl std::fmt::Debug for Candidates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidates")
            .field("origin", &self.origin)
            .field("yielded", &self.yielded)
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_list(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_literal_yields_once() {
        let got: Vec<_> = Source::literal("admin").open().collect();
        assert_eq!(got, vec!["admin"]);
    }

    #[test]
    fn test_empty_literal_means_no_secret() {
        let got: Vec<_> = Source::literal("").open().collect();
        assert_eq!(got, vec![""]);
    }

    #[test]
    fn test_file_trims_and_skips_blank_lines() {
        let file = write_list("  alice \n\n   \nbob\r\n\tcarol\n");
        let got: Vec<_> = Source::file(file.path()).open().collect();
        assert_eq!(got, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_missing_file_is_empty_and_reports() {
        let mut stream = Source::file("/nonexistent/cred_trial/users.txt").open();
        assert_eq!(stream.next(), None);
        assert!(matches!(stream.take_error(), Some(SourceError::Open { .. })));
        assert!(stream.take_error().is_none());
    }

    #[test]
    fn test_resume_after_sentinel() {
        let file = write_list("u1\nu2\nu3\n");
        let got: Vec<_> = Source::resume(file.path(), "u2").open().collect();
        assert_eq!(got, vec!["u3"]);
    }

    #[test]
    fn test_resume_empty_sentinel_is_full_stream() {
        let file = write_list("u1\nu2\nu3\n");
        let got: Vec<_> = Source::resume(file.path(), "").open().collect();
        assert_eq!(got, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_resume_missing_sentinel_is_empty() {
        let file = write_list("u1\nu2\nu3\n");
        let got: Vec<_> = Source::resume(file.path(), "u9").open().collect();
        assert!(got.is_empty());
    }

    #[test]
    fn test_resume_sentinel_on_last_line_is_empty() {
        let file = write_list("u1\nu2\nu3\n");
        let got: Vec<_> = Source::resume(file.path(), "u3").open().collect();
        assert!(got.is_empty());
    }

    #[test]
    fn test_invalid_utf8_ends_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"good\n\xff\xfe\nlater\n").unwrap();
        let mut stream = Source::file(file.path()).open();
        assert_eq!(stream.next().as_deref(), Some("good"));
        assert_eq!(stream.next(), None);
        assert!(matches!(stream.take_error(), Some(SourceError::Read { .. })));
        assert_eq!(stream.yielded(), 1);
    }

    #[test]
    fn test_reopen_restarts() {
        let file = write_list("a\nb\n");
        let source = Source::file(file.path());
        let first: Vec<_> = source.open().collect();
        let second: Vec<_> = source.open().collect();
        assert_eq!(first, second);
    }
}
