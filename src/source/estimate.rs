//! Expected trial count, for progress display only.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Source;

/// Counts non-blank lines per file, scanning each path at most once.
#[derive(Debug, Default)]
pub struct LineCounter {
    cache: HashMap<PathBuf, u64>,
}

impl LineCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of candidates the source would yield from the start.
    ///
    /// Resume sources are counted in full. Unreadable files count as zero.
    pub fn count(&mut self, source: &Source) -> u64 {
        match source.path() {
            None => 1,
            Some(path) => {
                if let Some(&n) = self.cache.get(path) {
                    return n;
                }
                let n = count_lines(path);
                self.cache.insert(path.to_path_buf(), n);
                n
            }
        }
    }
}

fn count_lines(path: &Path) -> u64 {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!("Cannot count lines in {}: {}", path.display(), e);
            return 0;
        }
    };
    let count = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.trim().is_empty())
        .count() as u64;
    debug!("Counted {} lines in {}", count, path.display());
    count
}

/// Expected number of trials for a pairing of two sources.
pub fn estimate(identities: &Source, secrets: &Source) -> u64 {
    let mut counter = LineCounter::new();
    counter
        .count(identities)
        .saturating_mul(counter.count(secrets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn list(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_literal_literal() {
        assert_eq!(estimate(&Source::literal("a"), &Source::literal("b")), 1);
    }

    #[test]
    fn test_literal_file() {
        let secrets = list("s1\n\ns2\n  \ns3\n");
        assert_eq!(
            estimate(&Source::literal("admin"), &Source::file(secrets.path())),
            3
        );
    }

    #[test]
    fn test_file_file() {
        let ids = list("a\nb\n");
        let secrets = list("1\n2\n3\n\n");
        assert_eq!(
            estimate(&Source::file(ids.path()), &Source::file(secrets.path())),
            6
        );
    }

    #[test]
    fn test_missing_file_counts_zero() {
        assert_eq!(
            estimate(
                &Source::literal("admin"),
                &Source::file("/nonexistent/cred_trial/list.txt")
            ),
            0
        );
    }

    #[test]
    fn test_counter_caches_per_path() {
        let ids = list("a\nb\n");
        let mut counter = LineCounter::new();
        assert_eq!(counter.count(&Source::file(ids.path())), 2);
        std::fs::write(ids.path(), "a\nb\nc\n").unwrap();
        assert_eq!(counter.count(&Source::resume(ids.path(), "a")), 2);
    }
}
