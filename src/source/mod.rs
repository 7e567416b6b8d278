//! Candidate sources and trial pair generation.
//!
//! - `stream`: literal and file-backed candidate streams, with resume
//! - `pairs`: cartesian product in identity-major or secret-major order
//! - `estimate`: expected trial count for progress display

mod estimate;
mod pairs;
mod stream;

use std::path::PathBuf;

pub use estimate::{estimate, LineCounter};
pub use pairs::{Order, PairGenerator, TrialPair};
pub use stream::{Candidates, Source};

/// Failure to read a candidate file.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The two sources a run pairs up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub identities: Source,
    pub secrets: Source,
}

impl Plan {
    pub fn new(identities: Source, secrets: Source) -> Self {
        Self {
            identities,
            secrets,
        }
    }

    /// Expected number of trials. See [`estimate`].
    pub fn estimate(&self) -> u64 {
        estimate(&self.identities, &self.secrets)
    }

    /// Opens both sources and pairs them in the given order.
    pub fn pairs(&self, order: Order) -> PairGenerator {
        PairGenerator::new(self.identities.open(), self.secrets.open(), order)
    }
}
