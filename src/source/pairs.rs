//! Pair generation over two candidate streams.

use std::str::FromStr;

use tracing::debug;

use super::{Candidates, SourceError};

/// One (identity, secret) combination to try.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrialPair {
    pub identity: String,
    /// Empty means "no secret"
    pub secret: String,
}

impl TrialPair {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

/// Enumeration order of the cartesian product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// For each identity, every secret. Buffers both axes.
    IdentityMajor,
    /// For each secret, every identity. Buffers identities only, so the
    /// secret list may be arbitrarily large.
    #[default]
    SecretMajor,
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity-major" | "identity" | "user-first" => Ok(Order::IdentityMajor),
            "secret-major" | "secret" | "password-first" => Ok(Order::SecretMajor),
            _ => Err(format!("Unknown pair order: {}", s)),
        }
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::IdentityMajor => write!(f, "identity-major"),
            Order::SecretMajor => write!(f, "secret-major"),
        }
    }
}

enum Walk {
    IdentityMajor {
        secrets: Vec<String>,
        identity: usize,
        secret: usize,
    },
    SecretMajor {
        secrets: Candidates,
        current: Option<String>,
        identity: usize,
    },
}

/// Lazy cartesian product of identities and secrets.
///
/// Both orders hold every identity in memory. Only [`Order::IdentityMajor`]
/// also holds every secret.
pub struct PairGenerator {
    order: Order,
    identities: Vec<String>,
    walk: Walk,
    errors: Vec<SourceError>,
}

impl PairGenerator {
    pub fn new(mut identities: Candidates, mut secrets: Candidates, order: Order) -> Self {
        let mut errors = Vec::new();
        let ids: Vec<String> = identities.by_ref().collect();
        errors.extend(identities.take_error());
        debug!("Collected {} identities", ids.len());

        let walk = match order {
            Order::IdentityMajor => {
                let all: Vec<String> = secrets.by_ref().collect();
                errors.extend(secrets.take_error());
                debug!("Collected {} secrets", all.len());
                Walk::IdentityMajor {
                    secrets: all,
                    identity: 0,
                    secret: 0,
                }
            }
            Order::SecretMajor => Walk::SecretMajor {
                secrets,
                current: None,
                identity: 0,
            },
        };

        Self {
            order,
            identities: ids,
            walk,
            errors,
        }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Number of buffered identities.
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Takes every source failure seen so far, from either axis.
    pub fn take_errors(&mut self) -> Vec<SourceError> {
        if let Walk::SecretMajor { secrets, .. } = &mut self.walk {
            self.errors.extend(secrets.take_error());
        }
        std::mem::take(&mut self.errors)
    }
}

impl Iterator for PairGenerator {
    type Item = TrialPair;

    fn next(&mut self) -> Option<TrialPair> {
        if self.identities.is_empty() {
            return None;
        }

        match &mut self.walk {
            Walk::IdentityMajor {
                secrets,
                identity,
                secret,
            } => {
                if *secret == secrets.len() {
                    *secret = 0;
                    *identity += 1;
                }
                if secrets.is_empty() || *identity >= self.identities.len() {
                    return None;
                }
                let pair = TrialPair::new(&self.identities[*identity], &secrets[*secret]);
                *secret += 1;
                Some(pair)
            }
            Walk::SecretMajor {
                secrets,
                current,
                identity,
            } => {
                if current.is_none() || *identity == self.identities.len() {
                    *current = Some(secrets.next()?);
                    *identity = 0;
                }
                let secret = current.as_deref()?;
                let pair = TrialPair::new(&self.identities[*identity], secret);
                *identity += 1;
                Some(pair)
            }
        }
    }
}
