//! Contract for the component that actually attempts authentication.
//!
//! The pipeline never talks to a target itself. Hosts plug in a
//! [`TrialExecutor`] that opens a connection, runs the handshake and reports
//! an [`Outcome`].

use std::time::Duration;

use crate::cancel::CancelToken;

/// Classification of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Target unreachable or the attempt timed out
    NoConnection,
    /// Target answered and rejected the pair
    AuthFailure,
    /// Target accepted the pair
    Success,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::NoConnection => write!(f, "no connection"),
            OutcomeKind::AuthFailure => write!(f, "authentication failure"),
            OutcomeKind::Success => write!(f, "success"),
        }
    }
}

/// Result of one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    /// Free-form report, typically from a follow-on action
    pub message: Option<String>,
}

impl Outcome {
    pub fn no_connection() -> Self {
        Self {
            kind: OutcomeKind::NoConnection,
            message: None,
        }
    }

    pub fn auth_failure() -> Self {
        Self {
            kind: OutcomeKind::AuthFailure,
            message: None,
        }
    }

    pub fn success(message: Option<String>) -> Self {
        Self {
            kind: OutcomeKind::Success,
            message,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

/// Attempts authentication for one pair.
///
/// Implementations must return within roughly `timeout` and should abort any
/// in-progress work as soon as `cancel` fires.
pub trait TrialExecutor: Send + Sync {
    fn attempt(
        &self,
        identity: &str,
        secret: &str,
        cancel: &CancelToken,
        timeout: Duration,
    ) -> Outcome;
}

impl<F> TrialExecutor for F
where
    F: Fn(&str, &str, &CancelToken, Duration) -> Outcome + Send + Sync,
{
    fn attempt(
        &self,
        identity: &str,
        secret: &str,
        cancel: &CancelToken,
        timeout: Duration,
    ) -> Outcome {
        self(identity, secret, cancel, timeout)
    }
}

/// Action run by an executor after a successful authentication, over the
/// live connection `C`. At most one is configured per run.
pub trait FollowOn<C>: Send + Sync {
    fn run(&self, identity: &str, secret: &str, conn: &mut C) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Session {
        user: String,
    }

    struct Whoami;

    impl FollowOn<Session> for Whoami {
        fn run(&self, identity: &str, _secret: &str, conn: &mut Session) -> String {
            format!("{} logged in as {}", identity, conn.user)
        }
    }

    struct TableExecutor<F> {
        accept: (&'static str, &'static str),
        follow_on: F,
    }

    impl<F: FollowOn<Session>> TrialExecutor for TableExecutor<F> {
        fn attempt(
            &self,
            identity: &str,
            secret: &str,
            cancel: &CancelToken,
            _timeout: Duration,
        ) -> Outcome {
            if cancel.is_cancelled() {
                return Outcome::no_connection();
            }
            if (identity, secret) != self.accept {
                return Outcome::auth_failure();
            }
            let mut conn = Session {
                user: identity.to_uppercase(),
            };
            Outcome::success(Some(self.follow_on.run(identity, secret, &mut conn)))
        }
    }

    #[test]
    fn test_closure_executor() {
        let exec = |identity: &str, _: &str, _: &CancelToken, _: Duration| {
            if identity == "ok" {
                Outcome::success(None)
            } else {
                Outcome::auth_failure()
            }
        };
        let token = CancelToken::new();
        assert!(exec.attempt("ok", "", &token, Duration::from_secs(1)).is_success());
        assert!(!exec.attempt("no", "", &token, Duration::from_secs(1)).is_success());
    }

    #[test]
    fn test_follow_on_report_carried_in_outcome() {
        let exec = Arc::new(TableExecutor {
            accept: ("admin", "hunter2"),
            follow_on: Whoami,
        });
        let token = CancelToken::new();
        let outcome = exec.attempt("admin", "hunter2", &token, Duration::from_secs(1));
        assert_eq!(outcome.message.as_deref(), Some("admin logged in as ADMIN"));
        assert_eq!(
            exec.attempt("admin", "wrong", &token, Duration::from_secs(1)).kind,
            OutcomeKind::AuthFailure
        );
    }

    #[test]
    fn test_cancelled_executor_aborts() {
        let exec = TableExecutor {
            accept: ("admin", "hunter2"),
            follow_on: Whoami,
        };
        let token = CancelToken::new();
        token.cancel(crate::cancel::CancelReason::Requested);
        assert_eq!(
            exec.attempt("admin", "hunter2", &token, Duration::from_secs(1)).kind,
            OutcomeKind::NoConnection
        );
    }
}
