//! Review session: one measured candidate pending at a time.
//!
//! A [`ReviewSession`] pulls outcomes from a cursor over a batch of
//! objects. [`next`](ReviewSession::next) skips failed objects and
//! stops at the next measured one, which then stays pending until
//! [`decide`](ReviewSession::decide) resolves it. Accepted candidates
//! become result rows; rejected ones are only counted.
//!
//! All state, including the [`ReviewPolicy`], lives in the session, so
//! independent sessions can run side by side.

use serde::{Deserialize, Serialize};

use crate::types::{MeasurementResult, Width};

/// Rules for deciding a candidate without asking a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewPolicy {
    /// Candidates must be strictly longer than this to be accepted
    /// automatically. `0.0` disables the length check.
    pub length_threshold: f64,
    /// Decide every candidate with [`auto_decision`](Self::auto_decision)
    /// instead of asking.
    pub accept_all: bool,
}

impl ReviewPolicy {
    /// Default for [`length_threshold`](Self::length_threshold).
    pub const DEFAULT_LENGTH_THRESHOLD: f64 = 0.0;

    /// Whether `result` passes the automatic checks: a single branch
    /// (or no branch count at all) and a total length above the
    /// threshold.
    #[must_use]
    pub fn auto_decision(&self, result: &MeasurementResult) -> bool {
        let single_branch = result.branch_count.is_none_or(|b| b == 1);
        let long_enough =
            self.length_threshold <= 0.0 || result.total_length() > self.length_threshold;
        single_branch && long_enough
    }
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            length_threshold: Self::DEFAULT_LENGTH_THRESHOLD,
            accept_all: false,
        }
    }
}

/// A measured object awaiting a decision.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Object name (usually the pixel file's stem).
    pub name: String,
    /// The measurement.
    pub result: MeasurementResult,
    /// Encoded overlay image shown to the reviewer.
    pub overlay_png: Vec<u8>,
}

/// An object that produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skipped {
    /// Object name.
    pub name: String,
    /// Why it was skipped.
    pub reason: String,
    /// Routine filters (too small, empty) are quiet and kept out of
    /// [`ReviewSession::skipped`].
    pub quiet: bool,
}

/// One accepted measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Object name.
    pub name: String,
    /// Width, or unavailable.
    pub width: Width,
    /// Skeleton length plus both extra lengths.
    pub total_length: f64,
}

/// Misuse of the review protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    /// `next()` was called while a candidate is still pending.
    #[error("candidate {name} is still awaiting a decision")]
    DecisionPending {
        /// The pending candidate's name.
        name: String,
    },

    /// `decide()` was called with nothing pending.
    #[error("no candidate is awaiting a decision")]
    NoPendingCandidate,
}

/// Review state over a cursor of per-object outcomes.
///
/// The cursor yields `Ok(candidate)` for measured objects and
/// `Err(failure)` for everything else; failures convert into
/// [`Skipped`] records.
pub struct ReviewSession<I> {
    cursor: I,
    policy: ReviewPolicy,
    pending: Option<Candidate>,
    rows: Vec<ResultRow>,
    skipped: Vec<Skipped>,
    filtered: usize,
    rejected: usize,
}

impl<I, F> ReviewSession<I>
where
    I: Iterator<Item = Result<Candidate, F>>,
    F: Into<Skipped>,
{
    /// Start a session over `cursor`.
    pub const fn new(cursor: I, policy: ReviewPolicy) -> Self {
        Self {
            cursor,
            policy,
            pending: None,
            rows: Vec::new(),
            skipped: Vec::new(),
            filtered: 0,
            rejected: 0,
        }
    }

    /// The session's policy.
    #[must_use]
    pub const fn policy(&self) -> &ReviewPolicy {
        &self.policy
    }

    /// Advance to the next measured candidate, skipping failures.
    ///
    /// Returns `Ok(None)` once the cursor is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::DecisionPending`] if the previous
    /// candidate has not been decided.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<&Candidate>, ReviewError> {
        if let Some(pending) = &self.pending {
            return Err(ReviewError::DecisionPending {
                name: pending.name.clone(),
            });
        }
        for outcome in self.cursor.by_ref() {
            match outcome {
                Ok(candidate) => {
                    log::debug!("candidate {} ready for review", candidate.name);
                    return Ok(Some(&*self.pending.insert(candidate)));
                }
                Err(failure) => {
                    let skipped: Skipped = failure.into();
                    if skipped.quiet {
                        log::debug!("filtered {}: {}", skipped.name, skipped.reason);
                        self.filtered += 1;
                    } else {
                        log::warn!("skipped {}: {}", skipped.name, skipped.reason);
                        self.skipped.push(skipped);
                    }
                }
            }
        }
        Ok(None)
    }

    /// The candidate awaiting a decision, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<&Candidate> {
        self.pending.as_ref()
    }

    /// Resolve the pending candidate. Accepting records a result row.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NoPendingCandidate`] if nothing is pending.
    pub fn decide(&mut self, accept: bool) -> Result<(), ReviewError> {
        let candidate = self.pending.take().ok_or(ReviewError::NoPendingCandidate)?;
        if accept {
            log::info!(
                "accepted {}: width {:?}, length {:.3}",
                candidate.name,
                candidate.result.width,
                candidate.result.total_length()
            );
            self.rows.push(ResultRow {
                name: candidate.name,
                width: candidate.result.width,
                total_length: candidate.result.total_length(),
            });
        } else {
            log::info!("rejected {}", candidate.name);
            self.rejected += 1;
        }
        Ok(())
    }

    /// Resolve the pending candidate with the policy's
    /// [`auto_decision`](ReviewPolicy::auto_decision). Returns whether
    /// it was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NoPendingCandidate`] if nothing is pending.
    pub fn auto_decide(&mut self) -> Result<bool, ReviewError> {
        let accept = self
            .pending
            .as_ref()
            .map(|c| self.policy.auto_decision(&c.result))
            .ok_or(ReviewError::NoPendingCandidate)?;
        self.decide(accept)?;
        Ok(accept)
    }

    /// Resolve the pending candidate: automatically when the policy has
    /// [`accept_all`](ReviewPolicy::accept_all) set, otherwise with the
    /// reviewer's answer from `ask`. Returns whether it was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NoPendingCandidate`] if nothing is pending.
    pub fn resolve(&mut self, ask: impl FnOnce(&Candidate) -> bool) -> Result<bool, ReviewError> {
        let candidate = self.pending.as_ref().ok_or(ReviewError::NoPendingCandidate)?;
        let accept = if self.policy.accept_all {
            self.policy.auto_decision(&candidate.result)
        } else {
            ask(candidate)
        };
        self.decide(accept)?;
        Ok(accept)
    }

    /// Accepted rows, in decision order.
    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Objects that failed for a reason worth reporting.
    #[must_use]
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    /// Number of objects dropped by routine filters.
    #[must_use]
    pub const fn filtered(&self) -> usize {
        self.filtered
    }

    /// Number of rejected candidates.
    #[must_use]
    pub const fn rejected(&self) -> usize {
        self.rejected
    }

    /// Consume the session, returning the accepted rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}
