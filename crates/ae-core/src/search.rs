//! Two-stage search over the media index.
//!
//! Stage one narrows the index with a case-insensitive SQL substring match.
//! Stage two scores each candidate's composite key against the query with a
//! pluggable `Scorer`, drops weak matches and sorts by score.

use std::time::{Duration, Instant};
use strsim::normalized_levenshtein;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::db::{library, Database, DbResult};
use crate::models::MediaRecord;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Scorer failed: {0}")]
    Failed(String),
}

/// Similarity metric used to re-rank candidates
pub trait Scorer: Send + Sync {
    /// Similarity of `query` to `candidate`, from 0 (unrelated) to 100 (match)
    fn score(&self, query: &str, candidate: &str) -> Result<f64, ScoreError>;
}

/// Best normalized Levenshtein similarity between the shorter string and
/// any equal-length window of the longer one, scaled to 0-100.
///
/// Case-sensitive, so "band" matches "Band" at 75 rather than 100. Case
/// folding only happens in the substring stage. Empty input scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialRatio;

impl Scorer for PartialRatio {
    fn score(&self, query: &str, candidate: &str) -> Result<f64, ScoreError> {
        let a: Vec<char> = query.chars().collect();
        let b: Vec<char> = candidate.chars().collect();
        let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

        if short.is_empty() {
            return Ok(0.0);
        }

        let needle: String = short.iter().collect();
        let mut best = 0.0_f64;

        for window in long.windows(short.len()) {
            let hay: String = window.iter().collect();
            best = best.max(normalized_levenshtein(&needle, &hay));
            if best >= 1.0 {
                break;
            }
        }

        Ok(best * 100.0)
    }
}

pub struct SearchEngine {
    db: Database,
    scorer: Box<dyn Scorer>,
    threshold: f64,
}

impl SearchEngine {
    /// Engine ranking with `PartialRatio`. Candidates must score above
    /// `threshold` to be returned.
    pub fn new(db: Database, threshold: f64) -> Self {
        Self {
            db,
            scorer: Box::new(PartialRatio),
            threshold,
        }
    }

    pub fn with_scorer(mut self, scorer: impl Scorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Search, returning an empty list if the store cannot be read
    pub fn search(&self, query: &str, limit: usize) -> Vec<MediaRecord> {
        self.try_search(query, limit).unwrap_or_else(|e| {
            error!(query, error = %e, "search failed");
            Vec::new()
        })
    }

    /// Search, surfacing store errors.
    ///
    /// A blank or whitespace-only query lists the first `limit` records by
    /// filename. Any other query is used as typed, surrounding whitespace
    /// included. Substring candidates are re-ranked; if scoring fails the
    /// candidates are returned in store order.
    pub fn try_search(&self, query: &str, limit: usize) -> DbResult<Vec<MediaRecord>> {
        if query.trim().is_empty() {
            return self.db.with_conn(|conn| library::get_page(conn, limit));
        }

        let candidates = self
            .db
            .with_conn(|conn| library::substring_search(conn, query, limit))?;

        match self.rank(query, &candidates) {
            Ok(ranked) => {
                debug!(query, candidates = candidates.len(), kept = ranked.len(), "ranked search results");
                Ok(ranked)
            }
            Err(e) => {
                warn!(query, error = %e, "ranking failed, returning unranked results");
                Ok(candidates)
            }
        }
    }

    fn rank(&self, query: &str, candidates: &[MediaRecord]) -> Result<Vec<MediaRecord>, ScoreError> {
        let mut scored = Vec::with_capacity(candidates.len());
        for record in candidates {
            let score = self.scorer.score(query, &record.search_key())?;
            if score > self.threshold {
                scored.push((score, record));
            }
        }

        // sort_by is stable: equal scores keep candidate order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().map(|(_, r)| r.clone()).collect())
    }
}

/// Holds back a query until input has been quiet for a settle time.
///
/// Time is passed in by the caller, so the debouncer works with any event
/// loop and is deterministic under test.
#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Record a keystroke. Replaces any query still waiting.
    pub fn input(&mut self, query: impl Into<String>, now: Instant) {
        self.pending = Some((query.into(), now));
    }

    /// When the pending query becomes due, if there is one
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.delay)
    }

    /// Take the pending query if the settle time has passed
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match self.deadline() {
            Some(due) if now >= due => self.pending.take().map(|(q, _)| q),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
