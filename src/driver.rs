//! Batch orchestration.
//!
//! [`BatchDriver::run`] takes a [`BatchFormat`] through
//! `Init → Authenticating → Processing → Finalizing → Done`. A failed token
//! exchange moves it to `Aborted` before the format's sink is opened, so an
//! aborted run writes nothing.
//!
//! Inside `Processing` every record is handled on its own: a record without a
//! lookup key, a search with no match, a transport or HTTP failure and an
//! unusable response are all logged and counted, the record is written out
//! unchanged, and the loop moves on. A resolved record that cannot hold the
//! identifier is written unchanged and counted as failed. Records are written
//! in source order, one output record per input record.

use crate::auth::{self, ClientCredentials, Credential};
use crate::client::MetadataClient;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::formats::{BatchFormat, Emitted};
use crate::interpret::{interpret, LookupResult};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Created, nothing attempted yet
    Init,
    /// Exchanging client credentials for a token
    Authenticating,
    /// Resolving records
    Processing,
    /// Flushing the sink
    Finalizing,
    /// Output written
    Done,
    /// Stopped without completing; see the error returned by `run`
    Aborted,
}

/// Aggregate counters for one run, plus where the output went.
///
/// At completion `processed == resolved + skipped_no_identifier +
/// skipped_no_match + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Records read and written
    pub processed: usize,
    /// Records that received an identifier
    pub resolved: usize,
    /// Records without a lookup key
    pub skipped_no_identifier: usize,
    /// Records the service had no match for
    pub skipped_no_match: usize,
    /// Records whose lookup failed (transport, HTTP status, unusable response)
    pub failed: usize,
    /// Output file, when the format writes to disk
    pub output: Option<PathBuf>,
}

impl BatchOutcome {
    /// Records passed through without a lookup result.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_no_identifier + self.skipped_no_match
    }

    /// Whether every processed record is accounted for exactly once.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.processed
            == self.resolved + self.skipped_no_identifier + self.skipped_no_match + self.failed
    }

    fn record(&mut self, disposition: &Disposition) {
        self.processed += 1;
        match disposition {
            Disposition::Resolved(_) => self.resolved += 1,
            Disposition::NoIdentifier => self.skipped_no_identifier += 1,
            Disposition::NoMatch => self.skipped_no_match += 1,
            Disposition::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed: {} resolved, {} skipped ({} without identifier, {} no match), {} failed",
            self.processed,
            self.resolved,
            self.skipped(),
            self.skipped_no_identifier,
            self.skipped_no_match,
            self.failed
        )
    }
}

/// Receives progress from a running batch.
///
/// Any `FnMut(usize)` closure is a reporter that sees the processed count.
pub trait ProgressReporter {
    /// Called once processing starts, with the record count when known.
    fn on_start(&mut self, _total: Option<usize>) {}

    /// Called after each record is written; `processed` increases by one
    /// per call.
    fn on_record(&mut self, processed: usize);

    /// Called once the output has been written.
    fn on_finish(&mut self, _outcome: &BatchOutcome) {}
}

impl<F: FnMut(usize)> ProgressReporter for F {
    fn on_record(&mut self, processed: usize) {
        self(processed);
    }
}

/// Reporter that ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn on_record(&mut self, _processed: usize) {}
}

/// Reporter that logs a line every `every` records.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    every: usize,
    total: Option<usize>,
}

impl LogProgress {
    /// Log every `every` records (at least 1).
    #[must_use]
    pub fn new(every: usize) -> Self {
        LogProgress {
            every: every.max(1),
            total: None,
        }
    }
}

impl ProgressReporter for LogProgress {
    fn on_start(&mut self, total: Option<usize>) {
        self.total = total;
        match total {
            Some(total) => info!(total, "processing records"),
            None => info!("processing records"),
        }
    }

    fn on_record(&mut self, processed: usize) {
        if processed % self.every == 0 {
            match self.total {
                Some(total) => info!(processed, total, "progress"),
                None => info!(processed, "progress"),
            }
        }
    }

    fn on_finish(&mut self, outcome: &BatchOutcome) {
        info!(
            processed = outcome.processed,
            resolved = outcome.resolved,
            skipped = outcome.skipped(),
            failed = outcome.failed,
            "batch complete"
        );
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    Resolved(String),
    NoIdentifier,
    NoMatch,
    Failed,
}

/// Runs one batch against the metadata service.
#[derive(Debug)]
pub struct BatchDriver {
    client: MetadataClient,
    credentials: ClientCredentials,
    scope: String,
    token_url: String,
    state: BatchState,
}

impl BatchDriver {
    /// Create a driver from its parts.
    #[must_use]
    pub fn new(
        client: MetadataClient,
        credentials: ClientCredentials,
        scope: &str,
        token_url: &str,
    ) -> Self {
        BatchDriver {
            client,
            credentials,
            scope: scope.to_string(),
            token_url: token_url.to_string(),
            state: BatchState::Init,
        }
    }

    /// Create a driver from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP
    /// transport cannot be built.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            MetadataClient::from_config(config)?,
            config.credentials(),
            &config.scope,
            &config.token_url,
        ))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Resolve every record of `format` and write the output.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Auth`](crate::error::ResolveError::Auth) if no
    /// token could be obtained (nothing is written), or an I/O error if the
    /// source or sink fails. Per-record failures are never returned.
    pub async fn run<F: BatchFormat>(
        &mut self,
        format: &mut F,
        progress: &mut dyn ProgressReporter,
    ) -> Result<BatchOutcome> {
        self.state = BatchState::Authenticating;
        let credential = match auth::acquire(
            self.client.http(),
            &self.credentials,
            &self.scope,
            &self.token_url,
        )
        .await
        {
            Ok(credential) => credential,
            Err(e) => {
                error!(error = %e, "authentication failed; batch aborted");
                self.state = BatchState::Aborted;
                return Err(e);
            },
        };

        self.state = BatchState::Processing;
        let outcome = match self.process(format, &credential, progress).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "batch stopped");
                self.state = BatchState::Aborted;
                return Err(e);
            },
        };

        self.state = BatchState::Finalizing;
        if let Err(e) = format.finish() {
            error!(error = %e, "failed to write output");
            self.state = BatchState::Aborted;
            return Err(e);
        }
        self.state = BatchState::Done;

        progress.on_finish(&outcome);
        Ok(outcome)
    }

    async fn process<F: BatchFormat>(
        &self,
        format: &mut F,
        credential: &Credential,
        progress: &mut dyn ProgressReporter,
    ) -> Result<BatchOutcome> {
        format.begin()?;
        progress.on_start(format.total());

        let mut outcome = BatchOutcome {
            output: format.output_path().map(PathBuf::from),
            ..BatchOutcome::default()
        };
        while let Some(mut item) = format.next_record()? {
            let mut disposition = self.resolve(format, &item, credential).await;
            if let Disposition::Resolved(value) = &disposition {
                format.apply(&mut item, value);
            }
            if format.emit(item)? == Emitted::Reverted {
                disposition = Disposition::Failed;
            }

            outcome.record(&disposition);
            progress.on_record(outcome.processed);
        }

        debug_assert!(outcome.is_balanced());
        Ok(outcome)
    }

    async fn resolve<F: BatchFormat>(
        &self,
        format: &F,
        item: &F::Item,
        credential: &Credential,
    ) -> Disposition {
        let Some(identifier) = format.extract(item) else {
            debug!("no identifier; record passed through");
            return Disposition::NoIdentifier;
        };

        let raw = match self.client.query(&identifier, credential).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "lookup failed; record passed through");
                return Disposition::Failed;
            },
        };

        match interpret(&raw, format.mode()) {
            LookupResult::Resolved(value) => {
                info!(identifier = %identifier, value = %value, mode = %format.mode(), "resolved");
                Disposition::Resolved(value)
            },
            LookupResult::NoMatch => {
                info!(identifier = %identifier, "no matching record; skipped");
                Disposition::NoMatch
            },
            LookupResult::Error(kind, detail) => {
                warn!(identifier = %identifier, kind = %kind, detail = %detail, "unusable response; skipped");
                Disposition::Failed
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_balance() {
        let mut outcome = BatchOutcome::default();
        outcome.record(&Disposition::Resolved("wid1".to_string()));
        outcome.record(&Disposition::NoMatch);
        outcome.record(&Disposition::NoIdentifier);
        outcome.record(&Disposition::Failed);

        assert_eq!(outcome.processed, 4);
        assert_eq!(outcome.skipped(), 2);
        assert!(outcome.is_balanced());
    }

    #[test]
    fn test_outcome_display() {
        let outcome = BatchOutcome {
            processed: 3,
            resolved: 1,
            skipped_no_identifier: 0,
            skipped_no_match: 1,
            failed: 1,
            output: None,
        };
        assert_eq!(
            outcome.to_string(),
            "3 processed: 1 resolved, 1 skipped (0 without identifier, 1 no match), 1 failed"
        );
    }

    #[test]
    fn test_closure_reporter() {
        let mut seen = Vec::new();
        {
            let mut reporter = |processed: usize| seen.push(processed);
            let reporter: &mut dyn ProgressReporter = &mut reporter;
            reporter.on_start(Some(2));
            reporter.on_record(1);
            reporter.on_record(2);
            reporter.on_finish(&BatchOutcome::default());
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_log_progress_minimum_interval() {
        let progress = LogProgress::new(0);
        assert_eq!(progress.every, 1);
    }

    #[test]
    fn test_new_driver_starts_in_init() {
        let config = ServiceConfig::new(
            "http://localhost:1/search",
            "http://localhost:1/token",
            "id",
            "secret",
        );
        let driver = BatchDriver::from_config(&config).unwrap();
        assert_eq!(driver.state(), BatchState::Init);
    }
}
