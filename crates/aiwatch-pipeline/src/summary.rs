use std::fmt;

/// Where a source was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Transforming,
    Matching,
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Transforming => "transforming",
            Stage::Matching => "matching",
            Stage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// One itemized problem in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub source_id: String,
    pub message: String,
}

/// Counts for a source that made it through every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub source_id: String,
    pub items: usize,
    pub duplicates: usize,
    pub transform_warnings: usize,
    pub confirmed_matches: usize,
    pub tentative_matches: usize,
    pub records_written: usize,
    /// `(upsert_key, message)` for each record the repository rejected.
    pub record_failures: Vec<(String, String)>,
}

/// Result of processing one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Completed(SourceReport),
    Failed {
        source_id: String,
        stage: Stage,
        message: String,
    },
    /// Cancellation was raised before the source started.
    Skipped { source_id: String },
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources_attempted: usize,
    pub sources_succeeded: usize,
    pub sources_skipped: usize,
    pub items_ingested: usize,
    pub transform_warnings: usize,
    pub confirmed_matches: usize,
    pub tentative_matches: usize,
    pub records_written: usize,
    pub records_failed: usize,
    pub errors: Vec<SourceError>,
}

impl RunSummary {
    /// Fold per-source outcomes, in the order given, into a summary.
    #[must_use]
    pub fn from_outcomes(outcomes: &[SourceOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.absorb(outcome);
        }
        summary
    }

    fn absorb(&mut self, outcome: &SourceOutcome) {
        match outcome {
            SourceOutcome::Completed(report) => {
                self.sources_attempted += 1;
                self.sources_succeeded += 1;
                self.items_ingested += report.items;
                self.transform_warnings += report.transform_warnings;
                self.confirmed_matches += report.confirmed_matches;
                self.tentative_matches += report.tentative_matches;
                self.records_written += report.records_written;
                self.records_failed += report.record_failures.len();
                self.errors
                    .extend(report.record_failures.iter().map(|(key, message)| SourceError {
                        source_id: report.source_id.clone(),
                        message: format!("record {key}: {message}"),
                    }));
            }
            SourceOutcome::Failed {
                source_id,
                stage,
                message,
            } => {
                self.sources_attempted += 1;
                self.errors.push(SourceError {
                    source_id: source_id.clone(),
                    message: format!("{stage}: {message}"),
                });
            }
            SourceOutcome::Skipped { .. } => self.sources_skipped += 1,
        }
    }

    /// True only when every source ran, none failed, and every record was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.sources_skipped == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "sources: {} attempted, {} succeeded, {} skipped",
            self.sources_attempted, self.sources_succeeded, self.sources_skipped
        )?;
        writeln!(
            f,
            "items: {} ingested, {} transform warnings",
            self.items_ingested, self.transform_warnings
        )?;
        writeln!(
            f,
            "matches: {} confirmed, {} tentative",
            self.confirmed_matches, self.tentative_matches
        )?;
        write!(
            f,
            "records: {} written, {} failed",
            self.records_written, self.records_failed
        )?;
        for error in &self.errors {
            write!(f, "\n  [{}] {}", error.source_id, error.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(id: &str, written: usize, failures: usize) -> SourceOutcome {
        SourceOutcome::Completed(SourceReport {
            source_id: id.to_string(),
            items: 3,
            duplicates: 0,
            transform_warnings: 1,
            confirmed_matches: 1,
            tentative_matches: 1,
            records_written: written,
            record_failures: (0..failures)
                .map(|i| (format!("key-{i}"), "rejected".to_string()))
                .collect(),
        })
    }

    #[test]
    fn summary_counts_each_outcome_kind() {
        let summary = RunSummary::from_outcomes(&[
            completed("a", 2, 0),
            SourceOutcome::Failed {
                source_id: "b".to_string(),
                stage: Stage::Fetching,
                message: "endpoint not found".to_string(),
            },
            completed("c", 1, 1),
            SourceOutcome::Skipped {
                source_id: "d".to_string(),
            },
        ]);

        assert_eq!(summary.sources_attempted, 3);
        assert_eq!(summary.sources_succeeded, 2);
        assert_eq!(summary.sources_skipped, 1);
        assert_eq!(summary.items_ingested, 6);
        assert_eq!(summary.records_written, 3);
        assert_eq!(summary.records_failed, 1);
        assert_eq!(summary.errors.len(), 2);
        assert_eq!(summary.errors[0].source_id, "b");
        assert_eq!(summary.errors[0].message, "fetching: endpoint not found");
        assert!(!summary.is_success());
    }

    #[test]
    fn clean_run_is_success() {
        let summary = RunSummary::from_outcomes(&[completed("a", 2, 0)]);
        assert!(summary.is_success());
    }

    #[test]
    fn skipped_sources_are_not_success() {
        let summary = RunSummary::from_outcomes(&[SourceOutcome::Skipped {
            source_id: "a".to_string(),
        }]);
        assert!(summary.errors.is_empty());
        assert!(!summary.is_success());
    }

    #[test]
    fn display_lists_errors() {
        let summary = RunSummary::from_outcomes(&[SourceOutcome::Failed {
            source_id: "dead-feed".to_string(),
            stage: Stage::Idle,
            message: "unknown feed source type 'gopher'".to_string(),
        }]);
        let rendered = summary.to_string();
        assert!(rendered.contains("[dead-feed] idle: unknown feed source type 'gopher'"));
    }
}
