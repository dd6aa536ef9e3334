//! Dispatch of classified envelopes to the reconciler

use crate::containers::ContainerId;
use crate::error::IngestError;
use crate::observability::{StructuredLogger, SyncMetrics};
use crate::reconciler::{Outcome, StateStore};

use super::envelope::{classify, DeltaOp, Envelope};

/// Classification of a received envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    State,
    Delta,
    Unrecognized,
    Malformed,
}

impl EnvelopeKind {
    pub fn label(&self) -> &'static str {
        match self {
            EnvelopeKind::State => "state",
            EnvelopeKind::Delta => "delta",
            EnvelopeKind::Unrecognized => "unrecognized",
            EnvelopeKind::Malformed => "malformed",
        }
    }
}

/// Summary of what one envelope did to the canonical state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub kind: EnvelopeKind,
    /// Operations that mutated state
    pub applied: usize,
    /// Operations received but not applied (unknown ids, duplicates, bad parts)
    pub skipped: usize,
}

impl IngestReport {
    fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            applied: 0,
            skipped: 0,
        }
    }
}

/// Applies raw envelopes to a [`StateStore`]
///
/// Never fails: malformed input is logged, counted and dropped.
#[derive(Clone)]
pub struct Ingestor {
    store: StateStore,
    metrics: SyncMetrics,
    logger: StructuredLogger,
}

impl Ingestor {
    pub fn new(store: StateStore, logger: StructuredLogger) -> Self {
        Self {
            store,
            metrics: SyncMetrics::new(),
            logger,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Decode, classify and apply one envelope
    pub fn handle_message(&self, raw: &str) -> IngestReport {
        let report = match classify(raw) {
            Ok(Envelope::State(snapshot)) => {
                let result = self.store.apply_snapshot(snapshot);
                self.logger
                    .log_snapshot(result.applied.len(), &result.unknown, result.rejected.len());
                self.metrics.inc_mutation("snapshot");
                for _ in &result.unknown {
                    self.metrics.inc_skipped(Outcome::UnknownContainer.label());
                }

                IngestReport {
                    kind: EnvelopeKind::State,
                    applied: 1,
                    skipped: result.unknown.len() + result.rejected.len(),
                }
            }
            Ok(Envelope::Delta(delta)) => {
                let mut report = IngestReport::new(EnvelopeKind::Delta);

                if delta.ops.is_empty() && delta.rejected.is_empty() {
                    self.logger.log_unknown_delta(&delta.keys);
                    self.metrics.inc_skipped("unknown_delta");
                }

                for error in &delta.rejected {
                    self.reject(error);
                    report.skipped += 1;
                }

                for op in delta.ops {
                    if self.apply_op(op).mutated() {
                        report.applied += 1;
                    } else {
                        report.skipped += 1;
                    }
                }

                report
            }
            Ok(Envelope::Unrecognized(keys)) => {
                self.logger
                    .log_discarded("unrecognized", &format!("keys: {:?}", keys));
                IngestReport::new(EnvelopeKind::Unrecognized)
            }
            Err(error) => {
                self.reject(&error);
                IngestReport::new(EnvelopeKind::Malformed)
            }
        };

        self.metrics.inc_envelope(report.kind.label());
        if report.applied > 0 {
            self.metrics
                .set_containers_active(self.store.read(|s| s.active_count()) as i64);
        }

        report
    }

    fn apply_op(&self, op: DeltaOp) -> Outcome {
        let name = op.name();

        let outcome = match op {
            DeltaOp::UpdateConfig(config) => self.store.apply_config_delta(config),
            DeltaOp::Wallet(wallet) => self.store.apply_wallet_delta(wallet),
            DeltaOp::Status { id, status } => match self.resolve(&id, name) {
                Some(id) => {
                    let previous = self
                        .store
                        .read(|s| s.container(id).map(|c| c.status.clone()))
                        .unwrap_or_default();
                    let outcome = self.store.apply_status_delta(id, status.clone());
                    if outcome.mutated() {
                        self.logger.log_status_transition(id, &previous, &status);
                    }
                    outcome
                }
                None => Outcome::UnknownContainer,
            },
            DeltaOp::Stats { id, sample } => match self.resolve(&id, name) {
                Some(id) => {
                    let outcome = self.store.apply_stats_delta(id, sample);
                    if outcome.mutated() {
                        self.record_cpu(id);
                    }
                    outcome
                }
                None => Outcome::UnknownContainer,
            },
            DeltaOp::Log { id, line } => match self.resolve(&id, name) {
                Some(id) => self.store.append_log(id, line),
                None => Outcome::UnknownContainer,
            },
            DeltaOp::Error { id, error } => match self.resolve(&id, name) {
                Some(id) => self.store.apply_error_delta(id, error),
                None => Outcome::UnknownContainer,
            },
        };

        if outcome.mutated() {
            self.metrics.inc_mutation(name);
        } else {
            self.metrics.inc_skipped(outcome.label());
        }

        outcome
    }

    fn resolve(&self, name: &str, op: &str) -> Option<ContainerId> {
        let id = ContainerId::from_wire(name);
        if id.is_none() {
            self.logger.log_unknown_container(name, op);
        }
        id
    }

    fn record_cpu(&self, id: ContainerId) {
        let cpu = self.store.read(|s| {
            s.container(id)
                .and_then(|c| c.usage.as_ref())
                .and_then(|u| u.cpu_percent)
        });
        if let Some(cpu) = cpu {
            self.metrics.set_cpu_percent(id, cpu);
        }
    }

    fn reject(&self, error: &IngestError) {
        self.logger.log_discarded(error.reason(), &error.to_string());
        self.metrics.inc_skipped(error.reason());
    }
}
