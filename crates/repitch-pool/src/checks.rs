//! Invariant checks and the fatal error reporter.
//!
//! Violations are programmer errors. With `strict` on, the first violation
//! is handed to the [`FatalReporter`], which never returns. With `strict`
//! off the conditions are not even evaluated.

use std::fmt;
use std::sync::Arc;

/// An invariant violation, identified by the short code shown on the
/// device display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    /// Steal notification for an index past the declared cluster count.
    StolenIndexOutOfRange,
    /// Write position recomputed after a steal lies outside the waveform.
    StolenWritePosOutOfRange,
    /// Existing cluster count after a steal differs from the stolen index.
    StolenExistenceMismatch,
    /// A slot that should hold a cluster was empty.
    MissingCluster,
    /// Write position beyond the declared waveform length.
    WritePosBeyondCapacity,
    /// Write position not a multiple of the frame size.
    WritePosMisaligned,
    /// Existing cluster count changed unexpectedly while truncating.
    TruncateExistenceMismatch,
    /// New cluster index beyond the declared cluster count.
    SetupBeyondDeclared,
    /// New cluster index skips ahead of the existing clusters.
    SetupOutOfSequence,
    /// Existing cluster count beyond the declared cluster count.
    ExistenceBeyondDeclared,
    /// Cache cluster outside external memory.
    ClusterNotExternal,
    /// Predecessor of a cache cluster outside external memory.
    PredecessorNotExternal,
    /// Reordering a cluster that is currently held.
    PrioritizeHeldCluster,
    /// Deallocating a cluster that is already free.
    DeallocateFreeCluster,
    /// Queue links disagree with queue heads/tails.
    QueueLinkMismatch,
    /// Queue operation on a cluster that is free or held.
    QueueInvalidState,
    /// Pool picked a victim whose owner cannot be found.
    UnknownOwner,
    /// Hold requested on a free (or deallocated but still held) cluster.
    HoldFreeCluster,
}

impl Violation {
    pub fn code(self) -> &'static str {
        match self {
            Violation::StolenIndexOutOfRange => "E297",
            Violation::StolenWritePosOutOfRange => "E299",
            Violation::StolenExistenceMismatch => "E295",
            Violation::MissingCluster => "E167",
            Violation::WritePosBeyondCapacity => "E301",
            Violation::WritePosMisaligned => "E302",
            Violation::TruncateExistenceMismatch => "E294",
            Violation::SetupBeyondDeclared => "E126",
            Violation::SetupOutOfSequence => "E293",
            Violation::ExistenceBeyondDeclared => "E304",
            Violation::ClusterNotExternal => "C002",
            Violation::PredecessorNotExternal => "C001",
            Violation::PrioritizeHeldCluster => "C003",
            Violation::DeallocateFreeCluster => "P001",
            Violation::QueueLinkMismatch => "P002",
            Violation::QueueInvalidState => "P003",
            Violation::UnknownOwner => "P004",
            Violation::HoldFreeCluster => "P005",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.code(), self)
    }
}

/// Halts on an invariant violation.
pub trait FatalReporter: Send + Sync {
    fn report_fatal(&self, violation: Violation) -> !;
}

/// Logs the violation and panics with its code.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicReporter;

impl FatalReporter for PanicReporter {
    fn report_fatal(&self, violation: Violation) -> ! {
        tracing::error!(code = violation.code(), ?violation, "fatal invariant violation");
        panic!("fatal error {violation}");
    }
}

/// Strict/relaxed switch plus the reporter to call.
#[derive(Clone)]
pub struct InvariantChecks {
    strict: bool,
    reporter: Arc<dyn FatalReporter>,
}

impl fmt::Debug for InvariantChecks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvariantChecks")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

impl Default for InvariantChecks {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}

impl InvariantChecks {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            reporter: Arc::new(PanicReporter),
        }
    }

    pub fn with_reporter(strict: bool, reporter: Arc<dyn FatalReporter>) -> Self {
        Self { strict, reporter }
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Reports `violation` unless `holds` returns true. Skipped entirely when relaxed.
    #[inline]
    pub fn ensure(&self, holds: impl FnOnce() -> bool, violation: Violation) {
        if self.strict && !holds() {
            self.reporter.report_fatal(violation);
        }
    }
}
