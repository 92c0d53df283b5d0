//! Candidate veto hook.

use bulkedit_core::DocumentRef;

/// What the candidates are about to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterPurpose {
    /// Content edits.
    Edit,
    /// Renames.
    Rename,
}

/// Narrows located candidates before any preview or job is produced.
///
/// Returning a document that was not offered has no effect. Dropped
/// candidates are reported to the caller as filtered out.
pub trait FilterHook: Send + Sync {
    fn filter_candidates(&self, purpose: FilterPurpose, candidates: &[DocumentRef]) -> Vec<DocumentRef>;
}

/// Keeps every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl FilterHook for PassThrough {
    fn filter_candidates(&self, _purpose: FilterPurpose, candidates: &[DocumentRef]) -> Vec<DocumentRef> {
        candidates.to_vec()
    }
}

impl<F> FilterHook for F
where
    F: Fn(FilterPurpose, &[DocumentRef]) -> Vec<DocumentRef> + Send + Sync,
{
    fn filter_candidates(&self, purpose: FilterPurpose, candidates: &[DocumentRef]) -> Vec<DocumentRef> {
        self(purpose, candidates)
    }
}
