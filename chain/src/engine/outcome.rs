//! The three-way result of [`super::Chain::add`].

/// Outcome of attempting to add a candidate block to a [`super::Chain`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddOutcome {
    /// The block linearly extended the tip, or it was a depth-1 fork
    /// candidate that lost the tie-break (the tip is unchanged, but the
    /// proposal was handled — see the module docs on `Chain::add`).
    Appended,
    /// A depth-1 fork candidate won the tie-break and replaced the tip.
    Reorganized,
    /// The block was invalid, or its `prev` pointed deeper than the
    /// second-to-last block.
    Rejected,
}
