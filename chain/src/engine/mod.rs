//! The chain engine: block validation, the `add` protocol, and the
//! chain's structural self-check.

pub mod chain;
pub mod outcome;
pub mod validate;

pub use chain::Chain;
pub use outcome::AddOutcome;
pub use validate::validate;
