//! Program slicing around the failure site
//!
//! Criterion extraction, the static and dynamic passes, source rewriting with its
//! line-shift bookkeeping, unification of per-criterion slices, and materialization.

pub mod criteria;
pub mod entry;
pub mod inject;
pub mod materialize;
pub mod pass;
pub mod shift;
pub mod unify;
