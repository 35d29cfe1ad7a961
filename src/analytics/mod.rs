mod effectiveness;
mod frequency;
mod local;
mod run;
mod tally;

pub(crate) use run::{DerivationSummary, derive, derive_value};
