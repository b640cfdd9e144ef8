//! citemill-etl: the silver and gold stages.
//!
//! `flatten` turns every bronze batch into the single silver table;
//! `aggregate` recomputes the five gold views from it. Both are one-pass
//! read-transform-write jobs with no internal state between runs.

pub mod aggregate;
pub mod flatten;
pub mod tabular;
