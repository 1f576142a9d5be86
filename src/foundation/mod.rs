pub(crate) mod core;
pub(crate) mod diag;
pub(crate) mod error;
