pub(crate) mod admission;
pub(crate) mod classify;
pub(crate) mod executor;
pub(crate) mod workspace;
