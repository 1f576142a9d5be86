pub(crate) mod builder;
pub(crate) mod filter_script;
pub(crate) mod ir;
