pub(crate) mod align;
pub(crate) mod block_match;
pub(crate) mod cache;
pub(crate) mod field;
pub(crate) mod provider;
