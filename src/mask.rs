pub(crate) mod alpha;
