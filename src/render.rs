pub(crate) mod color;
pub(crate) mod composite;
pub(crate) mod warp;
