pub(crate) mod camera;
pub(crate) mod error;
pub(crate) mod math;
