pub(crate) mod pole_removal;
