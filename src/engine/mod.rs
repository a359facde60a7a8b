pub(crate) mod api;
pub(crate) mod blend;
pub(crate) mod loopback;
