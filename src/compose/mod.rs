pub(crate) mod context;
pub(crate) mod result;
pub(crate) mod settings;
