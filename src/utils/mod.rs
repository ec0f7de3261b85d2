pub mod auth;
pub(crate) mod encode;
