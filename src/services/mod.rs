pub mod cleanup;
pub mod geo;
pub mod session;
pub mod token;
