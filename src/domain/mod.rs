pub mod models;
pub mod trigger;
