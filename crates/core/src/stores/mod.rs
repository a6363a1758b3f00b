pub mod rest;

pub use rest::RestStore;
