pub mod client;
pub mod dialect;
pub mod mapping_repository;
