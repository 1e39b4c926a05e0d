pub mod conflict;
pub mod error;
pub mod mapping;
pub mod multilang;
pub mod ports;
pub mod records;
pub mod remote;
pub mod validation;
pub mod value_objects;
