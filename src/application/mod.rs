pub mod category;
pub mod conflict;
pub mod mapping;
pub mod stock;
pub mod validation;
