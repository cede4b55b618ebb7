pub mod capture;
pub mod registry;
