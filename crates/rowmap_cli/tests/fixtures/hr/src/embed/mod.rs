pub mod employee;
pub mod manager;
pub mod mood;
pub mod person;
