pub mod catalog;
pub mod dump;
