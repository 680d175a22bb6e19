pub mod memory;
pub mod runner;
pub mod value;
pub mod visitor;
