pub mod assemble;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod sink;
pub mod table;
