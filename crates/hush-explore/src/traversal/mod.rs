pub mod frontier;
pub mod origin;
pub mod runner;
pub mod select;
