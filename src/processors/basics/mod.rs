// src/processors/basics/mod.rs
pub mod time_axis;

pub use time_axis::time_axis;
