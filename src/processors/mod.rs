// src/processors/mod.rs
pub mod baseline;
pub mod basics;
pub mod filters;
pub mod isoline;
pub mod windows;
