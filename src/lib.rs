// src/lib.rs
pub mod check;
pub mod config;
pub mod registry;
pub mod scheduler;
