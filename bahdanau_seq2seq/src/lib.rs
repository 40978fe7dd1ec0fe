#![recursion_limit = "256"]

pub mod attention;
pub mod checkpoint;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod export;
pub mod inference;
pub mod manifest;
pub mod model;
