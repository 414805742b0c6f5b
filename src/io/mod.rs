pub mod artifact;
pub mod compression;
pub mod lines;
