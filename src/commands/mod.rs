pub mod cat;
pub mod filestore;
