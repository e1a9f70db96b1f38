pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod init;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

pub use error::ShelfmarkError;
