pub mod admin;
pub mod commands;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod tickets;
