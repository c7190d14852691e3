pub mod actor;
pub mod db;
pub mod entity;
pub mod error;
pub mod metadata;
mod migrations;
pub mod permissions;
pub mod services;
pub mod state;
pub mod types;
pub mod util;
