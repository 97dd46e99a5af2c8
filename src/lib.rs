pub mod bridge;
pub mod config;
pub mod mail;
pub mod shared;
pub mod tickets;
pub mod users;
