pub mod database;
pub mod hook;
pub mod notification;
pub mod redis;
pub mod repository;
