pub mod hook;
pub mod lifecycle;
pub mod model;
pub mod notification;
pub mod repository;
