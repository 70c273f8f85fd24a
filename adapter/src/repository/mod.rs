pub mod audit;
pub mod circulation;
mod common;
pub mod health;
pub mod reservation;
