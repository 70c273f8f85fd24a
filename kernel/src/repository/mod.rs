pub mod audit;
pub mod circulation;
pub mod health;
pub mod reservation;
