pub mod actor;
pub mod audit;
pub mod book;
pub mod id;
pub mod loan;
pub mod reservation;
