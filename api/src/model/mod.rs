pub mod audit;
pub mod book;
pub mod loan;
pub mod reservation;
