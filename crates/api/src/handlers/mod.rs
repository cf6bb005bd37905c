pub mod admin;
pub mod appointments;
pub mod availability;
pub mod conversations;
pub mod customers;
