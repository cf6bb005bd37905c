pub mod appointment;
pub mod conversation;
pub mod product;
pub mod scheduling_settings;
