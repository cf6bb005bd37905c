mod appointment_repo;
mod conversation_repo;
mod product_repo;
mod scheduling_settings_repo;

pub use appointment_repo::{day_lock_key, AppointmentRepo};
pub use conversation_repo::ConversationRepo;
pub use product_repo::ProductRepo;
pub use scheduling_settings_repo::SchedulingSettingsRepo;
