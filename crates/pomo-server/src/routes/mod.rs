pub mod events;
pub mod sessions;
pub mod tasks;
