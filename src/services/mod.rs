pub mod auth;
pub mod authorization;
pub mod identity;
pub mod init;
pub mod medication_status;
pub mod medications;
pub mod notifications;
pub mod pets;
pub mod records;
pub mod sharing;
pub mod visibility;
