pub mod auth;
pub mod health;
pub mod medications;
pub mod pets;
pub mod records;
pub mod shares;
