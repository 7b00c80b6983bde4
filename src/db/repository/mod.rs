pub mod foods;
pub mod grants;
pub mod health_records;
pub mod medications;
pub mod pets;
pub mod user;

pub use foods::FoodRepository;
pub use grants::{GrantFeed, GrantStore, SqliteGrantStore, StoreError};
pub use health_records::HealthRecordRepository;
pub use medications::MedicationRepository;
pub use pets::PetRepository;
pub use user::UserRepository;
