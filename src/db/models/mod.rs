#![allow(unused_imports)]

//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` work.

pub mod grant;
pub mod health_record;
pub mod medication;
pub mod pet;
pub mod user;

pub use self::grant::*;
pub use self::health_record::*;
pub use self::medication::*;
pub use self::pet::*;
pub use self::user::*;
