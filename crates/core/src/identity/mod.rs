pub mod enrollment;
pub mod identity_database;
pub mod identity_match;
pub mod identity_record;
