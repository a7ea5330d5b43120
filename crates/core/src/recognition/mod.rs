pub mod domain;
pub mod infrastructure;
pub mod recognizer;
pub mod worker;
