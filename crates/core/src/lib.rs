pub mod capture;
pub mod identity;
pub mod overlay;
pub mod recognition;
pub mod session;
pub mod shared;
