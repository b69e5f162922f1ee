pub mod catalogue;
pub mod library;
pub mod session;
