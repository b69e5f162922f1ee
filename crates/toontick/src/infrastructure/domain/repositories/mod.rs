pub mod catalogue;
pub mod guest;
pub mod library;
pub mod session;
