pub mod blob;
pub mod identity;
pub mod persistence;
