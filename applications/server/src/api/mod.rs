/// API route modules
pub mod cache;
pub mod health;
pub mod mastering;
pub mod stream;
pub mod tracks;
