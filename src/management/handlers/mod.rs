pub mod cache;
pub mod credentials;
pub mod health;
pub mod mural;
