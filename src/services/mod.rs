pub mod auth;
pub mod cascade;
pub mod clubs;
pub mod denormalize;
pub mod games;
pub mod players;
pub mod stream;
pub mod views;
