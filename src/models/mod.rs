pub mod club;
pub mod game;
pub mod geo;
pub mod player;
pub mod stream;
