pub mod deck;
pub mod loader;
