pub mod deck;
pub mod pdf;
pub mod png;
