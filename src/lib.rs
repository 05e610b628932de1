#![forbid(unsafe_code)]

//! Card-art generation core: template-driven compositing of card decks,
//! PNG/PDF export, and the plumbing around an external diffusion tool.
//! The interactive editor lives elsewhere; this crate is the part that
//! loads layouts and decks and turns them into pixels.

pub mod assets;
pub mod data;
pub mod diffusion;
pub mod export;
pub mod foundation;
pub mod job;
pub mod layout;
pub mod project;
pub mod render;

pub use data::deck::{CardRow, Deck};
pub use data::loader::load_deck;
pub use foundation::color::Color;
pub use foundation::error::{CardsmithError, CardsmithResult};
pub use foundation::geom::{Canvas, Position, Size};
pub use layout::{ElementSpec, LayoutDocument, LayoutMeta};
pub use project::{RenderProjection, project};
pub use render::compositor::Compositor;
pub use render::text::FontLibrary;
