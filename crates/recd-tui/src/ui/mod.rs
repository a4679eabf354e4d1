//! Terminal UI module using ratatui.
//!
//! - `render`: Main frame rendering, layout and the page error boundary
//! - `input`: Keyboard event handling
//! - `styles`: Color schemes and text styling
//! - `pages`: Page content (search, login, signup, results)

pub mod input;
pub mod pages;
pub mod render;
pub mod styles;
