//! Per-page content rendering. Each page renders inside the page error
//! boundary and may fail with a `RenderError`.

pub mod auth;
pub mod results;
pub mod search;
