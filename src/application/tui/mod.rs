pub mod calendar_view;
pub mod theme;

pub use calendar_view::*;
pub use theme::*;
