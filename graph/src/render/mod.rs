pub mod content;
pub mod text;
pub mod viewport;

pub use content::{lock, ContentConfig, HistoryContent, SharedContent};
pub use text::{adjust_string, Color, DefaultFormatter, Fragment, RowFormatter, RowView, Style};
pub use viewport::Viewport;
