pub mod hyperlink;
#[allow(clippy::module_inception)]
pub mod screen;
pub mod window;

pub use hyperlink::{ExtractedUrl, UrlExtractor};
pub use screen::{Screen, SelectionMode, SelectionOptions};
pub use window::ScreenWindow;
