pub mod backend;
pub mod locator;
pub mod webdriver;

pub use backend::WebDriverBackend;
