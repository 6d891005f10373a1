pub mod backend;
pub mod plan;
pub mod xdotool;

pub use backend::DesktopBackend;
pub use xdotool::{InputDriver, WindowQuery, XdoTool};
