pub mod modal;
pub mod render;
pub mod state;

pub use modal::Modal;
pub use state::{AppState, Level, Notification, ReviewDraft, Route, Surface};
