//! UI components

pub mod dialog;
mod dialog_helpers;
pub mod panel;
pub mod status;
pub mod theme;

pub use dialog::{CommanderDialog, ConfirmDeleteDialog, FavoritesDialog, PromptDialog};
pub use panel::{PaneView, PaneWidget};
pub use status::{KeyBar, StatusBar};
pub use theme::Theme;
