pub mod favorites;
pub mod history;
pub mod pane;
pub mod session;

pub use pane::{LoadState, PaneState};
pub use session::{ClipboardOp, FileManagerSession, SmbCredentials};

/// Which pane is meant
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}
