//! Front-end state wrapped around the commander

use tracing::debug;

use commander::controller::{Commander, Dialog};
use commander::errors::OperationResult;

use crate::input::TextField;
use crate::ui::{PaneView, Theme};

/// What a text prompt is for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptKind {
    Filter,
    Rename,
    Mkdir,
    NewFile,
    Zip,
    AddFavorite,
    SelectPattern,
    OpenWith { extension: String },
}

impl PromptKind {
    pub fn title(&self) -> String {
        match self {
            PromptKind::Filter => "Filter".to_string(),
            PromptKind::Rename => "Rename".to_string(),
            PromptKind::Mkdir => "Create directory".to_string(),
            PromptKind::NewFile => "Create file".to_string(),
            PromptKind::Zip => "Zip to archive".to_string(),
            PromptKind::AddFavorite => "Add favorite".to_string(),
            PromptKind::SelectPattern => "Select files".to_string(),
            PromptKind::OpenWith { extension } => format!("Open .{} files with", extension),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Prompt {
    pub kind: PromptKind,
    pub field: TextField,
}

/// Username and password being typed for an SMB share
#[derive(Clone, Debug, Default)]
pub struct SmbForm {
    pub username: TextField,
    pub password: TextField,
    pub on_password: bool,
}

/// Front-end overlays that have no counterpart in the commander
#[derive(Clone, Debug)]
pub enum Overlay {
    Prompt(Prompt),
    ConfirmDelete { count: usize },
    Favorites { selected: usize },
}

pub struct App {
    pub commander: Commander,
    pub theme: Theme,
    pub overlay: Option<Overlay>,
    pub smb_form: Option<SmbForm>,
    pub views: [PaneView; 2],
    pub should_quit: bool,
}

impl App {
    pub fn new(commander: Commander) -> Self {
        Self {
            commander,
            theme: Theme::default(),
            overlay: None,
            smb_form: None,
            views: [PaneView::default(); 2],
            should_quit: false,
        }
    }

    pub fn open_prompt(&mut self, kind: PromptKind, initial: &str) {
        self.overlay = Some(Overlay::Prompt(Prompt {
            kind,
            field: TextField::with_text(initial),
        }));
    }

    /// Apply background results. The SMB form goes away with its dialog.
    pub fn poll(&mut self) -> bool {
        let changed = self.commander.poll();
        if !matches!(self.commander.dialog(), Some(Dialog::SmbAuth(_))) {
            self.smb_form = None;
        }
        changed
    }

    /// Rows of the active pane visible at the last draw
    pub fn page_size(&self) -> isize {
        let view = match self.commander.active_side() {
            commander::state::Side::Left => &self.views[0],
            commander::state::Side::Right => &self.views[1],
        };
        view.visible_height.max(1) as isize
    }
}

/// The commander already put the error on the status line
pub fn settle<T>(result: OperationResult<T>) {
    if let Err(e) = result {
        debug!(error = %e, "action failed");
    }
}
