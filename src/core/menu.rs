#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ShowNetwork,
    RestartNetwork,
    TestNetwork,
    ViewLogs,
    Shell,
    Reboot,
    Shutdown,
}

impl MenuAction {
    /// Confirmation question for destructive actions.
    pub fn confirmation(self) -> Option<&'static str> {
        match self {
            MenuAction::Reboot => Some("Reboot? (y/n): "),
            MenuAction::Shutdown => Some("Shut down? (y/n): "),
            _ => None,
        }
    }

    /// Interactive actions hand the terminal over and return when the operator exits.
    pub fn is_interactive(self) -> bool {
        matches!(self, MenuAction::Shell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub action: MenuAction,
}

pub const MENU_ITEMS: &[MenuItem] = &[
    MenuItem {
        label: "Configure Management Network",
        action: MenuAction::ShowNetwork,
    },
    MenuItem {
        label: "Restart Management Network",
        action: MenuAction::RestartNetwork,
    },
    MenuItem {
        label: "Test Management Network",
        action: MenuAction::TestNetwork,
    },
    MenuItem {
        label: "View System Logs",
        action: MenuAction::ViewLogs,
    },
    MenuItem {
        label: "Troubleshooting Options (Shell)",
        action: MenuAction::Shell,
    },
    MenuItem {
        label: "Restart Host",
        action: MenuAction::Reboot,
    },
    MenuItem {
        label: "Shut Down Host",
        action: MenuAction::Shutdown,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuModel {
    items: &'static [MenuItem],
    selected: usize,
}

impl Default for MenuModel {
    fn default() -> Self {
        Self {
            items: MENU_ITEMS,
            selected: 0,
        }
    }
}

impl MenuModel {
    pub fn items(&self) -> &'static [MenuItem] {
        self.items
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&'static MenuItem> {
        self.items.get(self.selected)
    }

    pub fn reset(&mut self) {
        self.selected = 0;
    }

    pub fn up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn down(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1).min(self.items.len() - 1);
        }
    }
}
