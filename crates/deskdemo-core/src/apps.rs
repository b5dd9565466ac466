//! Desktop app catalog: the icons on the desktop and what they open.

use serde::Serialize;
use serde_json::json;

use crate::window::{Geometry, WindowSpec};

/// What a window renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    Chat,
    Logs,
    Metrics,
    Errors,
    About,
}

/// A launchable desktop app.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopApp {
    pub id: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub kind: AppKind,
    #[serde(flatten)]
    pub geometry: Geometry,
}

const APPS: &[DesktopApp] = &[
    DesktopApp {
        id: "chat",
        title: "Agent Chat",
        icon: "💬",
        kind: AppKind::Chat,
        geometry: Geometry {
            x: 120.0,
            y: 80.0,
            width: 520.0,
            height: 620.0,
            min_width: 360.0,
            min_height: 400.0,
        },
    },
    DesktopApp {
        id: "logs",
        title: "Logs",
        icon: "📜",
        kind: AppKind::Logs,
        geometry: Geometry {
            x: 180.0,
            y: 120.0,
            width: 560.0,
            height: 420.0,
            min_width: 320.0,
            min_height: 240.0,
        },
    },
    DesktopApp {
        id: "metrics",
        title: "Metrics",
        icon: "📈",
        kind: AppKind::Metrics,
        geometry: Geometry {
            x: 240.0,
            y: 160.0,
            width: 520.0,
            height: 400.0,
            min_width: 320.0,
            min_height: 240.0,
        },
    },
    DesktopApp {
        id: "errors",
        title: "Errors",
        icon: "🐞",
        kind: AppKind::Errors,
        geometry: Geometry {
            x: 300.0,
            y: 200.0,
            width: 480.0,
            height: 380.0,
            min_width: 320.0,
            min_height: 240.0,
        },
    },
    DesktopApp {
        id: "about",
        title: "About",
        icon: "ℹ️",
        kind: AppKind::About,
        geometry: Geometry {
            x: 360.0,
            y: 240.0,
            width: 380.0,
            height: 260.0,
            min_width: 280.0,
            min_height: 200.0,
        },
    },
];

impl DesktopApp {
    /// Every app on the desktop, in icon order.
    pub fn all() -> &'static [DesktopApp] {
        APPS
    }

    pub fn find(id: &str) -> Option<&'static DesktopApp> {
        APPS.iter().find(|app| app.id == id)
    }

    /// The window opened when this app's icon is activated.
    ///
    /// The window id is the app id, so launching a running app re-focuses
    /// its window instead of opening a second one.
    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            id: self.id.to_string(),
            title: self.title.to_string(),
            icon: self.icon.to_string(),
            geometry: self.geometry,
            maximized: false,
            content: json!({ "kind": self.kind }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowManager;

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<&str> = DesktopApp::all().iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), DesktopApp::all().len());
    }

    #[test]
    fn test_launch_twice_refocuses() {
        let mut wm = WindowManager::new();
        let chat = DesktopApp::find("chat").unwrap();
        wm.open(chat.window_spec());
        wm.open(DesktopApp::find("logs").unwrap().window_spec());
        wm.open(chat.window_spec());

        assert_eq!(wm.len(), 2);
        assert_eq!(wm.focused().unwrap().id, "chat");
        assert_eq!(wm.get("chat").unwrap().content["kind"], "chat");
    }

    #[test]
    fn test_find_unknown() {
        assert!(DesktopApp::find("solitaire").is_none());
    }
}
