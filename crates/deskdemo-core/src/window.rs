//! Window registry for the desktop.
//!
//! The manager owns every open window record and the stacking counter.
//! Operations are total: anything addressed to an unknown window id is a
//! silent no-op, reported back as `false` so callers can log it.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Identifier of a window. Apps use their own id so relaunching re-focuses.
pub type WindowId = String;

/// Position and size of a window, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub min_width: f64,
    #[serde(default)]
    pub min_height: f64,
}

impl Geometry {
    /// Create a geometry with no minimum size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_width: 0.0,
            min_height: 0.0,
        }
    }

    /// Set the minimum size a resize may shrink the window to.
    #[must_use]
    pub fn with_min_size(mut self, min_width: f64, min_height: f64) -> Self {
        self.min_width = min_width;
        self.min_height = min_height;
        self
    }
}

/// A request to open a window: a record without stacking or focus state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSpec {
    pub id: WindowId,
    pub title: String,
    pub icon: String,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub maximized: bool,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// One open window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRecord {
    pub id: WindowId,
    pub title: String,
    pub icon: String,
    #[serde(flatten)]
    pub geometry: Geometry,
    pub minimized: bool,
    pub maximized: bool,
    pub focused: bool,
    pub z_index: u64,
    pub content: serde_json::Value,
}

/// In-memory registry of open windows.
///
/// At most one record is focused at a time, and every focus-causing
/// operation hands out a stacking index strictly greater than any issued
/// before, so the highest `z_index` is always the topmost window.
#[derive(Debug, Clone, Default)]
pub struct WindowManager {
    windows: Vec<WindowRecord>,
    top_z: u64,
}

impl WindowManager {
    /// Create an empty desktop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window, or bring an existing one with the same id to the front.
    ///
    /// Re-opening leaves geometry, title and content untouched; it only
    /// clears `minimized`, focuses the window and raises it.
    pub fn open(&mut self, spec: WindowSpec) -> &WindowRecord {
        let z_index = self.next_z();
        self.unfocus_all();

        if let Some(idx) = self.position(&spec.id) {
            debug!(window = %spec.id, z_index, "re-focusing already open window");
            let record = &mut self.windows[idx];
            record.minimized = false;
            record.focused = true;
            record.z_index = z_index;
            return &self.windows[idx];
        }

        debug!(window = %spec.id, z_index, "opening window");
        self.windows.push(WindowRecord {
            id: spec.id,
            title: spec.title,
            icon: spec.icon,
            geometry: spec.geometry,
            minimized: false,
            maximized: spec.maximized,
            focused: true,
            z_index,
            content: spec.content,
        });
        let last = self.windows.len() - 1;
        &self.windows[last]
    }

    /// Remove a window. Returns the removed record, if there was one.
    pub fn close(&mut self, id: &str) -> Option<WindowRecord> {
        let idx = self.position(id)?;
        debug!(window = %id, "closing window");
        Some(self.windows.remove(idx))
    }

    /// Hide a window to the taskbar. It loses focus.
    pub fn minimize(&mut self, id: &str) -> bool {
        self.update(id, |w| {
            w.minimized = true;
            w.focused = false;
        })
    }

    /// Toggle the maximized flag. Stacking and focus are unchanged.
    pub fn maximize(&mut self, id: &str) -> bool {
        self.update(id, |w| w.maximized = !w.maximized)
    }

    /// Bring a window back from the taskbar, focused and on top.
    pub fn restore(&mut self, id: &str) -> bool {
        if self.position(id).is_none() {
            trace!(window = %id, "restore on unknown window");
            return false;
        }
        self.raise(id, true);
        true
    }

    /// Focus a window and raise it, leaving minimized/maximized alone.
    pub fn focus(&mut self, id: &str) -> bool {
        if self.position(id).is_none() {
            trace!(window = %id, "focus on unknown window");
            return false;
        }
        self.raise(id, false);
        true
    }

    /// Move a window's top-left corner.
    pub fn move_to(&mut self, id: &str, x: f64, y: f64) -> bool {
        self.update(id, |w| {
            w.geometry.x = x;
            w.geometry.y = y;
        })
    }

    /// Resize a window, never below its minimum size.
    pub fn resize(&mut self, id: &str, width: f64, height: f64) -> bool {
        self.update(id, |w| {
            w.geometry.width = width.max(w.geometry.min_width);
            w.geometry.height = height.max(w.geometry.min_height);
        })
    }

    /// Look up a window.
    pub fn get(&self, id: &str) -> Option<&WindowRecord> {
        self.windows.iter().find(|w| w.id == id)
    }

    /// All windows in the order they were opened (taskbar order).
    pub fn windows(&self) -> &[WindowRecord] {
        &self.windows
    }

    /// Windows from bottom to top.
    pub fn stacking_order(&self) -> Vec<&WindowRecord> {
        let mut ordered: Vec<&WindowRecord> = self.windows.iter().collect();
        ordered.sort_by_key(|w| w.z_index);
        ordered
    }

    /// The focused window, if any.
    pub fn focused(&self) -> Option<&WindowRecord> {
        self.windows.iter().find(|w| w.focused)
    }

    /// The window with the highest stacking index.
    pub fn topmost(&self) -> Option<&WindowRecord> {
        self.windows.iter().max_by_key(|w| w.z_index)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn next_z(&mut self) -> u64 {
        self.top_z += 1;
        self.top_z
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.windows.iter().position(|w| w.id == id)
    }

    fn unfocus_all(&mut self) {
        for w in &mut self.windows {
            w.focused = false;
        }
    }

    fn raise(&mut self, id: &str, unminimize: bool) {
        let z_index = self.next_z();
        for w in &mut self.windows {
            if w.id == id {
                w.focused = true;
                w.z_index = z_index;
                if unminimize {
                    w.minimized = false;
                }
            } else {
                w.focused = false;
            }
        }
    }

    fn update(&mut self, id: &str, f: impl FnOnce(&mut WindowRecord)) -> bool {
        match self.windows.iter_mut().find(|w| w.id == id) {
            Some(record) => {
                f(record);
                true
            }
            None => {
                trace!(window = %id, "operation on unknown window");
                false
            }
        }
    }
}
