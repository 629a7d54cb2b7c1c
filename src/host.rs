//! Host environment seam
//!
//! The processor never talks to a platform directly. Listener registration and
//! element geometry come from an [`ElementHost`] supplied by the embedder.

use crate::types::{ElementGeometry, ElementId};
use std::collections::HashMap;

/// Native event names bound when the platform has the modern wheel event
pub const MODERN_EVENTS: &[&str] = &["wheel"];

/// Native event names bound on platforms without it
pub const LEGACY_EVENTS: &[&str] = &["mousewheel", "DomMouseScroll", "MozMousePixelScroll"];

/// Platform services the processor relies on
pub trait ElementHost {
    /// Pixels per line for `deltaMode = line`
    fn line_height(&self, element: ElementId) -> f64;

    /// Pixels per page for `deltaMode = page`
    fn page_height(&self, element: ElementId) -> f64;

    /// Whether the platform delivers the modern `wheel` event
    fn supports_wheel(&self) -> bool {
        true
    }

    fn add_listener(&mut self, element: ElementId, event_name: &str);

    fn remove_listener(&mut self, element: ElementId, event_name: &str);

    /// Event names to bind for this host
    fn event_names(&self) -> &'static [&'static str] {
        if self.supports_wheel() {
            MODERN_EVENTS
        } else {
            LEGACY_EVENTS
        }
    }
}

/// In-memory host with fixed geometry, used by the CLI, the FFI layer and tests
#[derive(Debug, Clone)]
pub struct StaticHost {
    default_geometry: ElementGeometry,
    geometry: HashMap<ElementId, ElementGeometry>,
    listeners: HashMap<ElementId, Vec<String>>,
    supports_wheel: bool,
}

impl Default for StaticHost {
    fn default() -> Self {
        Self::new(ElementGeometry::new(16.0, 800.0))
    }
}

impl StaticHost {
    pub fn new(default_geometry: ElementGeometry) -> Self {
        Self {
            default_geometry,
            geometry: HashMap::new(),
            listeners: HashMap::new(),
            supports_wheel: true,
        }
    }

    /// Emulate a platform without the modern wheel event
    pub fn legacy(mut self) -> Self {
        self.supports_wheel = false;
        self
    }

    /// Geometry for one element, overriding the default
    pub fn set_geometry(&mut self, element: ElementId, geometry: ElementGeometry) {
        self.geometry.insert(element, geometry);
    }

    fn geometry_of(&self, element: ElementId) -> ElementGeometry {
        self.geometry
            .get(&element)
            .copied()
            .unwrap_or(self.default_geometry)
    }

    /// Event names currently bound on an element
    pub fn listeners(&self, element: ElementId) -> &[String] {
        self.listeners
            .get(&element)
            .map(|names| names.as_slice())
            .unwrap_or(&[])
    }
}

impl ElementHost for StaticHost {
    fn line_height(&self, element: ElementId) -> f64 {
        self.geometry_of(element).line_height_px
    }

    fn page_height(&self, element: ElementId) -> f64 {
        self.geometry_of(element).page_height_px
    }

    fn supports_wheel(&self) -> bool {
        self.supports_wheel
    }

    fn add_listener(&mut self, element: ElementId, event_name: &str) {
        self.listeners
            .entry(element)
            .or_default()
            .push(event_name.to_string());
    }

    fn remove_listener(&mut self, element: ElementId, event_name: &str) {
        if let Some(names) = self.listeners.get_mut(&element) {
            names.retain(|name| name != event_name);
            if names.is_empty() {
                self.listeners.remove(&element);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_follow_support() {
        assert_eq!(StaticHost::default().event_names(), MODERN_EVENTS);
        assert_eq!(StaticHost::default().legacy().event_names(), LEGACY_EVENTS);
    }

    #[test]
    fn test_geometry_override() {
        let mut host = StaticHost::default();
        host.set_geometry(ElementId(2), ElementGeometry::new(20.0, 600.0));
        assert_eq!(host.line_height(ElementId(1)), 16.0);
        assert_eq!(host.line_height(ElementId(2)), 20.0);
        assert_eq!(host.page_height(ElementId(2)), 600.0);
    }

    #[test]
    fn test_listener_bookkeeping() {
        let mut host = StaticHost::default();
        host.add_listener(ElementId(1), "wheel");
        assert_eq!(host.listeners(ElementId(1)), ["wheel".to_string()]);
        host.remove_listener(ElementId(1), "wheel");
        host.remove_listener(ElementId(1), "wheel");
        assert!(host.listeners(ElementId(1)).is_empty());
    }
}
