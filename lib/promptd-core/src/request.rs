use crate::config::Config;
use crate::platform::{Bounds, Position, Size};
use crate::surface_key::{CallerIdentity, SurfaceKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// What kind of prompt the requester wants on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Full permission grant dialog.
    #[default]
    Dialog,
    /// Lightweight security notice.
    Toast,
    /// Global switch panel, e.g. camera or microphone kill switch.
    ControlPanel,
}

impl SurfaceKind {
    /// Prefix of the platform window name; the request sequence number is appended.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            SurfaceKind::Dialog => "permissionDialog",
            SurfaceKind::Toast => "securityToast",
            SurfaceKind::ControlPanel => "globalSwitch",
        }
    }
}

/// Placement requested by the caller. Callers frequently send all zeroes when they
/// have no preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GeometryHint {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl GeometryHint {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Negative surface size {width}x{height}")]
    NegativeSize { width: i32, height: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGeometry {
    pub bounds: Bounds,
    /// The surface covers the display and should be resized with it.
    pub follows_display: bool,
}

/// Turns an optional hint into concrete bounds, falling back to the whole display when
/// the hint is missing or has no area.
pub fn resolve_geometry(
    hint: Option<&GeometryHint>,
    display: &Bounds,
) -> Result<ResolvedGeometry, GeometryError> {
    let Some(hint) = hint else {
        return Ok(ResolvedGeometry {
            bounds: display.clone(),
            follows_display: true,
        });
    };

    if hint.width < 0 || hint.height < 0 {
        return Err(GeometryError::NegativeSize {
            width: hint.width,
            height: hint.height,
        });
    }

    if hint.width == 0 || hint.height == 0 {
        return Ok(ResolvedGeometry {
            bounds: display.clone(),
            follows_display: true,
        });
    }

    Ok(ResolvedGeometry {
        bounds: Bounds::from_position(
            Position::new(hint.left, hint.top),
            Size::new(hint.width as u32, hint.height as u32),
        ),
        follows_display: false,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContentDescriptor {
    /// Page to load into the surface. Falls back to the configured page for the kind.
    pub page: Option<String>,
    /// Opaque arguments handed to the page, e.g. the permission group being requested.
    pub params: BTreeMap<String, String>,
}

impl ContentDescriptor {
    pub fn page(page: impl Into<String>) -> Self {
        Self {
            page: Some(page.into()),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// An inbound prompt request as delivered by the ability host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub caller: CallerIdentity,
    #[serde(default)]
    pub session_id: Option<u64>,
    #[serde(default)]
    pub geometry_hint: Option<GeometryHint>,
    #[serde(default)]
    pub content: ContentDescriptor,
    #[serde(default)]
    pub notify_kind: Option<SurfaceKind>,
}

impl Request {
    pub fn new(caller: CallerIdentity) -> Self {
        Self {
            caller,
            session_id: None,
            geometry_hint: None,
            content: ContentDescriptor::default(),
            notify_kind: None,
        }
    }

    pub fn with_session(mut self, session_id: u64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_geometry(mut self, hint: GeometryHint) -> Self {
        self.geometry_hint = Some(hint);
        self
    }

    pub fn with_content(mut self, content: ContentDescriptor) -> Self {
        self.content = content;
        self
    }

    pub fn with_kind(mut self, kind: SurfaceKind) -> Self {
        self.notify_kind = Some(kind);
        self
    }

    pub fn key(&self) -> SurfaceKey {
        SurfaceKey::new(self.caller.clone(), self.session_id)
    }

    pub fn kind(&self) -> SurfaceKind {
        self.notify_kind.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceStyle {
    pub background_color: String,
    pub corner_radius: Option<u32>,
}

/// Everything the factory needs to build a surface besides its bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceContent {
    pub name: String,
    pub kind: SurfaceKind,
    pub page: String,
    pub params: BTreeMap<String, String>,
    pub style: SurfaceStyle,
}

impl SurfaceContent {
    pub fn for_request(
        request: &Request,
        sequence: u64,
        bounds: &Bounds,
        display: &Bounds,
        config: &Config,
    ) -> Self {
        let kind = request.kind();
        let page = request
            .content
            .page
            .clone()
            .unwrap_or_else(|| config.page_for(kind).to_string());

        // Only surfaces narrower than the display get rounded corners
        let corner_radius = if bounds.size.width < display.size.width {
            Some(config.corner_radius)
        } else {
            None
        };

        Self {
            name: format!("{}{}", kind.name_prefix(), sequence),
            kind,
            page,
            params: request.content.params.clone(),
            style: SurfaceStyle {
                background_color: config.background_color.clone(),
                corner_radius,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> Bounds {
        Bounds::new(0, 0, 1080, 2340)
    }

    #[test]
    fn test_missing_hint_uses_display() {
        let resolved = resolve_geometry(None, &display()).unwrap();
        assert_eq!(resolved.bounds, display());
        assert!(resolved.follows_display);
    }

    #[test]
    fn test_zero_area_hint_uses_display() {
        let hint = GeometryHint::new(10, 10, 0, 300);
        let resolved = resolve_geometry(Some(&hint), &display()).unwrap();
        assert_eq!(resolved.bounds, display());
        assert!(resolved.follows_display);
    }

    #[test]
    fn test_explicit_hint_is_kept() {
        let hint = GeometryHint::new(40, 600, 1000, 800);
        let resolved = resolve_geometry(Some(&hint), &display()).unwrap();
        assert_eq!(resolved.bounds, Bounds::new(40, 600, 1000, 800));
        assert!(!resolved.follows_display);
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let hint = GeometryHint::new(0, 0, -5, 100);
        assert_eq!(
            resolve_geometry(Some(&hint), &display()),
            Err(GeometryError::NegativeSize {
                width: -5,
                height: 100
            })
        );
    }

    #[test]
    fn test_content_naming_and_style() {
        let config = Config::default();
        let request = Request::new(CallerIdentity::Uid(7)).with_kind(SurfaceKind::Toast);

        let narrow = SurfaceContent::for_request(
            &request,
            3,
            &Bounds::new(40, 600, 1000, 800),
            &display(),
            &config,
        );
        assert_eq!(narrow.name, "securityToast3");
        assert_eq!(narrow.page, config.toast_page);
        assert_eq!(narrow.style.corner_radius, Some(config.corner_radius));
        assert_eq!(narrow.style.background_color, "#00000000");

        let full = SurfaceContent::for_request(&request, 4, &display(), &display(), &config);
        assert_eq!(full.style.corner_radius, None);
    }

    #[test]
    fn test_explicit_page_wins() {
        let config = Config::default();
        let request = Request::new(CallerIdentity::Bundle("com.example".into()))
            .with_content(ContentDescriptor::page("pages/custom").with_param("group", "CAMERA"));
        let content = SurfaceContent::for_request(&request, 1, &display(), &display(), &config);
        assert_eq!(content.page, "pages/custom");
        assert_eq!(content.params.get("group").map(String::as_str), Some("CAMERA"));
        assert_eq!(content.kind, SurfaceKind::Dialog);
        assert_eq!(content.name, "permissionDialog1");
    }

    #[test]
    fn test_request_key() {
        let request = Request::new(CallerIdentity::Uid(5)).with_session(2);
        assert_eq!(request.key(), SurfaceKey::uid(5).with_session(2));
    }
}
