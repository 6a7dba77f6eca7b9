use crate::request::Request;
use crate::surface_key::{CallerIdentity, SurfaceKey, SurfaceTicket};
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub struct PlatformError {
    pub error_type: PlatformErrorType,
    pub backtrace: Backtrace,
}

#[derive(Debug)]
pub enum PlatformErrorType {
    Unknown,
    Error(String),
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            PlatformErrorType::Unknown => write!(f, "unknown platform error"),
            PlatformErrorType::Error(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for PlatformError {}

impl From<PlatformErrorType> for PlatformError {
    fn from(error_type: PlatformErrorType) -> Self {
        Self {
            error_type,
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<&str> for PlatformError {
    fn from(error: &str) -> Self {
        PlatformErrorType::Error(error.to_string()).into()
    }
}

impl From<String> for PlatformError {
    fn from(error: String) -> Self {
        PlatformErrorType::Error(error).into()
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Opaque reference to a platform surface. The resource behind it belongs to the
/// [`SurfaceFactory`](crate::platform::SurfaceFactory) that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl Display for SurfaceHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub enum HostEvent {
    /// A client asked for a prompt surface.
    Request(Request),
    /// The platform reported that a shown surface went away. May arrive more than once
    /// for the same surface.
    Dismissed(SurfaceTicket),
    /// The requester withdrew its request. Applies to pending surfaces as well.
    Cancel(SurfaceKey),
    /// The default display changed size, e.g. a fold or rotation. Only the newest of
    /// a burst is delivered.
    DisplayChanged(Bounds),
    Shutdown,
}

/// Sent back to whoever asked for a surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequesterNotice {
    /// The requester's surface went away, answered or withdrawn.
    Dismissed {
        caller: CallerIdentity,
        session_id: Option<u64>,
    },
    /// No surface will be shown for the request.
    Failed {
        caller: CallerIdentity,
        session_id: Option<u64>,
        reason: String,
    },
}

impl RequesterNotice {
    pub fn dismissed(key: &SurfaceKey) -> Self {
        RequesterNotice::Dismissed {
            caller: key.caller().clone(),
            session_id: key.session_id(),
        }
    }

    pub fn failed(key: &SurfaceKey, reason: impl Into<String>) -> Self {
        RequesterNotice::Failed {
            caller: key.caller().clone(),
            session_id: key.session_id(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Bounds {
    pub position: Position,
    pub size: Size,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            position: Position::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_position(position: Position, size: Size) -> Self {
        Self { position, size }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_display() {
        let error: PlatformError = "window server unavailable".into();
        assert_eq!(error.to_string(), "window server unavailable");
        let error: PlatformError = PlatformErrorType::Unknown.into();
        assert_eq!(error.to_string(), "unknown platform error");
    }
}
