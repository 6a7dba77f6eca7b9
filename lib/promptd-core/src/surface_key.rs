use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Who is asking for a prompt. Hosts identify callers either by bundle name or by a
/// numeric uid/access token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerIdentity {
    Bundle(String),
    Uid(u64),
}

impl Display for CallerIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CallerIdentity::Bundle(name) => write!(f, "{name}"),
            CallerIdentity::Uid(uid) => write!(f, "uid:{uid}"),
        }
    }
}

/// Two requests with equal keys belong to the same logical requester and share a surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceKey {
    caller: CallerIdentity,
    session_id: Option<u64>,
}

impl SurfaceKey {
    pub fn new(caller: CallerIdentity, session_id: Option<u64>) -> Self {
        Self { caller, session_id }
    }

    pub fn bundle(name: impl Into<String>) -> Self {
        Self::new(CallerIdentity::Bundle(name.into()), None)
    }

    pub fn uid(uid: u64) -> Self {
        Self::new(CallerIdentity::Uid(uid), None)
    }

    pub fn with_session(mut self, session_id: u64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session_id
    }
}

impl Display for SurfaceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.session_id {
            Some(session) => write!(f, "{}/{}", self.caller, session),
            None => write!(f, "{}", self.caller),
        }
    }
}

/// Assigned by the registry on insert. Never reused within a process.
pub type SurfaceId = u64;

/// Names one particular surface generation for a key. Dismissals carry a ticket so a
/// stale signal cannot tear down a newer surface that reuses the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceTicket {
    pub key: SurfaceKey,
    pub id: SurfaceId,
}

impl SurfaceTicket {
    pub fn new(key: SurfaceKey, id: SurfaceId) -> Self {
        Self { key, id }
    }
}

impl Display for SurfaceTicket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.key, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structural_equality() {
        assert_eq!(SurfaceKey::bundle("com.example"), SurfaceKey::bundle("com.example"));
        assert_ne!(SurfaceKey::bundle("com.example"), SurfaceKey::bundle("com.other"));
        assert_ne!(
            SurfaceKey::bundle("com.example"),
            SurfaceKey::bundle("com.example").with_session(1)
        );
        assert_ne!(SurfaceKey::uid(7), SurfaceKey::bundle("7"));
    }

    #[test]
    fn test_hash_matches_equality() {
        let mut keys = HashSet::new();
        keys.insert(SurfaceKey::uid(100).with_session(3));
        assert!(keys.contains(&SurfaceKey::uid(100).with_session(3)));
        assert!(!keys.contains(&SurfaceKey::uid(100)));
    }

    #[test]
    fn test_display() {
        assert_eq!(SurfaceKey::bundle("com.example").to_string(), "com.example");
        assert_eq!(SurfaceKey::uid(42).with_session(2).to_string(), "uid:42/2");
        let ticket = SurfaceTicket::new(SurfaceKey::uid(42), 9);
        assert_eq!(ticket.to_string(), "uid:42@9");
    }

    #[test]
    fn test_caller_identity_json() {
        let caller: CallerIdentity = serde_json::from_str(r#"{"bundle":"com.example"}"#).unwrap();
        assert_eq!(caller, CallerIdentity::Bundle("com.example".to_string()));
        let caller: CallerIdentity = serde_json::from_str(r#"{"uid":20010}"#).unwrap();
        assert_eq!(caller, CallerIdentity::Uid(20010));
    }
}
