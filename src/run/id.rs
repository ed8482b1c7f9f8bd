use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of one run, supplied by the caller or generated.
///
/// Cheap to clone; every registry call takes it explicitly, so the protocol
/// does not depend on which thread makes the call.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Arc<str>);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Fresh random identity (UUID v4)
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({:?})", &*self.0)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<&RunId> for RunId {
    fn from(id: &RunId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_across_constructors() {
        assert_eq!(RunId::from("r1"), RunId::new(String::from("r1")));
        assert_eq!(RunId::from("r1").to_string(), "r1");
        assert_eq!(format!("{:?}", RunId::from("r1")), "RunId(\"r1\")");
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids: HashSet<RunId> = (0..100).map(|_| RunId::generate()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&RunId::from("r2")).unwrap();
        assert_eq!(json, "\"r2\"");
        let back: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "r2");
    }
}
