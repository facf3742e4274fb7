use serde::Serialize;

use crate::models::GraphViolation;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    InvalidInput,
    NotFound,
    PayloadTooLarge,
    Unauthorized,
    Unknown,
}

/// Structured payload attached to an error so a client can act on every problem at once.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetails {
    GraphViolations { violations: Vec<GraphViolation> },
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: &'static str,
    pub details: Option<ErrorDetails>,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn database(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Database,
            code: "database_error",
            public,
            details: None,
            source,
        }
    }

    pub fn invalid(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code: "invalid_input",
            public,
            details: None,
            source,
        }
    }

    pub fn invalid_with_code(
        code: &'static str,
        public: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code,
            public,
            details: None,
            source,
        }
    }

    pub fn invalid_graph(violations: Vec<GraphViolation>, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code: "invalid_project_graph",
            public: "Project graph failed validation",
            details: Some(ErrorDetails::GraphViolations { violations }),
            source,
        }
    }

    pub fn not_found(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code: "not_found",
            public,
            details: None,
            source,
        }
    }

    pub fn payload_too_large(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::PayloadTooLarge,
            code: "payload_too_large",
            public,
            details: None,
            source,
        }
    }

    pub fn unauthorized(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unauthorized,
            code: "unauthorized",
            public,
            details: None,
            source,
        }
    }

    pub fn unknown(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            code: "unknown_error",
            public,
            details: None,
            source,
        }
    }

    pub fn graph_violations(&self) -> &[GraphViolation] {
        match &self.details {
            Some(ErrorDetails::GraphViolations { violations }) => violations,
            None => &[],
        }
    }
}

impl std::fmt::Display for LibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {:#}", self.public, self.code, self.source)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;
    use crate::models::{EdgeEndpoint, EdgeId, NodeId};

    #[test]
    fn invalid_graph_exposes_violations() {
        let violation = GraphViolation::DanglingEdge {
            edge_id: EdgeId::from("e1"),
            endpoint: EdgeEndpoint::Target,
            node_id: NodeId::from("n3"),
        };
        let err = LibError::invalid_graph(vec![violation.clone()], anyhow!("bad graph"));
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.code, "invalid_project_graph");
        assert_eq!(err.graph_violations(), &[violation]);
    }

    #[test]
    fn details_serialize_with_type_tag() {
        let details = ErrorDetails::GraphViolations {
            violations: vec![GraphViolation::DuplicateNodeId {
                node_id: NodeId::from("n1"),
            }],
        };
        let value = serde_json::to_value(details).expect("details serialize");
        assert_eq!(value["type"], "graph_violations");
        assert_eq!(value["violations"][0]["type"], "duplicate_node_id");
        assert_eq!(value["violations"][0]["nodeId"], "n1");
    }

    #[test]
    fn display_includes_internal_source() {
        let err = LibError::not_found("Project not found", anyhow!("project abc not found"));
        assert_eq!(
            err.to_string(),
            "Project not found (not_found): project abc not found"
        );
    }
}
