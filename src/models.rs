use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::invariants;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Upload ceiling shared by the transport body limit and the multipart reader.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(UserId);
uuid_id!(ProjectId);
uuid_id!(MediaId);

string_id!(NodeId);
string_id!(EdgeId);
string_id!(ChoiceId);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: ChoiceId,
    #[serde(default)]
    pub text: String,
    /// Presentation hints passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Opaque media reference; never resolved against the media store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub id: NodeId,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeEndpoint {
    Source,
    Target,
}

impl fmt::Display for EdgeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeEndpoint::Source => f.write_str("source"),
            EdgeEndpoint::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GraphViolation {
    DuplicateNodeId {
        node_id: NodeId,
    },
    DuplicateEdgeId {
        edge_id: EdgeId,
    },
    DanglingEdge {
        edge_id: EdgeId,
        endpoint: EdgeEndpoint,
        node_id: NodeId,
    },
    DuplicateChoiceId {
        node_id: NodeId,
        choice_id: ChoiceId,
    },
}

impl GraphViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            GraphViolation::DuplicateNodeId { .. } => "graph_duplicate_node_id",
            GraphViolation::DuplicateEdgeId { .. } => "graph_duplicate_edge_id",
            GraphViolation::DanglingEdge { .. } => "graph_dangling_edge",
            GraphViolation::DuplicateChoiceId { .. } => "graph_duplicate_choice_id",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            GraphViolation::DuplicateNodeId { .. } => "Node IDs must be unique within a project",
            GraphViolation::DuplicateEdgeId { .. } => "Edge IDs must be unique within a project",
            GraphViolation::DanglingEdge { .. } => "Edge references a node that does not exist",
            GraphViolation::DuplicateChoiceId { .. } => {
                "Choice IDs must be unique within a node"
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<ProjectNode>,
    pub edges: Vec<ProjectEdge>,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectPayload {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<ProjectNode>,
    #[serde(default)]
    pub edges: Vec<ProjectEdge>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Merge-style update: absent fields keep their stored value, present graph
/// collections replace the stored ones wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub nodes: Option<Vec<ProjectNode>>,
    pub edges: Option<Vec<ProjectEdge>>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// A validated, normalized set of mutable project fields ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDefinition {
    pub title: String,
    pub description: Option<String>,
    pub nodes: Vec<ProjectNode>,
    pub edges: Vec<ProjectEdge>,
    pub is_public: bool,
    pub tags: Vec<String>,
}

impl CreateProjectPayload {
    pub fn normalize(self) -> Result<ProjectDefinition> {
        let definition = ProjectDefinition {
            title: normalize_title(&self.title)?,
            description: normalize_description(self.description),
            nodes: self.nodes,
            edges: self.edges,
            is_public: self.is_public,
            tags: normalize_tags(self.tags),
        };
        invariants::ensure_project_graph(&definition.nodes, &definition.edges)?;
        Ok(definition)
    }
}

impl UpdateProjectPayload {
    pub fn merge_into(self, existing: &Project) -> Result<ProjectDefinition> {
        let title = match self.title {
            Some(title) => normalize_title(&title)?,
            None => existing.title.clone(),
        };
        let description = match self.description {
            Some(description) => normalize_description(Some(description)),
            None => existing.description.clone(),
        };

        let definition = ProjectDefinition {
            title,
            description,
            nodes: self.nodes.unwrap_or_else(|| existing.nodes.clone()),
            edges: self.edges.unwrap_or_else(|| existing.edges.clone()),
            is_public: self.is_public.unwrap_or(existing.is_public),
            tags: self
                .tags
                .map(normalize_tags)
                .unwrap_or_else(|| existing.tags.clone()),
        };
        invariants::ensure_project_graph(&definition.nodes, &definition.edges)?;
        Ok(definition)
    }
}

fn normalize_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LibError::invalid(
            "Project title is required",
            anyhow!("empty project title"),
        ));
    }
    Ok(title.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|description| description.trim().to_string())
        .filter(|description| !description.is_empty())
}

/// Trims tags, drops blanks and duplicates while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter_map(|tag| {
            let tag = tag.as_ref().trim();
            if tag.is_empty() || !seen.insert(tag.to_string()) {
                None
            } else {
                Some(tag.to_string())
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
    #[serde(rename = "pov")]
    PointOfView,
}

impl MediaKind {
    /// Coarse classification by MIME prefix; anything unrecognised is a point-of-view asset.
    pub fn from_mime_type(mime_type: &str) -> Self {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if mime_type.starts_with("video/") {
            MediaKind::Video
        } else if mime_type.starts_with("image/") {
            MediaKind::Image
        } else if mime_type.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::PointOfView
        }
    }

    pub const fn as_db_value(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::PointOfView => "pov",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "video" => Some(MediaKind::Video),
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            "pov" => Some(MediaKind::PointOfView),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub mime_type: String,
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSummary {
    pub media_id: MediaId,
    pub metadata: MediaMetadata,
}

#[derive(Debug, Clone)]
pub struct MediaContent {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A decoded upload. Everything about the record is fixed here; media has no update path.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub tags: Vec<String>,
    pub dimensions: Option<Dimensions>,
    pub duration: Option<f64>,
}

impl NewMedia {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime_type(&self.content_type)
    }

    pub fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            kind: self.kind(),
            mime_type: self.content_type.clone(),
            name: self.file_name.clone(),
            size: self.data.len() as u64,
            dimensions: self.dimensions,
            duration: self.duration,
            tags: normalize_tags(&self.tags),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    /// Absent, non-numeric or non-positive values fall back to the defaults.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: parse_positive(page).unwrap_or(DEFAULT_PAGE),
            limit: parse_positive(limit)
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .min(MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64).saturating_mul(self.limit as i64)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages: total.div_ceil(request.limit.max(1) as u64),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    pub projects: Vec<Project>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub media: Vec<MediaSummary>,
    pub pagination: Pagination,
}

// Query parameters arrive as raw strings so that garbage values degrade to
// defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProjectsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListProjectsQuery {
    pub fn pagination(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMediaQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFilter {
    pub kind: Option<MediaKind>,
    /// Every tag must be present on a record for it to match.
    pub tags: Vec<String>,
}

impl ListMediaQuery {
    pub fn pagination(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref())
    }

    pub fn filter(&self) -> Result<MediaFilter> {
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(MediaKind::from_db_value(raw).ok_or_else(|| {
                LibError::invalid_with_code(
                    "invalid_media_type",
                    "Unknown media type filter",
                    anyhow!("unknown media type filter '{}'", raw),
                )
            })?),
        };
        let tags = self
            .tags
            .as_deref()
            .map(|raw| normalize_tags(raw.split(',')))
            .unwrap_or_default();

        Ok(MediaFilter { kind, tags })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn node(id: &str) -> ProjectNode {
        ProjectNode {
            id: NodeId::from(id),
            node_type: "scene".to_string(),
            position: Position { x: 0.0, y: 0.0 },
            data: NodeData::default(),
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> ProjectEdge {
        ProjectEdge {
            id: EdgeId::from(id),
            source: NodeId::from(source),
            target: NodeId::from(target),
            source_handle: None,
            target_handle: None,
        }
    }

    fn stored_project() -> Project {
        let now = NaiveDate::from_ymd_opt(2026, 1, 1)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid datetime");
        Project {
            project_id: ProjectId(Uuid::new_v4()),
            user_id: UserId(Uuid::new_v4()),
            title: "Demo".to_string(),
            description: Some("intro".to_string()),
            nodes: vec![node("n1"), node("n2")],
            edges: vec![edge("e1", "n1", "n2")],
            is_public: false,
            tags: vec!["draft".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_payload_decodes_wire_shape() {
        let payload: CreateProjectPayload = serde_json::from_value(json!({
            "title": "Demo",
            "nodes": [
                {
                    "id": "n1",
                    "type": "videoNode",
                    "position": {"x": 10.5, "y": -3},
                    "data": {
                        "mediaId": "m-1",
                        "choices": [{"id": "c1", "text": "Go", "style": {"color": "red"}}]
                    }
                },
                {"id": "n2", "type": "textNode", "position": {"x": 0, "y": 0}, "data": {"text": "end"}}
            ],
            "edges": [{"id": "e1", "source": "n1", "target": "n2", "sourceHandle": "c1"}],
            "isPublic": true
        }))
        .expect("payload decodes");

        assert_eq!(payload.nodes[0].node_type, "videoNode");
        assert_eq!(payload.nodes[0].data.media_id.as_deref(), Some("m-1"));
        let choices = payload.nodes[0].data.choices.as_ref().expect("choices");
        assert_eq!(
            choices[0].style.as_ref().and_then(|s| s.get("color")),
            Some(&"red".to_string())
        );
        assert_eq!(payload.edges[0].source_handle.as_deref(), Some("c1"));
        assert!(payload.is_public);
        assert!(payload.tags.is_empty());
    }

    #[test]
    fn create_payload_requires_title() {
        let payload = CreateProjectPayload {
            title: "   ".to_string(),
            description: None,
            nodes: vec![],
            edges: vec![],
            is_public: false,
            tags: vec![],
        };
        let err = payload.normalize().expect_err("blank title should fail");
        assert_eq!(err.public, "Project title is required");
    }

    #[test]
    fn create_payload_normalizes_fields() {
        let payload = CreateProjectPayload {
            title: "  Demo ".to_string(),
            description: Some("   ".to_string()),
            nodes: vec![node("n1"), node("n2")],
            edges: vec![edge("e1", "n1", "n2")],
            is_public: false,
            tags: vec![" a ".to_string(), "a".to_string(), "".to_string(), "b".to_string()],
        };
        let definition = payload.normalize().expect("payload should normalize");
        assert_eq!(definition.title, "Demo");
        assert_eq!(definition.description, None);
        assert_eq!(definition.tags, vec!["a", "b"]);
        assert_eq!(definition.edges.len(), 1);
    }

    #[test]
    fn create_payload_reports_dangling_edges() {
        let payload = CreateProjectPayload {
            title: "Demo".to_string(),
            description: None,
            nodes: vec![node("n1")],
            edges: vec![edge("e1", "n1", "n3")],
            is_public: false,
            tags: vec![],
        };
        let err = payload.normalize().expect_err("dangling edge should fail");
        assert_eq!(err.code, "invalid_project_graph");
        assert_eq!(
            err.graph_violations(),
            &[GraphViolation::DanglingEdge {
                edge_id: EdgeId::from("e1"),
                endpoint: EdgeEndpoint::Target,
                node_id: NodeId::from("n3"),
            }]
        );
    }

    #[test]
    fn update_payload_keeps_absent_fields() {
        let existing = stored_project();
        let definition = UpdateProjectPayload {
            is_public: Some(true),
            ..Default::default()
        }
        .merge_into(&existing)
        .expect("merge should succeed");

        assert_eq!(definition.title, existing.title);
        assert_eq!(definition.description, existing.description);
        assert_eq!(definition.nodes, existing.nodes);
        assert_eq!(definition.edges, existing.edges);
        assert_eq!(definition.tags, existing.tags);
        assert!(definition.is_public);
    }

    #[test]
    fn update_payload_revalidates_against_stored_nodes() {
        let existing = stored_project();
        let err = UpdateProjectPayload {
            edges: Some(vec![edge("e1", "n1", "n3")]),
            ..Default::default()
        }
        .merge_into(&existing)
        .expect_err("edge to missing node should fail");

        assert!(matches!(
            err.graph_violations(),
            [GraphViolation::DanglingEdge { edge_id, endpoint: EdgeEndpoint::Target, node_id }]
                if edge_id.0 == "e1" && node_id.0 == "n3"
        ));
    }

    #[test]
    fn update_payload_replacing_nodes_strands_old_edges() {
        let existing = stored_project();
        let err = UpdateProjectPayload {
            nodes: Some(vec![node("n1")]),
            ..Default::default()
        }
        .merge_into(&existing)
        .expect_err("stored edge now points at a removed node");

        assert_eq!(err.graph_violations().len(), 1);
    }

    #[test]
    fn update_payload_rejects_blank_title() {
        let existing = stored_project();
        let err = UpdateProjectPayload {
            title: Some(String::new()),
            ..Default::default()
        }
        .merge_into(&existing)
        .expect_err("blank title should fail");
        assert_eq!(err.public, "Project title is required");
    }

    #[test]
    fn update_payload_ignores_owner_field() {
        let payload: UpdateProjectPayload = serde_json::from_value(json!({
            "userId": Uuid::new_v4(),
            "title": "Renamed"
        }))
        .expect("unknown fields are ignored");
        let existing = stored_project();
        let definition = payload.merge_into(&existing).expect("merge should succeed");
        assert_eq!(definition.title, "Renamed");
    }

    #[test]
    fn project_serializes_camel_case() {
        let project = stored_project();
        let value = serde_json::to_value(&project).expect("project serializes");
        assert!(value.get("projectId").is_some());
        assert!(value.get("userId").is_some());
        assert_eq!(value["isPublic"], false);
        assert_eq!(value["nodes"][0]["type"], "scene");
        assert!(value["nodes"][0]["data"].as_object().expect("data").is_empty());
        assert!(value["edges"][0].get("sourceHandle").is_none());
    }

    #[test]
    fn media_kind_follows_mime_prefix() {
        assert_eq!(MediaKind::from_mime_type("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime_type("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime_type("audio/mpeg"), MediaKind::Audio);
        assert_eq!(
            MediaKind::from_mime_type("application/octet-stream"),
            MediaKind::PointOfView
        );
        assert_eq!(MediaKind::from_mime_type("Video/WebM"), MediaKind::Video);
    }

    #[test]
    fn media_metadata_serializes_kind_as_type() {
        let media = NewMedia {
            file_name: "clip.mp4".to_string(),
            content_type: "application/octet-stream".to_string(),
            data: vec![0; 16],
            tags: vec!["intro".to_string()],
            dimensions: None,
            duration: None,
        };
        let value = serde_json::to_value(media.metadata()).expect("metadata serializes");
        assert_eq!(value["type"], "pov");
        assert_eq!(value["mimeType"], "application/octet-stream");
        assert_eq!(value["size"], 16);
        assert!(value.get("dimensions").is_none());
    }

    #[test]
    fn page_request_defaults_for_missing_or_garbage_values() {
        assert_eq!(PageRequest::parse(None, None), PageRequest::default());
        assert_eq!(
            PageRequest::parse(Some("abc"), Some("-4")),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::parse(Some("0"), Some("0")),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::parse(Some("3"), Some("25")),
            PageRequest { page: 3, limit: 25 }
        );
        assert_eq!(PageRequest::parse(None, Some("5000")).limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn pagination_rounds_pages_up() {
        let request = PageRequest { page: 3, limit: 10 };
        assert_eq!(request.offset(), 20);
        let pagination = Pagination::new(request, 25);
        assert_eq!(pagination.pages, 3);
        assert_eq!(pagination.total, 25);
        assert_eq!(Pagination::new(request, 0).pages, 0);
        assert_eq!(Pagination::new(request, 30).pages, 3);
    }

    #[test]
    fn media_query_parses_filters() {
        let query = ListMediaQuery {
            kind: Some("image".to_string()),
            tags: Some("a, b,,a".to_string()),
            ..Default::default()
        };
        let filter = query.filter().expect("filter parses");
        assert_eq!(filter.kind, Some(MediaKind::Image));
        assert_eq!(filter.tags, vec!["a", "b"]);
    }

    #[test]
    fn media_query_rejects_unknown_kind() {
        let query = ListMediaQuery {
            kind: Some("document".to_string()),
            ..Default::default()
        };
        let err = query.filter().expect_err("unknown kind should fail");
        assert_eq!(err.code, "invalid_media_type");
    }
}
