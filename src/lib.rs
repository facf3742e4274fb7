#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "api")]
pub mod auth;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod invariants;
pub mod models;
pub mod permissions;

pub mod prelude {
    #[cfg(feature = "api")]
    pub use crate::api::{AppError, HasPool, VersoApp, router, routes};
    #[cfg(feature = "api")]
    pub use crate::auth::{AuthenticatedUser, USER_ID_HEADER, trusted_header_identity};
    pub use crate::config::ServerConfig;
    #[cfg(feature = "sqlx")]
    pub use crate::db::{
        create_media, create_project, create_verso_tables, delete_media, delete_project,
        get_media_content, get_media_metadata, get_project, list_media, list_projects,
        update_project,
    };
    pub use crate::error::{ErrorDetails, ErrorKind, LibError, Result};
    pub use crate::invariants::{ensure_project_graph, project_graph_violations};
    pub use crate::models::{
        Choice, ChoiceId, CreateProjectPayload, Dimensions, EdgeEndpoint, EdgeId, GraphViolation,
        ListMediaQuery, ListProjectsQuery, MediaContent, MediaFilter, MediaId, MediaKind,
        MediaMetadata, MediaPage, MediaSummary, NewMedia, NodeData, NodeId, PageRequest,
        Pagination, Position, Project, ProjectEdge, ProjectId, ProjectNode, ProjectPage,
        UpdateProjectPayload, UserId,
    };
    pub use crate::permissions::{Access, AccessDecision, media_access, project_access};
}
