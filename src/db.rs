use anyhow::anyhow;
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::models::{
    CreateProjectPayload, Dimensions, MediaContent, MediaFilter, MediaId, MediaKind,
    MediaMetadata, MediaPage, MediaSummary, NewMedia, PageRequest, Pagination, Project,
    ProjectEdge, ProjectId, ProjectNode, ProjectPage, UpdateProjectPayload, UserId,
};
use crate::permissions::{self, Access};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_verso_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

const PROJECT_COLUMNS: &str = r#"
    project_id,
    owner_user_id,
    title,
    description,
    is_public,
    tags,
    nodes,
    edges,
    created_at,
    updated_at
"#;

const MEDIA_METADATA_COLUMNS: &str = r#"
    media_id,
    owner_user_id,
    kind,
    mime_type,
    name,
    size_bytes,
    width,
    height,
    duration_seconds,
    tags
"#;

#[derive(Debug, Clone, FromRow)]
struct ProjectRow {
    project_id: Uuid,
    owner_user_id: Uuid,
    title: String,
    description: Option<String>,
    is_public: bool,
    tags: Vec<String>,
    nodes: Json<Vec<ProjectNode>>,
    edges: Json<Vec<ProjectEdge>>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, Copy, FromRow)]
struct ProjectAccessRow {
    owner_user_id: Uuid,
    is_public: bool,
}

#[derive(Debug, Clone, FromRow)]
struct MediaMetadataRow {
    media_id: Uuid,
    owner_user_id: Uuid,
    kind: String,
    mime_type: String,
    name: String,
    size_bytes: i64,
    width: Option<i32>,
    height: Option<i32>,
    duration_seconds: Option<f64>,
    tags: Vec<String>,
}

#[derive(Debug, Clone, FromRow)]
struct MediaContentRow {
    owner_user_id: Uuid,
    content_type: String,
    payload: Vec<u8>,
}

impl From<ProjectRow> for Project {
    fn from(value: ProjectRow) -> Self {
        Self {
            project_id: ProjectId(value.project_id),
            user_id: UserId(value.owner_user_id),
            title: value.title,
            description: value.description,
            nodes: value.nodes.0,
            edges: value.edges.0,
            is_public: value.is_public,
            tags: value.tags,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl MediaMetadataRow {
    fn owner(&self) -> UserId {
        UserId(self.owner_user_id)
    }

    fn into_summary(self) -> Result<MediaSummary> {
        let kind = MediaKind::from_db_value(&self.kind).ok_or_else(|| {
            LibError::database(
                "Stored media record is invalid",
                anyhow!("media {} has unknown kind '{}'", self.media_id, self.kind),
            )
        })?;
        let dimensions = match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Dimensions {
                width: u32::try_from(width).unwrap_or_default(),
                height: u32::try_from(height).unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(MediaSummary {
            media_id: MediaId(self.media_id),
            metadata: MediaMetadata {
                kind,
                mime_type: self.mime_type,
                name: self.name,
                size: u64::try_from(self.size_bytes).unwrap_or_default(),
                dimensions,
                duration: self.duration_seconds,
                tags: self.tags,
            },
        })
    }
}

/// The operation text ends up in the logged source chain, so it names the record.
fn db_err(public: &'static str, operation: String, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow::Error::new(err).context(operation))
}

async fn load_project(pool: &PgPool, project_id: ProjectId) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM verso.projects WHERE project_id = $1"
    ))
    .bind(project_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query project", format!("load project {project_id}"), err))?;

    Ok(row.map(Project::from))
}

async fn load_project_access(
    pool: &PgPool,
    project_id: ProjectId,
) -> Result<Option<ProjectAccessRow>> {
    sqlx::query_as::<_, ProjectAccessRow>(
        r#"
        SELECT owner_user_id, is_public
        FROM verso.projects
        WHERE project_id = $1
        "#,
    )
    .bind(project_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query project", format!("load project {project_id}"), err))
}

pub async fn create_project(
    pool: &PgPool,
    actor: UserId,
    payload: CreateProjectPayload,
) -> Result<Project> {
    let definition = payload.normalize()?;
    let project_id = ProjectId(Uuid::new_v4());

    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        r#"
        INSERT INTO verso.projects (
            project_id,
            owner_user_id,
            title,
            description,
            is_public,
            tags,
            nodes,
            edges
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(project_id.0)
    .bind(actor.0)
    .bind(&definition.title)
    .bind(&definition.description)
    .bind(definition.is_public)
    .bind(&definition.tags)
    .bind(Json(&definition.nodes))
    .bind(Json(&definition.edges))
    .fetch_one(pool)
    .await
    .map_err(|err| {
        db_err(
            "Failed to create project",
            format!("create project {project_id} for user {actor}"),
            err,
        )
    })?;

    tracing::info!(%project_id, user_id = %actor, "project created");
    Ok(Project::from(row))
}

pub async fn get_project(pool: &PgPool, actor: UserId, project_id: ProjectId) -> Result<Project> {
    let project = load_project(pool, project_id)
        .await?
        .ok_or_else(|| permissions::project_not_found(project_id))?;
    permissions::authorize_project(
        project_id,
        project.user_id,
        project.is_public,
        actor,
        Access::Read,
    )?;

    Ok(project)
}

pub async fn update_project(
    pool: &PgPool,
    actor: UserId,
    project_id: ProjectId,
    payload: UpdateProjectPayload,
) -> Result<Project> {
    let existing = load_project(pool, project_id)
        .await?
        .ok_or_else(|| permissions::project_not_found(project_id))?;
    permissions::authorize_project(
        project_id,
        existing.user_id,
        existing.is_public,
        actor,
        Access::Write,
    )?;

    let definition = payload.merge_into(&existing)?;

    // Owner predicate repeated so a concurrent delete cannot be resurrected.
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        r#"
        UPDATE verso.projects
        SET title = $1,
            description = $2,
            is_public = $3,
            tags = $4,
            nodes = $5,
            edges = $6,
            updated_at = CURRENT_TIMESTAMP
        WHERE project_id = $7
          AND owner_user_id = $8
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(&definition.title)
    .bind(&definition.description)
    .bind(definition.is_public)
    .bind(&definition.tags)
    .bind(Json(&definition.nodes))
    .bind(Json(&definition.edges))
    .bind(project_id.0)
    .bind(actor.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| {
        db_err(
            "Failed to update project",
            format!("update project {project_id} for user {actor}"),
            err,
        )
    })?
    .ok_or_else(|| permissions::project_not_found(project_id))?;

    tracing::info!(%project_id, user_id = %actor, "project updated");
    Ok(Project::from(row))
}

pub async fn delete_project(pool: &PgPool, actor: UserId, project_id: ProjectId) -> Result<()> {
    let access = load_project_access(pool, project_id)
        .await?
        .ok_or_else(|| permissions::project_not_found(project_id))?;
    permissions::authorize_project(
        project_id,
        UserId(access.owner_user_id),
        access.is_public,
        actor,
        Access::Write,
    )?;

    let result = sqlx::query(
        r#"
        DELETE FROM verso.projects
        WHERE project_id = $1
          AND owner_user_id = $2
        "#,
    )
    .bind(project_id.0)
    .bind(actor.0)
    .execute(pool)
    .await
    .map_err(|err| {
        db_err(
            "Failed to delete project",
            format!("delete project {project_id} for user {actor}"),
            err,
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(permissions::project_not_found(project_id));
    }

    tracing::info!(%project_id, user_id = %actor, "project deleted");
    Ok(())
}

pub async fn list_projects(pool: &PgPool, actor: UserId, page: PageRequest) -> Result<ProjectPage> {
    let rows = sqlx::query_as::<_, ProjectRow>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM verso.projects
        WHERE owner_user_id = $1
        ORDER BY updated_at DESC, project_id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(actor.0)
    .bind(page.limit as i64)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list projects", format!("list projects for user {actor}"), err))?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)::bigint
        FROM verso.projects
        WHERE owner_user_id = $1
        "#,
    )
    .bind(actor.0)
    .fetch_one(pool)
    .await
    .map_err(|err| db_err("Failed to count projects", format!("count projects for user {actor}"), err))?;

    Ok(ProjectPage {
        projects: rows.into_iter().map(Project::from).collect(),
        pagination: Pagination::new(page, u64::try_from(total.0).unwrap_or_default()),
    })
}

pub async fn create_media(pool: &PgPool, actor: UserId, media: NewMedia) -> Result<MediaSummary> {
    let media_id = MediaId(Uuid::new_v4());
    let metadata = media.metadata();
    let size_bytes = i64::try_from(metadata.size).map_err(|_| {
        LibError::unknown(
            "Failed to store media",
            anyhow!("media {} size {} does not fit in a bigint", media_id, metadata.size),
        )
    })?;

    let row = sqlx::query_as::<_, MediaMetadataRow>(&format!(
        r#"
        INSERT INTO verso.media (
            media_id,
            owner_user_id,
            kind,
            mime_type,
            name,
            size_bytes,
            width,
            height,
            duration_seconds,
            tags,
            content_type,
            payload
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {MEDIA_METADATA_COLUMNS}
        "#
    ))
    .bind(media_id.0)
    .bind(actor.0)
    .bind(metadata.kind.as_db_value())
    .bind(&metadata.mime_type)
    .bind(&metadata.name)
    .bind(size_bytes)
    .bind(metadata.dimensions.and_then(|d| i32::try_from(d.width).ok()))
    .bind(metadata.dimensions.and_then(|d| i32::try_from(d.height).ok()))
    .bind(metadata.duration)
    .bind(&metadata.tags)
    .bind(&media.content_type)
    .bind(&media.data)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        db_err(
            "Failed to store media",
            format!("create media {media_id} for user {actor}"),
            err,
        )
    })?;

    tracing::info!(
        %media_id,
        user_id = %actor,
        kind = %metadata.kind,
        size = metadata.size,
        "media uploaded"
    );
    row.into_summary()
}

pub async fn get_media_content(
    pool: &PgPool,
    actor: UserId,
    media_id: MediaId,
) -> Result<MediaContent> {
    let row = sqlx::query_as::<_, MediaContentRow>(
        r#"
        SELECT owner_user_id, content_type, payload
        FROM verso.media
        WHERE media_id = $1
        "#,
    )
    .bind(media_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query media", format!("load media {media_id}"), err))?
    .ok_or_else(|| permissions::media_not_found(media_id))?;
    permissions::authorize_media(media_id, UserId(row.owner_user_id), actor, Access::Read)?;

    Ok(MediaContent {
        content_type: row.content_type,
        data: row.payload,
    })
}

pub async fn get_media_metadata(
    pool: &PgPool,
    actor: UserId,
    media_id: MediaId,
) -> Result<MediaMetadata> {
    let row = sqlx::query_as::<_, MediaMetadataRow>(&format!(
        "SELECT {MEDIA_METADATA_COLUMNS} FROM verso.media WHERE media_id = $1"
    ))
    .bind(media_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query media", format!("load media {media_id}"), err))?
    .ok_or_else(|| permissions::media_not_found(media_id))?;
    permissions::authorize_media(media_id, row.owner(), actor, Access::Read)?;

    Ok(row.into_summary()?.metadata)
}

pub async fn delete_media(pool: &PgPool, actor: UserId, media_id: MediaId) -> Result<()> {
    let owner: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT owner_user_id
        FROM verso.media
        WHERE media_id = $1
        "#,
    )
    .bind(media_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query media", format!("load media {media_id}"), err))?;
    let (owner,) = owner.ok_or_else(|| permissions::media_not_found(media_id))?;
    permissions::authorize_media(media_id, UserId(owner), actor, Access::Write)?;

    let result = sqlx::query(
        r#"
        DELETE FROM verso.media
        WHERE media_id = $1
          AND owner_user_id = $2
        "#,
    )
    .bind(media_id.0)
    .bind(actor.0)
    .execute(pool)
    .await
    .map_err(|err| {
        db_err(
            "Failed to delete media",
            format!("delete media {media_id} for user {actor}"),
            err,
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(permissions::media_not_found(media_id));
    }

    tracing::info!(%media_id, user_id = %actor, "media deleted");
    Ok(())
}

pub async fn list_media(
    pool: &PgPool,
    actor: UserId,
    page: PageRequest,
    filter: &MediaFilter,
) -> Result<MediaPage> {
    let kind = filter.kind.map(MediaKind::as_db_value);

    let rows = sqlx::query_as::<_, MediaMetadataRow>(&format!(
        r#"
        SELECT {MEDIA_METADATA_COLUMNS}
        FROM verso.media
        WHERE owner_user_id = $1
          AND ($2::text IS NULL OR kind = $2)
          AND tags @> $3::text[]
        ORDER BY created_at DESC, media_id DESC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(actor.0)
    .bind(kind)
    .bind(&filter.tags)
    .bind(page.limit as i64)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list media", format!("list media for user {actor}"), err))?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)::bigint
        FROM verso.media
        WHERE owner_user_id = $1
          AND ($2::text IS NULL OR kind = $2)
          AND tags @> $3::text[]
        "#,
    )
    .bind(actor.0)
    .bind(kind)
    .bind(&filter.tags)
    .fetch_one(pool)
    .await
    .map_err(|err| db_err("Failed to count media", format!("count media for user {actor}"), err))?;

    let media = rows
        .into_iter()
        .map(MediaMetadataRow::into_summary)
        .collect::<Result<Vec<_>>>()?;

    Ok(MediaPage {
        media,
        pagination: Pagination::new(page, u64::try_from(total.0).unwrap_or_default()),
    })
}
