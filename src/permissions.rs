use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{MediaId, ProjectId, UserId};

pub const PROJECT_NOT_FOUND: &str = "Project not found";
pub const MEDIA_NOT_FOUND: &str = "Media not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// What a caller may do with a resource. Reads never imply writes for non-owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    AllowWrite,
    AllowRead,
    Deny,
}

impl AccessDecision {
    pub const fn permits(self, access: Access) -> bool {
        match (self, access) {
            (AccessDecision::AllowWrite, _) => true,
            (AccessDecision::AllowRead, Access::Read) => true,
            _ => false,
        }
    }
}

pub fn project_access(owner: UserId, is_public: bool, actor: UserId) -> AccessDecision {
    if owner == actor {
        AccessDecision::AllowWrite
    } else if is_public {
        AccessDecision::AllowRead
    } else {
        AccessDecision::Deny
    }
}

/// Media has no public mode.
pub fn media_access(owner: UserId, actor: UserId) -> AccessDecision {
    if owner == actor {
        AccessDecision::AllowWrite
    } else {
        AccessDecision::Deny
    }
}

// A denial is reported exactly like a missing record so existence never leaks.

pub fn authorize_project(
    project_id: ProjectId,
    owner: UserId,
    is_public: bool,
    actor: UserId,
    access: Access,
) -> Result<()> {
    if project_access(owner, is_public, actor).permits(access) {
        Ok(())
    } else {
        Err(LibError::not_found(
            PROJECT_NOT_FOUND,
            anyhow!(
                "project {} {:?} access denied for user {}",
                project_id,
                access,
                actor
            ),
        ))
    }
}

pub fn authorize_media(
    media_id: MediaId,
    owner: UserId,
    actor: UserId,
    access: Access,
) -> Result<()> {
    if media_access(owner, actor).permits(access) {
        Ok(())
    } else {
        Err(LibError::not_found(
            MEDIA_NOT_FOUND,
            anyhow!(
                "media {} {:?} access denied for user {}",
                media_id,
                access,
                actor
            ),
        ))
    }
}

pub fn project_not_found(project_id: ProjectId) -> LibError {
    LibError::not_found(
        PROJECT_NOT_FOUND,
        anyhow!("project {} not found", project_id),
    )
}

pub fn media_not_found(media_id: MediaId) -> LibError {
    LibError::not_found(MEDIA_NOT_FOUND, anyhow!("media {} not found", media_id))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorKind;

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    #[test]
    fn owner_may_read_and_write_projects() {
        let owner = user();
        for is_public in [true, false] {
            let decision = project_access(owner, is_public, owner);
            assert_eq!(decision, AccessDecision::AllowWrite);
            assert!(decision.permits(Access::Read));
            assert!(decision.permits(Access::Write));
        }
    }

    #[test]
    fn public_projects_are_read_only_for_others() {
        let decision = project_access(user(), true, user());
        assert_eq!(decision, AccessDecision::AllowRead);
        assert!(decision.permits(Access::Read));
        assert!(!decision.permits(Access::Write));
    }

    #[test]
    fn private_projects_deny_others() {
        let decision = project_access(user(), false, user());
        assert_eq!(decision, AccessDecision::Deny);
        assert!(!decision.permits(Access::Read));
    }

    #[test]
    fn media_is_owner_only() {
        let owner = user();
        assert_eq!(media_access(owner, owner), AccessDecision::AllowWrite);
        assert_eq!(media_access(owner, user()), AccessDecision::Deny);
    }

    #[test]
    fn private_project_denial_matches_missing_project() {
        let project_id = ProjectId(Uuid::new_v4());
        let denied = authorize_project(project_id, user(), false, user(), Access::Read)
            .expect_err("stranger should be denied");
        let missing = project_not_found(project_id);

        assert_eq!(denied.kind, ErrorKind::NotFound);
        assert_eq!(denied.kind, missing.kind);
        assert_eq!(denied.code, missing.code);
        assert_eq!(denied.public, missing.public);
    }

    #[test]
    fn public_project_write_by_stranger_is_not_found() {
        let err = authorize_project(ProjectId(Uuid::new_v4()), user(), true, user(), Access::Write)
            .expect_err("stranger cannot write");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.public, PROJECT_NOT_FOUND);
    }

    #[test]
    fn media_denial_matches_missing_media() {
        let media_id = MediaId(Uuid::new_v4());
        let denied = authorize_media(media_id, user(), user(), Access::Read)
            .expect_err("stranger should be denied");
        let missing = media_not_found(media_id);
        assert_eq!(denied.code, missing.code);
        assert_eq!(denied.public, missing.public);
    }
}
