//! Administrative management service: project and category CRUD with the
//! application-level cascading delete, and user/role administration on top
//! of the identity module.
//!
//! Admin gating is the boundary's job (command handlers), not this module's.

use tracing::{debug, info};

use crate::db::Database;
use crate::error::{FieldError, ServiceError};
use crate::identity;
use crate::models::{Caller, Category, Project, Role, UserListItem};

pub const PROJECT_NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 120;
pub const DESCRIPTION_MAX: usize = 500;

fn validate_name_desc(
    name: &str,
    name_min: usize,
    description: Option<&str>,
) -> Result<(), ServiceError> {
    let mut errors = Vec::new();
    let len = name.chars().count();
    if len < name_min {
        let message = if name_min > 1 {
            format!("must be at least {} characters", name_min)
        } else {
            "is required".to_string()
        };
        errors.push(FieldError::new("Name", message));
    } else if len > NAME_MAX {
        errors.push(FieldError::new(
            "Name",
            format!("must be at most {} characters", NAME_MAX),
        ));
    }
    if let Some(desc) = description {
        if desc.chars().count() > DESCRIPTION_MAX {
            errors.push(FieldError::new(
                "Description",
                format!("must be at most {} characters", DESCRIPTION_MAX),
            ));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(errors))
    }
}

// Projects

pub fn list_projects(db: &Database) -> Result<Vec<Project>, ServiceError> {
    Ok(db.list_projects()?)
}

pub fn create_project(
    db: &Database,
    name: &str,
    description: Option<&str>,
) -> Result<i64, ServiceError> {
    validate_name_desc(name, PROJECT_NAME_MIN, description)?;
    let id = db.create_project(name, description)?;
    debug!(project = id, name, "created project");
    Ok(id)
}

pub fn update_project(
    db: &Database,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<(), ServiceError> {
    if db.get_project(id)?.is_none() {
        return Err(ServiceError::not_found("Project", id));
    }
    validate_name_desc(name, PROJECT_NAME_MIN, description)?;
    db.update_project(id, name, description)?;
    Ok(())
}

/// Destroys the project's tickets (and their comments) before the project
/// itself, in one transaction. Returns how many tickets went with it.
pub fn delete_project(db: &Database, id: i64) -> Result<usize, ServiceError> {
    if db.get_project(id)?.is_none() {
        return Err(ServiceError::not_found("Project", id));
    }
    let dependents = db.count_project_tickets(id)?;
    let removed = db.delete_project_cascade(id)?;
    info!(project = id, tickets = removed, "deleted project");
    debug_assert_eq!(dependents as usize, removed);
    Ok(removed)
}

// Categories

pub fn list_categories(db: &Database) -> Result<Vec<Category>, ServiceError> {
    Ok(db.list_categories()?)
}

/// Category names only need to be non-empty; the 120 ceiling matches Project.
pub fn create_category(
    db: &Database,
    name: &str,
    description: Option<&str>,
) -> Result<i64, ServiceError> {
    validate_name_desc(name, 1, description)?;
    let id = db.create_category(name, description)?;
    debug!(category = id, name, "created category");
    Ok(id)
}

pub fn update_category(
    db: &Database,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<(), ServiceError> {
    if db.get_category(id)?.is_none() {
        return Err(ServiceError::not_found("Category", id));
    }
    validate_name_desc(name, 1, description)?;
    db.update_category(id, name, description)?;
    Ok(())
}

pub fn delete_category(db: &Database, id: i64) -> Result<usize, ServiceError> {
    if db.get_category(id)?.is_none() {
        return Err(ServiceError::not_found("Category", id));
    }
    let removed = db.delete_category_cascade(id)?;
    info!(category = id, tickets = removed, "deleted category");
    Ok(removed)
}

// Users

pub fn list_users(db: &Database) -> Result<Vec<UserListItem>, ServiceError> {
    let users = db.list_users()?;
    let mut items = Vec::with_capacity(users.len());
    for user in users {
        let roles = db.role_names_for_user(user.id)?;
        items.push(UserListItem {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            roles: roles.join(", "),
        });
    }
    Ok(items)
}

/// Credential creation is the identity module's call; its policy violations
/// come back aggregated as one validation failure. The requested role is
/// created on demand and assigned.
pub fn create_user(
    db: &Database,
    email: &str,
    display_name: Option<&str>,
    password: &str,
    role: Role,
) -> Result<i64, ServiceError> {
    let id = identity::create_user(db, email, display_name, password)?;
    identity::assign_role(db, id, role)?;
    info!(user = id, email, role = role.as_str(), "created user");
    Ok(id)
}

/// Updates profile fields; replaces role membership only when the requested
/// role differs from the current one; optionally resets the credential.
pub fn update_user(
    db: &Database,
    id: i64,
    email: &str,
    display_name: Option<&str>,
    role: Role,
    new_password: Option<&str>,
) -> Result<(), ServiceError> {
    identity::update_profile(db, id, email, display_name)?;

    let current = db.role_names_for_user(id)?;
    if !current.iter().any(|n| n == role.as_str()) {
        identity::replace_roles(db, id, role)?;
    }

    if let Some(password) = new_password {
        identity::reset_password(db, id, password)?;
    }
    Ok(())
}

/// Admins cannot delete their own account; this keeps the last-resort admin
/// from locking themselves out.
pub fn delete_user(db: &Database, caller: &Caller, id: i64) -> Result<(), ServiceError> {
    if db.get_user(id)?.is_none() {
        return Err(ServiceError::not_found("User", id));
    }
    if id == caller.user_id {
        return Err(ServiceError::SelfDeletion);
    }
    identity::delete_user(db, id)?;
    info!(user = id, "deleted user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TicketForm, TicketPriority, TicketStatus};
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn ticket_form(project_id: i64, category_id: i64) -> TicketForm {
        TicketForm {
            title: "Login page crashes".to_string(),
            description: "Clicking the login button throws a reference error.".to_string(),
            status: TicketStatus::New,
            priority: TicketPriority::Medium,
            project_id,
            category_id,
        }
    }

    #[test]
    fn test_project_name_boundary() {
        let (db, _dir) = setup_test_db();
        let err = create_project(&db, "ab", None).unwrap_err();
        assert_eq!(err.violated_fields(), vec!["Name"]);
        assert!(create_project(&db, "abc", None).is_ok());
        let err = create_project(&db, &"x".repeat(121), None).unwrap_err();
        assert_eq!(err.violated_fields(), vec!["Name"]);
    }

    #[test]
    fn test_description_cap() {
        let (db, _dir) = setup_test_db();
        let long = "x".repeat(501);
        let err = create_project(&db, "Website", Some(&long)).unwrap_err();
        assert_eq!(err.violated_fields(), vec!["Description"]);
        assert!(create_project(&db, "Website", Some(&"x".repeat(500))).is_ok());
    }

    #[test]
    fn test_category_name_only_required() {
        let (db, _dir) = setup_test_db();
        let err = create_category(&db, "", None).unwrap_err();
        assert_eq!(err.violated_fields(), vec!["Name"]);
        // shorter than the project floor is fine for categories
        assert!(create_category(&db, "UX", None).is_ok());
    }

    #[test]
    fn test_update_project() {
        let (db, _dir) = setup_test_db();
        let id = create_project(&db, "Website", None).unwrap();
        update_project(&db, id, "Website v2", Some("Relaunch")).unwrap();
        let project = db.get_project(id).unwrap().unwrap();
        assert_eq!(project.name, "Website v2");

        assert!(matches!(
            update_project(&db, 999, "Ghost", None).unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[test]
    fn test_delete_project_with_dependents() {
        let (db, _dir) = setup_test_db();
        let project_id = create_project(&db, "Website", None).unwrap();
        let category_id = create_category(&db, "Bug", None).unwrap();
        let t1 = db.create_ticket(&ticket_form(project_id, category_id), 1).unwrap();
        db.create_ticket(&ticket_form(project_id, category_id), 2).unwrap();
        db.add_comment(t1, 1, "still happening").unwrap();

        let removed = delete_project(&db, project_id).unwrap();
        assert_eq!(removed, 2);
        assert!(db.get_project(project_id).unwrap().is_none());
        assert!(db.get_ticket(t1).unwrap().is_none());
    }

    #[test]
    fn test_delete_project_without_dependents() {
        let (db, _dir) = setup_test_db();
        let id = create_project(&db, "Website", None).unwrap();
        assert_eq!(delete_project(&db, id).unwrap(), 0);
        assert!(matches!(
            delete_project(&db, id).unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[test]
    fn test_delete_category_cascades() {
        let (db, _dir) = setup_test_db();
        let project_id = create_project(&db, "Website", None).unwrap();
        let bug = create_category(&db, "Bug", None).unwrap();
        let feature = create_category(&db, "Feature", None).unwrap();
        db.create_ticket(&ticket_form(project_id, bug), 1).unwrap();
        let kept = db.create_ticket(&ticket_form(project_id, feature), 1).unwrap();

        assert_eq!(delete_category(&db, bug).unwrap(), 1);
        assert!(db.get_ticket(kept).unwrap().is_some());
    }

    #[test]
    fn test_create_user_assigns_role() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", Some("Alice"), "Secret12", Role::Admin)
            .unwrap();
        assert_eq!(db.role_names_for_user(id).unwrap(), vec!["Admin"]);
    }

    #[test]
    fn test_create_user_surfaces_policy_failures() {
        let (db, _dir) = setup_test_db();
        let err = create_user(&db, "not-an-email", None, "weak", Role::User).unwrap_err();
        let fields = err.violated_fields();
        assert!(fields.contains(&"Email"));
        assert!(fields.contains(&"Password"));
    }

    #[test]
    fn test_list_users_joins_roles() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12", Role::User).unwrap();
        identity::assign_role(&db, id, Role::Admin).unwrap();

        let items = list_users(&db).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].roles, "Admin, User");
    }

    #[test]
    fn test_update_user_replaces_role_when_changed() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12", Role::User).unwrap();

        update_user(&db, id, "alice@demo.local", Some("Alice"), Role::Admin, None).unwrap();
        assert_eq!(db.role_names_for_user(id).unwrap(), vec!["Admin"]);

        // same role again: membership untouched
        update_user(&db, id, "alice@demo.local", Some("Alice"), Role::Admin, None).unwrap();
        assert_eq!(db.role_names_for_user(id).unwrap(), vec!["Admin"]);
    }

    #[test]
    fn test_update_user_resets_password() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12", Role::User).unwrap();

        let err = update_user(
            &db,
            id,
            "alice@demo.local",
            None,
            Role::User,
            Some("weak"),
        )
        .unwrap_err();
        assert!(err.violated_fields().contains(&"NewPassword"));

        update_user(
            &db,
            id,
            "alice@demo.local",
            None,
            Role::User,
            Some("Stronger1"),
        )
        .unwrap();
    }

    #[test]
    fn test_update_user_not_found() {
        let (db, _dir) = setup_test_db();
        assert!(matches!(
            update_user(&db, 999, "a@demo.local", None, Role::User, None).unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[test]
    fn test_self_deletion_refused() {
        let (db, _dir) = setup_test_db();
        let admin_id =
            create_user(&db, "admin@demo.local", None, "Secret12", Role::Admin).unwrap();
        let caller = Caller::new(admin_id, vec![Role::Admin]);

        assert!(matches!(
            delete_user(&db, &caller, admin_id).unwrap_err(),
            ServiceError::SelfDeletion
        ));
        // account still present afterward
        assert!(db.get_user(admin_id).unwrap().is_some());
    }

    #[test]
    fn test_delete_other_user() {
        let (db, _dir) = setup_test_db();
        let admin_id =
            create_user(&db, "admin@demo.local", None, "Secret12", Role::Admin).unwrap();
        let other = create_user(&db, "bob@demo.local", None, "Secret12", Role::User).unwrap();
        let caller = Caller::new(admin_id, vec![Role::Admin]);

        delete_user(&db, &caller, other).unwrap();
        assert!(db.get_user(other).unwrap().is_none());
        assert!(matches!(
            delete_user(&db, &caller, other).unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }
}
