//! Identity provider: user accounts, role membership, credential policy.
//!
//! Credentials are opaque strings to the rest of the crate. This module only
//! enforces the account policy (the host's hashing/lockout machinery is out
//! of scope); everything else treats a user as an id plus roles.

use tracing::debug;

use crate::db::Database;
use crate::error::{FieldError, ServiceError};
use crate::models::{Caller, Role, User};

/// Minimum credential length, plus one digit, one lowercase, one uppercase.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum display name length.
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

fn check_password(password: &str, field: &'static str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            field,
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new(field, "must contain a digit"));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push(FieldError::new(field, "must contain a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push(FieldError::new(field, "must contain an uppercase letter"));
    }
    errors
}

fn check_email(email: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if email.is_empty() {
        errors.push(FieldError::new("Email", "is required"));
    } else {
        let well_formed = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
            None => false,
        };
        if !well_formed {
            errors.push(FieldError::new("Email", "is not a valid address"));
        }
    }
    errors
}

fn check_display_name(display_name: Option<&str>) -> Vec<FieldError> {
    match display_name {
        Some(name) if name.chars().count() > MAX_DISPLAY_NAME_LEN => vec![FieldError::new(
            "DisplayName",
            format!("must be at most {} characters", MAX_DISPLAY_NAME_LEN),
        )],
        _ => Vec::new(),
    }
}

/// Creates an account, aggregating every policy violation (email shape,
/// duplicate address, credential rules) into one validation failure.
pub fn create_user(
    db: &Database,
    email: &str,
    display_name: Option<&str>,
    password: &str,
) -> Result<i64, ServiceError> {
    let mut errors = check_email(email);
    errors.extend(check_display_name(display_name));
    errors.extend(check_password(password, "Password"));
    if errors.iter().all(|e| e.field != "Email") && db.email_taken(email, None)? {
        errors.push(FieldError::new("Email", "is already taken"));
    }
    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    let id = db.create_user(email, display_name, password)?;
    debug!(user_id = id, email, "created user");
    Ok(id)
}

pub fn update_profile(
    db: &Database,
    id: i64,
    email: &str,
    display_name: Option<&str>,
) -> Result<(), ServiceError> {
    if db.get_user(id)?.is_none() {
        return Err(ServiceError::not_found("User", id));
    }

    let mut errors = check_email(email);
    errors.extend(check_display_name(display_name));
    if errors.iter().all(|e| e.field != "Email") && db.email_taken(email, Some(id))? {
        errors.push(FieldError::new("Email", "is already taken"));
    }
    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    db.update_user_profile(id, email, display_name)?;
    Ok(())
}

pub fn reset_password(db: &Database, id: i64, new_password: &str) -> Result<(), ServiceError> {
    if db.get_user(id)?.is_none() {
        return Err(ServiceError::not_found("User", id));
    }
    let errors = check_password(new_password, "NewPassword");
    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }
    db.set_credential(id, new_password)?;
    debug!(user_id = id, "credential reset");
    Ok(())
}

pub fn delete_user(db: &Database, id: i64) -> Result<(), ServiceError> {
    if !db.delete_user(id)? {
        return Err(ServiceError::not_found("User", id));
    }
    debug!(user_id = id, "deleted user");
    Ok(())
}

/// Creates the role row if missing, then adds the membership.
pub fn assign_role(db: &Database, user_id: i64, role: Role) -> Result<(), ServiceError> {
    let role_id = db.ensure_role(role.as_str())?;
    db.assign_role(user_id, role_id)?;
    Ok(())
}

/// Drops every existing membership (including roles this application does
/// not recognize) and assigns the requested one.
pub fn replace_roles(db: &Database, user_id: i64, role: Role) -> Result<(), ServiceError> {
    db.clear_roles(user_id)?;
    assign_role(db, user_id, role)
}

/// Role memberships this application acts on; unrecognized names are dropped,
/// which leaves the account with ordinary-user treatment.
pub fn roles_of(db: &Database, user_id: i64) -> Result<Vec<Role>, ServiceError> {
    let names = db.role_names_for_user(user_id)?;
    Ok(names.iter().filter_map(|n| Role::from_name(n)).collect())
}

/// Resolves an email to the caller context every service call requires.
pub fn resolve_caller(db: &Database, email: &str) -> Result<Option<(User, Caller)>, ServiceError> {
    match db.find_user_by_email(email)? {
        Some(user) => {
            let roles = roles_of(db, user.id)?;
            let caller = Caller::new(user.id, roles);
            Ok(Some((user, caller)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        (db, dir)
    }

    #[test]
    fn test_create_user_valid() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", Some("Alice"), "Secret12").unwrap();
        assert!(id > 0);
        let user = db.get_user(id).unwrap().unwrap();
        assert_eq!(user.email, "alice@demo.local");
    }

    #[test]
    fn test_password_policy_aggregates() {
        let (db, _dir) = setup_test_db();
        let err = create_user(&db, "alice@demo.local", None, "short").unwrap_err();
        let fields = err.violated_fields();
        // too short, no digit, no uppercase
        assert_eq!(fields.iter().filter(|f| **f == "Password").count(), 3);
    }

    #[test]
    fn test_password_boundary_length() {
        let (db, _dir) = setup_test_db();
        // 7 chars: rejected
        assert!(create_user(&db, "a@demo.local", None, "Abcde1x").is_err());
        // 8 chars with digit, lower, upper: accepted
        assert!(create_user(&db, "b@demo.local", None, "Abcdef1x").is_ok());
    }

    #[test]
    fn test_email_shape_rejected() {
        let (db, _dir) = setup_test_db();
        for bad in ["", "nodomain", "@demo.local", "alice@"] {
            let err = create_user(&db, bad, None, "Secret12").unwrap_err();
            assert!(err.violated_fields().contains(&"Email"), "{:?}", bad);
        }
    }

    #[test]
    fn test_duplicate_email_is_field_qualified() {
        let (db, _dir) = setup_test_db();
        create_user(&db, "alice@demo.local", None, "Secret12").unwrap();
        let err = create_user(&db, "alice@demo.local", None, "Secret12").unwrap_err();
        assert_eq!(err.violated_fields(), vec!["Email"]);
    }

    #[test]
    fn test_display_name_cap() {
        let (db, _dir) = setup_test_db();
        let long = "x".repeat(81);
        let err = create_user(&db, "alice@demo.local", Some(&long), "Secret12").unwrap_err();
        assert!(err.violated_fields().contains(&"DisplayName"));

        let ok = "x".repeat(80);
        assert!(create_user(&db, "bob@demo.local", Some(&ok), "Secret12").is_ok());
    }

    #[test]
    fn test_update_profile_not_found() {
        let (db, _dir) = setup_test_db();
        let err = update_profile(&db, 99, "a@demo.local", None).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[test]
    fn test_update_profile_keeps_own_email() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12").unwrap();
        // Re-submitting the current address must not trip the duplicate check
        update_profile(&db, id, "alice@demo.local", Some("Alice")).unwrap();
        let user = db.get_user(id).unwrap().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_reset_password_policy() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12").unwrap();
        let err = reset_password(&db, id, "weak").unwrap_err();
        assert!(err.violated_fields().contains(&"NewPassword"));
        reset_password(&db, id, "Stronger1").unwrap();
    }

    #[test]
    fn test_replace_roles_drops_previous() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12").unwrap();
        assign_role(&db, id, Role::User).unwrap();
        replace_roles(&db, id, Role::Admin).unwrap();
        assert_eq!(roles_of(&db, id).unwrap(), vec![Role::Admin]);
    }

    #[test]
    fn test_roles_of_drops_unrecognized() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12").unwrap();
        let exotic = db.ensure_role("Moderator").unwrap();
        db.assign_role(id, exotic).unwrap();
        assert!(roles_of(&db, id).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_caller() {
        let (db, _dir) = setup_test_db();
        let id = create_user(&db, "alice@demo.local", None, "Secret12").unwrap();
        assign_role(&db, id, Role::Admin).unwrap();

        let (user, caller) = resolve_caller(&db, "alice@demo.local").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert!(caller.is_admin());

        assert!(resolve_caller(&db, "ghost@demo.local").unwrap().is_none());
    }
}
