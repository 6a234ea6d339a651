use anyhow::Result;
use std::io::{self, Write};

use crate::admin;
use crate::commands::{require_admin, truncate};
use crate::db::Database;
use crate::models::Caller;

pub fn list(db: &Database, caller: &Caller) -> Result<()> {
    require_admin(caller)?;
    let projects = admin::list_projects(db)?;

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    for project in projects {
        println!(
            "#{:<4} {:<30} {}",
            project.id,
            truncate(&project.name, 30),
            project.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn create(db: &Database, caller: &Caller, name: &str, description: Option<&str>) -> Result<()> {
    require_admin(caller)?;
    let id = admin::create_project(db, name, description)?;
    println!("Created project #{}", id);
    Ok(())
}

pub fn update(
    db: &Database,
    caller: &Caller,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<()> {
    require_admin(caller)?;
    admin::update_project(db, id, name, description)?;
    println!("Updated project #{}", id);
    Ok(())
}

/// Cascades: every ticket under the project (and its comments) goes with it.
pub fn delete(db: &Database, caller: &Caller, id: i64, force: bool) -> Result<()> {
    require_admin(caller)?;
    let project = match db.get_project(id)? {
        Some(p) => p,
        None => return Err(crate::error::ServiceError::not_found("Project", id).into()),
    };

    if !force {
        let dependents = db.count_project_tickets(id)?;
        if dependents > 0 {
            print!(
                "Delete project #{} \"{}\" and its {} ticket(s)? [y/N] ",
                id, project.name, dependents
            );
        } else {
            print!("Delete project #{} \"{}\"? [y/N] ", id, project.name);
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = admin::delete_project(db, id)?;
    if removed > 0 {
        println!("Deleted project #{} and {} ticket(s)", id, removed);
    } else {
        println!("Deleted project #{}", id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use tempfile::tempdir;

    fn setup() -> (Database, tempfile::TempDir, Caller, Caller) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let admin = Caller::new(1, vec![Role::Admin]);
        let user = Caller::new(2, vec![Role::User]);
        (db, dir, admin, user)
    }

    #[test]
    fn test_non_admin_refused_at_boundary() {
        let (db, _dir, _admin, user) = setup();
        assert!(list(&db, &user).is_err());
        assert!(create(&db, &user, "Website", None).is_err());
        assert!(update(&db, &user, 1, "Website", None).is_err());
        assert!(delete(&db, &user, 1, true).is_err());
        // nothing was created behind the gate
        assert!(db.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_admin_crud() {
        let (db, _dir, admin, _user) = setup();
        create(&db, &admin, "Website", Some("Main project")).unwrap();
        let id = db.list_projects().unwrap()[0].id;
        update(&db, &admin, id, "Website v2", None).unwrap();
        assert_eq!(db.get_project(id).unwrap().unwrap().name, "Website v2");
        delete(&db, &admin, id, true).unwrap();
        assert!(db.get_project(id).unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_project() {
        let (db, _dir, admin, _user) = setup();
        let err = delete(&db, &admin, 999, true).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
