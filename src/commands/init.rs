use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::db::Database;
use crate::identity;
use crate::models::Role;

pub const TRACKER_DIR: &str = ".bugtrack";
pub const DB_FILE: &str = "bugtrack.db";

const ADMIN_EMAIL: &str = "admin@demo.local";
const ADMIN_PASSWORD: &str = "Admin123!";
const USER_EMAIL: &str = "user@demo.local";
const USER_PASSWORD: &str = "User123!";

/// Initializes the tracker in `path`: creates the store and seeds the fixed
/// roles, the two demonstration accounts, and the default projects and
/// categories when none exist. Safe to run repeatedly.
pub fn run(path: &Path) -> Result<()> {
    let tracker_dir = path.join(TRACKER_DIR);

    if !tracker_dir.exists() {
        fs::create_dir_all(&tracker_dir).context("Failed to create .bugtrack directory")?;
        println!("Created {}", tracker_dir.display());
    }

    let db = Database::open(&tracker_dir.join(DB_FILE))?;
    seed(&db)?;

    println!("Bugtrack initialized successfully!");
    println!("\nDemo accounts:");
    println!("  {} (Admin)", ADMIN_EMAIL);
    println!("  {} (User)", USER_EMAIL);
    println!("\nNext steps:");
    println!("  bugtrack --user {} ticket list", ADMIN_EMAIL);

    Ok(())
}

/// Startup seeding: formal roles, demo accounts, default projects and
/// categories. A development convenience, not part of the runtime contract.
pub fn seed(db: &Database) -> Result<()> {
    db.ensure_role(Role::Admin.as_str())?;
    db.ensure_role(Role::User.as_str())?;

    let admin_id = match db.find_user_by_email(ADMIN_EMAIL)? {
        Some(user) => user.id,
        None => identity::create_user(db, ADMIN_EMAIL, Some("Administrator"), ADMIN_PASSWORD)?,
    };
    identity::assign_role(db, admin_id, Role::Admin)?;

    let user_id = match db.find_user_by_email(USER_EMAIL)? {
        Some(user) => user.id,
        None => identity::create_user(db, USER_EMAIL, Some("Demo User"), USER_PASSWORD)?,
    };
    identity::assign_role(db, user_id, Role::User)?;

    if db.count_projects()? == 0 {
        db.create_project("Website", Some("Main project"))?;
        db.create_project("Admin Panel", Some("Configuration"))?;
    }

    if db.count_categories()? == 0 {
        db.create_category("Bug", Some("Runtime defects"))?;
        db.create_category("Improvement", Some("Change proposals"))?;
    }

    Ok(())
}
