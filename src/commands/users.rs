use anyhow::Result;
use std::io::{self, Write};

use crate::admin;
use crate::commands::{require_admin, truncate};
use crate::db::Database;
use crate::models::{Caller, Role};

pub fn list(db: &Database, caller: &Caller) -> Result<()> {
    require_admin(caller)?;
    let users = admin::list_users(db)?;

    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    for user in users {
        println!(
            "#{:<4} {:<30} {:<24} {}",
            user.id,
            truncate(&user.email, 30),
            truncate(user.display_name.as_deref().unwrap_or(""), 24),
            user.roles
        );
    }
    Ok(())
}

pub fn create(
    db: &Database,
    caller: &Caller,
    email: &str,
    display_name: Option<&str>,
    password: &str,
    role: Role,
) -> Result<()> {
    require_admin(caller)?;
    let id = admin::create_user(db, email, display_name, password, role)?;
    println!("Created user #{} ({})", id, email);
    Ok(())
}

pub fn update(
    db: &Database,
    caller: &Caller,
    id: i64,
    email: &str,
    display_name: Option<&str>,
    role: Role,
    new_password: Option<&str>,
) -> Result<()> {
    require_admin(caller)?;
    admin::update_user(db, id, email, display_name, role, new_password)?;
    println!("Updated user #{}", id);
    Ok(())
}

pub fn delete(db: &Database, caller: &Caller, id: i64, force: bool) -> Result<()> {
    require_admin(caller)?;
    let user = match db.get_user(id)? {
        Some(u) => u,
        None => return Err(crate::error::ServiceError::not_found("User", id).into()),
    };

    if !force {
        print!("Delete user #{} ({})? [y/N] ", id, user.email);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    admin::delete_user(db, caller, id)?;
    println!("Deleted user #{}", id);
    Ok(())
}
