use anyhow::Result;
use std::io::{self, Write};

use crate::admin;
use crate::commands::{require_admin, truncate};
use crate::db::Database;
use crate::models::Caller;

pub fn list(db: &Database, caller: &Caller) -> Result<()> {
    require_admin(caller)?;
    let categories = admin::list_categories(db)?;

    if categories.is_empty() {
        println!("No categories found.");
        return Ok(());
    }

    for category in categories {
        println!(
            "#{:<4} {:<30} {}",
            category.id,
            truncate(&category.name, 30),
            category.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn create(db: &Database, caller: &Caller, name: &str, description: Option<&str>) -> Result<()> {
    require_admin(caller)?;
    let id = admin::create_category(db, name, description)?;
    println!("Created category #{}", id);
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
    admin::update_category(db, id, name, description)?;
    println!("Updated category #{}", id);
    Ok(())
}

pub fn delete(db: &Database, caller: &Caller, id: i64, force: bool) -> Result<()> {
    require_admin(caller)?;
    let category = match db.get_category(id)? {
        Some(c) => c,
        None => return Err(crate::error::ServiceError::not_found("Category", id).into()),
    };

    if !force {
        let dependents = db.count_category_tickets(id)?;
        if dependents > 0 {
            print!(
                "Delete category #{} \"{}\" and its {} ticket(s)? [y/N] ",
                id, category.name, dependents
            );
        } else {
            print!("Delete category #{} \"{}\"? [y/N] ", id, category.name);
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = admin::delete_category(db, id)?;
    if removed > 0 {
        println!("Deleted category #{} and {} ticket(s)", id, removed);
    } else {
        println!("Deleted category #{}", id);
    }
    Ok(())
}
