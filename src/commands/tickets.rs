use anyhow::{bail, Result};
use serde_json::json;
use std::io::{self, Write};

use crate::commands::truncate;
use crate::db::Database;
use crate::models::{Caller, TicketForm, TicketPriority, TicketStatus};
use crate::tickets::{self, TicketFilters};

pub fn list(
    db: &Database,
    caller: &Caller,
    query: Option<&str>,
    status: Option<TicketStatus>,
    json: bool,
) -> Result<()> {
    let filters = TicketFilters {
        query: query.map(str::to_string),
        status,
    };
    let rows = tickets::list(db, caller, &filters)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No tickets found.");
        return Ok(());
    }

    for row in rows {
        println!(
            "#{:<4} [{:11}] {:<40} {:8} {:<16} {:<12} {}",
            row.id,
            row.status,
            truncate(&row.title, 40),
            row.priority,
            truncate(&row.project, 16),
            truncate(&row.category, 12),
            row.created_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub fn show(db: &Database, caller: &Caller, id: i64, json: bool) -> Result<()> {
    let detail = tickets::get(db, caller, id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("Ticket #{}: {}", detail.id, detail.title);
    println!("Status: {}", detail.status);
    println!("Priority: {}", detail.priority);
    println!("Project: #{}", detail.project_id);
    println!("Category: #{}", detail.category_id);
    println!("Created: {}", detail.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(updated) = detail.updated_at {
        println!("Updated: {}", updated.format("%Y-%m-%d %H:%M:%S"));
    }

    println!("\nDescription:");
    for line in detail.description.lines() {
        println!("  {}", line);
    }

    if !detail.comments.is_empty() {
        println!("\nComments:");
        for comment in &detail.comments {
            println!(
                "  [{}] {}: {}",
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.author,
                comment.body
            );
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn create(
    db: &Database,
    caller: &Caller,
    title: &str,
    description: &str,
    status: TicketStatus,
    priority: TicketPriority,
    project_id: i64,
    category_id: i64,
    json: bool,
) -> Result<()> {
    let form = TicketForm {
        title: title.to_string(),
        description: description.to_string(),
        status,
        priority,
        project_id,
        category_id,
    };
    let id = tickets::create(db, caller, &form)?;

    if json {
        println!("{}", json!({ "id": id }));
    } else {
        println!("Created ticket #{}", id);
    }
    Ok(())
}

/// The service overwrites every mutable field at once; omitted flags fall
/// back to the ticket's current values.
#[allow(clippy::too_many_arguments)]
pub fn update(
    db: &Database,
    caller: &Caller,
    id: i64,
    title: Option<&str>,
    description: Option<&str>,
    status: Option<TicketStatus>,
    priority: Option<TicketPriority>,
    project_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<()> {
    if title.is_none()
        && description.is_none()
        && status.is_none()
        && priority.is_none()
        && project_id.is_none()
        && category_id.is_none()
    {
        bail!("Nothing to update. Use --title, --description, --status, --priority, --project, or --category");
    }

    let current = tickets::get(db, caller, id)?;
    let form = TicketForm {
        title: title.map(str::to_string).unwrap_or(current.title),
        description: description.map(str::to_string).unwrap_or(current.description),
        status: status.unwrap_or(current.status),
        priority: priority.unwrap_or(current.priority),
        project_id: project_id.unwrap_or(current.project_id),
        category_id: category_id.unwrap_or(current.category_id),
    };

    tickets::update(db, caller, id, &form)?;
    println!("Updated ticket #{}", id);
    Ok(())
}

pub fn delete(db: &Database, caller: &Caller, id: i64, force: bool) -> Result<()> {
    let detail = tickets::get(db, caller, id)?;

    if !force {
        print!("Delete ticket #{} \"{}\"? [y/N] ", id, detail.title);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    tickets::delete(db, caller, id)?;
    println!("Deleted ticket #{}", id);
    Ok(())
}

pub fn comment(db: &Database, caller: &Caller, id: i64, body: &str) -> Result<()> {
    let comment_id = tickets::add_comment(db, caller, id, body)?;
    println!("Added comment #{} to ticket #{}", comment_id, id);
    Ok(())
}
