//! Ticket access service: every read and write of tickets and comments,
//! under ownership/role scoping and field validation.
//!
//! Scoping rule: an Admin caller may act on any ticket; anyone else only on
//! tickets they own. Deletion is the deliberate exception — Admin only, even
//! against the ticket's own owner.

use tracing::debug;

use crate::db::Database;
use crate::error::{FieldError, ServiceError};
use crate::models::{Caller, TicketDetail, TicketForm, TicketStatus, TicketSummary};

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 120;
pub const DESCRIPTION_MIN: usize = 20;
pub const DESCRIPTION_MAX: usize = 4000;
pub const COMMENT_MIN: usize = 2;
pub const COMMENT_MAX: usize = 1500;

/// Optional filters for `list`. Both default to "no restriction".
#[derive(Debug, Clone, Default)]
pub struct TicketFilters {
    pub query: Option<String>,
    pub status: Option<TicketStatus>,
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
    errors: &mut Vec<FieldError>,
) {
    let len = value.chars().count();
    if len < min {
        errors.push(FieldError::new(
            field,
            format!("must be at least {} characters", min),
        ));
    } else if len > max {
        errors.push(FieldError::new(
            field,
            format!("must be at most {} characters", max),
        ));
    }
}

fn validate_form(db: &Database, form: &TicketForm) -> Result<(), ServiceError> {
    let mut errors = Vec::new();
    check_length("Title", &form.title, TITLE_MIN, TITLE_MAX, &mut errors);
    check_length(
        "Description",
        &form.description,
        DESCRIPTION_MIN,
        DESCRIPTION_MAX,
        &mut errors,
    );
    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    // Referenced rows are checked up front so a dangling id surfaces as a
    // typed NotFound instead of a raw constraint failure.
    if db.get_project(form.project_id)?.is_none() {
        return Err(ServiceError::not_found("Project", form.project_id));
    }
    if db.get_category(form.category_id)?.is_none() {
        return Err(ServiceError::not_found("Category", form.category_id));
    }
    Ok(())
}

/// Newest first. Non-Admin callers only ever see their own tickets.
pub fn list(
    db: &Database,
    caller: &Caller,
    filters: &TicketFilters,
) -> Result<Vec<TicketSummary>, ServiceError> {
    let owner_filter = if caller.is_admin() {
        None
    } else {
        Some(caller.user_id)
    };
    let summaries =
        db.list_ticket_summaries(owner_filter, filters.query.as_deref(), filters.status)?;
    debug!(
        caller = caller.user_id,
        count = summaries.len(),
        "listed tickets"
    );
    Ok(summaries)
}

/// Full detail including comments (author names resolved, oldest first).
pub fn get(db: &Database, caller: &Caller, id: i64) -> Result<TicketDetail, ServiceError> {
    let ticket = db
        .get_ticket(id)?
        .ok_or_else(|| ServiceError::not_found("Ticket", id))?;
    if !caller.is_admin() && ticket.owner_id != caller.user_id {
        return Err(ServiceError::Forbidden);
    }

    let comments = db.comments_for_ticket(id)?;
    Ok(TicketDetail {
        id: ticket.id,
        title: ticket.title,
        description: ticket.description,
        status: ticket.status,
        priority: ticket.priority,
        project_id: ticket.project_id,
        category_id: ticket.category_id,
        owner_id: ticket.owner_id,
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
        comments,
    })
}

/// Owner is the caller; created_at is now; updated_at starts unset.
pub fn create(db: &Database, caller: &Caller, form: &TicketForm) -> Result<i64, ServiceError> {
    validate_form(db, form)?;
    let id = db.create_ticket(form, caller.user_id)?;
    debug!(caller = caller.user_id, ticket = id, "created ticket");
    Ok(id)
}

/// Overwrites every mutable field and stamps updated_at. No transition rules
/// apply: any status/priority combination is accepted. Owner never changes.
pub fn update(
    db: &Database,
    caller: &Caller,
    id: i64,
    form: &TicketForm,
) -> Result<(), ServiceError> {
    let ticket = db
        .get_ticket(id)?
        .ok_or_else(|| ServiceError::not_found("Ticket", id))?;
    if !caller.is_admin() && ticket.owner_id != caller.user_id {
        return Err(ServiceError::Forbidden);
    }

    validate_form(db, form)?;
    db.update_ticket(id, form)?;
    debug!(caller = caller.user_id, ticket = id, "updated ticket");
    Ok(())
}

/// Admin only — stricter than get/update, which also allow the owner. The
/// ticket's comments go with it.
pub fn delete(db: &Database, caller: &Caller, id: i64) -> Result<(), ServiceError> {
    if !caller.is_admin() {
        return Err(ServiceError::Forbidden);
    }
    if !db.delete_ticket(id)? {
        return Err(ServiceError::not_found("Ticket", id));
    }
    debug!(caller = caller.user_id, ticket = id, "deleted ticket");
    Ok(())
}

/// Author is the caller. Comments are immutable once posted.
pub fn add_comment(
    db: &Database,
    caller: &Caller,
    ticket_id: i64,
    body: &str,
) -> Result<i64, ServiceError> {
    let ticket = db
        .get_ticket(ticket_id)?
        .ok_or_else(|| ServiceError::not_found("Ticket", ticket_id))?;
    if !caller.is_admin() && ticket.owner_id != caller.user_id {
        return Err(ServiceError::Forbidden);
    }

    let mut errors = Vec::new();
    check_length("Body", body, COMMENT_MIN, COMMENT_MAX, &mut errors);
    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    let id = db.add_comment(ticket_id, caller.user_id, body)?;
    debug!(caller = caller.user_id, ticket = ticket_id, comment = id, "added comment");
    Ok(id)
}
