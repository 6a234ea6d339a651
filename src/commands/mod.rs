pub mod categories;
pub mod init;
pub mod projects;
pub mod tickets;
pub mod users;

use anyhow::{bail, Result};

use crate::models::Caller;

/// Boundary gate for the admin area, mirroring route-level authorization:
/// the handler refuses before any service call happens.
pub fn require_admin(caller: &Caller) -> Result<()> {
    if !caller.is_admin() {
        bail!("forbidden: Admin role required");
    }
    Ok(())
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", truncated)
    }
}
