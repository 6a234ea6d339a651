use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;

use crate::models::{
    Category, Comment, CommentView, Project, Ticket, TicketForm, TicketPriority, TicketStatus,
    TicketSummary, User,
};

const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed entity store. Row-level access only: authorization and
/// field validation live in the service layer.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM pragma_user_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                r#"
                -- Identity tables
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    display_name TEXT,
                    credential TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS roles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS user_roles (
                    user_id INTEGER NOT NULL,
                    role_id INTEGER NOT NULL,
                    PRIMARY KEY (user_id, role_id),
                    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                    FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE
                );

                -- Tracker tables
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT
                );

                CREATE TABLE IF NOT EXISTS categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT
                );

                -- Project/category deletion cascades in the service layer,
                -- inside the same transaction as the parent row removal.
                -- owner_id is a plain identity key: tickets outlive their owner.
                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'new',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    project_id INTEGER NOT NULL,
                    category_id INTEGER NOT NULL,
                    owner_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT,
                    FOREIGN KEY (project_id) REFERENCES projects(id),
                    FOREIGN KEY (category_id) REFERENCES categories(id)
                );

                CREATE TABLE IF NOT EXISTS comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticket_id INTEGER NOT NULL,
                    author_id INTEGER NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (ticket_id) REFERENCES tickets(id) ON DELETE CASCADE
                );

                -- Indexes
                CREATE INDEX IF NOT EXISTS idx_tickets_owner ON tickets(owner_id);
                CREATE INDEX IF NOT EXISTS idx_tickets_project ON tickets(project_id);
                CREATE INDEX IF NOT EXISTS idx_tickets_category ON tickets(category_id);
                CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
                CREATE INDEX IF NOT EXISTS idx_comments_ticket ON comments(ticket_id);
                CREATE INDEX IF NOT EXISTS idx_user_roles_user ON user_roles(user_id);
                "#,
            )?;

            self.conn
                .execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
        }

        // Enable foreign keys
        self.conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(())
    }

    // Tickets

    pub fn create_ticket(&self, form: &TicketForm, owner_id: i64) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO tickets (title, description, status, priority, project_id, category_id, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                form.title,
                form.description,
                form.status.as_str(),
                form.priority.as_str(),
                form.project_id,
                form.category_id,
                owner_id,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, status, priority, project_id, category_id, owner_id, created_at, updated_at
             FROM tickets WHERE id = ?1",
        )?;

        let ticket = stmt.query_row([id], map_ticket).ok();
        Ok(ticket)
    }

    pub fn list_ticket_summaries(
        &self,
        owner_filter: Option<i64>,
        title_query: Option<&str>,
        status_filter: Option<TicketStatus>,
    ) -> Result<Vec<TicketSummary>> {
        let mut sql = String::from(
            "SELECT t.id, t.title, t.status, t.priority, t.created_at, p.name, c.name
             FROM tickets t
             JOIN projects p ON t.project_id = p.id
             JOIN categories c ON t.category_id = c.id",
        );
        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(owner_id) = owner_filter {
            conditions.push("t.owner_id = ?".to_string());
            params_vec.push(Box::new(owner_id));
        }

        if let Some(q) = title_query {
            conditions.push("instr(t.title, ?) > 0".to_string());
            params_vec.push(Box::new(q.to_string()));
        }

        if let Some(status) = status_filter {
            conditions.push("t.status = ?".to_string());
            params_vec.push(Box::new(status.as_str().to_string()));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql.push_str(" ORDER BY t.created_at DESC, t.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let summaries = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(TicketSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    status: parse_status(row.get::<_, String>(2)?),
                    priority: parse_priority(row.get::<_, String>(3)?),
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                    project: row.get(5)?,
                    category: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    /// Overwrites every mutable field and stamps updated_at. Ownership is
    /// never touched here.
    pub fn update_ticket(&self, id: i64, form: &TicketForm) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE tickets SET title = ?1, description = ?2, status = ?3, priority = ?4,
             project_id = ?5, category_id = ?6, updated_at = ?7 WHERE id = ?8",
            params![
                form.title,
                form.description,
                form.status.as_str(),
                form.priority.as_str(),
                form.project_id,
                form.category_id,
                now,
                id
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_ticket(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM tickets WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    // Comments

    pub fn add_comment(&self, ticket_id: i64, author_id: i64, body: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO comments (ticket_id, author_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![ticket_id, author_id, body, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ticket_id, author_id, body, created_at FROM comments WHERE id = ?1",
        )?;
        let comment = stmt
            .query_row([id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    author_id: row.get(2)?,
                    body: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })
            .ok();
        Ok(comment)
    }

    /// Comments on a ticket, oldest first, with the author resolved to a
    /// human-readable name.
    pub fn comments_for_ticket(&self, ticket_id: i64) -> Result<Vec<CommentView>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, COALESCE(u.display_name, u.email, '(deleted user)'), c.body, c.created_at
             FROM comments c
             LEFT JOIN users u ON c.author_id = u.id
             WHERE c.ticket_id = ?1
             ORDER BY c.created_at, c.id",
        )?;
        let comments = stmt
            .query_map([ticket_id], |row| {
                Ok(CommentView {
                    id: row.get(0)?,
                    author: row.get(1)?,
                    body: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    // Projects

    pub fn create_project(&self, name: &str, description: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO projects (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM projects WHERE id = ?1")?;
        let project = stmt.query_row([id], map_project).ok();
        Ok(project)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM projects ORDER BY name")?;
        let projects = stmt
            .query_map([], map_project)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn update_project(&self, id: i64, name: &str, description: Option<&str>) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE projects SET name = ?1, description = ?2 WHERE id = ?3",
            params![name, description, id],
        )?;
        Ok(rows > 0)
    }

    pub fn count_project_tickets(&self, id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE project_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Removes the project and every ticket under it (comments cascade at
    /// the storage layer) as one transaction. Returns the ticket count.
    pub fn delete_project_cascade(&self, id: i64) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let tickets = tx.execute("DELETE FROM tickets WHERE project_id = ?1", [id])?;
        tx.execute("DELETE FROM projects WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(tickets)
    }

    // Categories

    pub fn create_category(&self, name: &str, description: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO categories (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM categories WHERE id = ?1")?;
        let category = stmt.query_row([id], map_category).ok();
        Ok(category)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM categories ORDER BY name")?;
        let categories = stmt
            .query_map([], map_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn update_category(&self, id: i64, name: &str, description: Option<&str>) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE categories SET name = ?1, description = ?2 WHERE id = ?3",
            params![name, description, id],
        )?;
        Ok(rows > 0)
    }

    pub fn count_category_tickets(&self, id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE category_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_category_cascade(&self, id: i64) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let tickets = tx.execute("DELETE FROM tickets WHERE category_id = ?1", [id])?;
        tx.execute("DELETE FROM categories WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(tickets)
    }

    // Users and roles

    pub fn create_user(
        &self,
        email: &str,
        display_name: Option<&str>,
        credential: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (email, display_name, credential) VALUES (?1, ?2, ?3)",
            params![email, display_name, credential],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, display_name FROM users WHERE id = ?1")?;
        let user = stmt.query_row([id], map_user).ok();
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, display_name FROM users WHERE email = ?1")?;
        let user = stmt.query_row([email], map_user).ok();
        Ok(user)
    }

    pub fn email_taken(&self, email: &str, exclude_user: Option<i64>) -> Result<bool> {
        let count: i64 = match exclude_user {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2",
                params![email, id],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1",
                [email],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    pub fn update_user_profile(
        &self,
        id: i64,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE users SET email = ?1, display_name = ?2 WHERE id = ?3",
            params![email, display_name, id],
        )?;
        Ok(rows > 0)
    }

    pub fn set_credential(&self, id: i64, credential: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE users SET credential = ?1 WHERE id = ?2",
            params![credential, id],
        )?;
        Ok(rows > 0)
    }

    /// Role memberships cascade at the storage layer.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, display_name FROM users ORDER BY email")?;
        let users = stmt
            .query_map([], map_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn ensure_role(&self, name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO roles (name) VALUES (?1)",
            params![name],
        )?;
        let id = self
            .conn
            .query_row("SELECT id FROM roles WHERE name = ?1", [name], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    pub fn assign_role(&self, user_id: i64, role_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?1, ?2)",
            params![user_id, role_id],
        )?;
        Ok(rows > 0)
    }

    pub fn clear_roles(&self, user_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM user_roles WHERE user_id = ?1", [user_id])?;
        Ok(())
    }

    pub fn role_names_for_user(&self, user_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.name FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = ?1
             ORDER BY r.name",
        )?;
        let names = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn count_projects(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_categories(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn map_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_status(row.get::<_, String>(3)?),
        priority: parse_priority(row.get::<_, String>(4)?),
        project_id: row.get(5)?,
        category_id: row.get(6)?,
        owner_id: row.get(7)?,
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: row.get::<_, Option<String>>(9)?.map(parse_datetime),
    })
}

fn map_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_status(s: String) -> TicketStatus {
    s.parse().unwrap_or(TicketStatus::New)
}

fn parse_priority(s: String) -> TicketPriority {
    s.parse().unwrap_or(TicketPriority::Medium)
}
