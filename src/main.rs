use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bugtrack::commands;
use bugtrack::db::Database;
use bugtrack::identity;
use bugtrack::models::{Caller, Role, TicketPriority, TicketStatus};

#[derive(Parser)]
#[command(name = "bugtrack")]
#[command(about = "A small multi-tenant bug tracker")]
#[command(version)]
struct Cli {
    /// Path to the tracker database (defaults to .bugtrack/bugtrack.db,
    /// discovered by walking up from the current directory)
    #[arg(long, env = "BUGTRACK_DB", global = true)]
    db: Option<PathBuf>,

    /// Email of the acting user
    #[arg(short, long, env = "BUGTRACK_USER", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize bugtrack in the current directory and seed demo data
    Init,

    /// Ticket operations
    Ticket {
        #[command(subcommand)]
        action: TicketCommands,
    },

    /// Project administration (Admin only)
    Project {
        #[command(subcommand)]
        action: ProjectCommands,
    },

    /// Category administration (Admin only)
    Category {
        #[command(subcommand)]
        action: CategoryCommands,
    },

    /// User administration (Admin only)
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
}

#[derive(Subcommand)]
enum TicketCommands {
    /// List tickets visible to you (admins see everything)
    List {
        /// Restrict to titles containing this text
        #[arg(short, long)]
        query: Option<String>,
        /// Filter by status (new, in_progress, resolved, closed)
        #[arg(short, long)]
        status: Option<TicketStatus>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show ticket details including comments
    Show {
        /// Ticket ID
        id: i64,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Create a new ticket
    Create {
        /// Ticket title
        title: String,
        /// Ticket description
        #[arg(short, long)]
        description: String,
        /// Status (new, in_progress, resolved, closed)
        #[arg(short, long, default_value = "new")]
        status: TicketStatus,
        /// Priority (low, medium, high, critical)
        #[arg(short, long, default_value = "medium")]
        priority: TicketPriority,
        /// Owning project ID
        #[arg(long)]
        project: i64,
        /// Owning category ID
        #[arg(long)]
        category: i64,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Update a ticket (omitted fields keep their current values)
    Update {
        /// Ticket ID
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        status: Option<TicketStatus>,
        #[arg(short, long)]
        priority: Option<TicketPriority>,
        #[arg(long)]
        project: Option<i64>,
        #[arg(long)]
        category: Option<i64>,
    },

    /// Delete a ticket and its comments (Admin only)
    Delete {
        /// Ticket ID
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Add a comment to a ticket
    Comment {
        /// Ticket ID
        id: i64,
        /// Comment text
        body: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List all projects
    List,
    /// Create a project
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Update a project
    Update {
        id: i64,
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a project and every ticket under it
    Delete {
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List all categories
    List,
    /// Create a category
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Update a category
    Update {
        id: i64,
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a category and every ticket under it
    Delete {
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List all users with their roles
    List,
    /// Create a user account
    Create {
        email: String,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
        /// Initial password
        #[arg(short, long)]
        password: String,
        /// Role (Admin or User)
        #[arg(short, long, default_value = "User")]
        role: Role,
    },
    /// Update a user account
    Update {
        id: i64,
        email: String,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
        /// Role (Admin or User)
        #[arg(short, long, default_value = "User")]
        role: Role,
        /// Reset the password
        #[arg(long)]
        new_password: Option<String>,
    },
    /// Delete a user account
    Delete {
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

fn find_tracker_dir() -> Result<PathBuf> {
    let mut current = env::current_dir()?;

    loop {
        let candidate = current.join(commands::init::TRACKER_DIR);
        if candidate.exists() && candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("Not a bugtrack repository (or any parent). Run 'bugtrack init' first.");
        }
    }
}

fn get_db(cli_db: Option<&PathBuf>) -> Result<Database> {
    let db_path = match cli_db {
        Some(path) => path.clone(),
        None => find_tracker_dir()?.join(commands::init::DB_FILE),
    };
    Database::open(&db_path).context("Failed to open database")
}

fn get_caller(db: &Database, user: Option<&str>) -> Result<Caller> {
    let email = match user {
        Some(email) => email,
        None => bail!("Sign in required: pass --user <email> or set BUGTRACK_USER."),
    };
    match identity::resolve_caller(db, email)? {
        Some((_, caller)) => Ok(caller),
        None => bail!("Unknown user '{}'.", email),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let cwd = env::current_dir()?;
            commands::init::run(&cwd)
        }

        Commands::Ticket { action } => {
            let db = get_db(cli.db.as_ref())?;
            let caller = get_caller(&db, cli.user.as_deref())?;
            match action {
                TicketCommands::List {
                    query,
                    status,
                    json,
                } => commands::tickets::list(&db, &caller, query.as_deref(), status, json),
                TicketCommands::Show { id, json } => {
                    commands::tickets::show(&db, &caller, id, json)
                }
                TicketCommands::Create {
                    title,
                    description,
                    status,
                    priority,
                    project,
                    category,
                    json,
                } => commands::tickets::create(
                    &db,
                    &caller,
                    &title,
                    &description,
                    status,
                    priority,
                    project,
                    category,
                    json,
                ),
                TicketCommands::Update {
                    id,
                    title,
                    description,
                    status,
                    priority,
                    project,
                    category,
                } => commands::tickets::update(
                    &db,
                    &caller,
                    id,
                    title.as_deref(),
                    description.as_deref(),
                    status,
                    priority,
                    project,
                    category,
                ),
                TicketCommands::Delete { id, force } => {
                    commands::tickets::delete(&db, &caller, id, force)
                }
                TicketCommands::Comment { id, body } => {
                    commands::tickets::comment(&db, &caller, id, &body)
                }
            }
        }

        Commands::Project { action } => {
            let db = get_db(cli.db.as_ref())?;
            let caller = get_caller(&db, cli.user.as_deref())?;
            match action {
                ProjectCommands::List => commands::projects::list(&db, &caller),
                ProjectCommands::Create { name, description } => {
                    commands::projects::create(&db, &caller, &name, description.as_deref())
                }
                ProjectCommands::Update {
                    id,
                    name,
                    description,
                } => commands::projects::update(&db, &caller, id, &name, description.as_deref()),
                ProjectCommands::Delete { id, force } => {
                    commands::projects::delete(&db, &caller, id, force)
                }
            }
        }

        Commands::Category { action } => {
            let db = get_db(cli.db.as_ref())?;
            let caller = get_caller(&db, cli.user.as_deref())?;
            match action {
                CategoryCommands::List => commands::categories::list(&db, &caller),
                CategoryCommands::Create { name, description } => {
                    commands::categories::create(&db, &caller, &name, description.as_deref())
                }
                CategoryCommands::Update {
                    id,
                    name,
                    description,
                } => commands::categories::update(&db, &caller, id, &name, description.as_deref()),
                CategoryCommands::Delete { id, force } => {
                    commands::categories::delete(&db, &caller, id, force)
                }
            }
        }

        Commands::User { action } => {
            let db = get_db(cli.db.as_ref())?;
            let caller = get_caller(&db, cli.user.as_deref())?;
            match action {
                UserCommands::List => commands::users::list(&db, &caller),
                UserCommands::Create {
                    email,
                    name,
                    password,
                    role,
                } => commands::users::create(
                    &db,
                    &caller,
                    &email,
                    name.as_deref(),
                    &password,
                    role,
                ),
                UserCommands::Update {
                    id,
                    email,
                    name,
                    role,
                    new_password,
                } => commands::users::update(
                    &db,
                    &caller,
                    id,
                    &email,
                    name.as_deref(),
                    role,
                    new_password.as_deref(),
                ),
                UserCommands::Delete { id, force } => {
                    commands::users::delete(&db, &caller, id, force)
                }
            }
        }
    }
}
