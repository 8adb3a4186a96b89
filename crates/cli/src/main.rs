use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use project::SignUpOutcome;
use std::sync::Arc;
use studio::{search_result_to_item, MediaLibrary, MUSIC_TRACK};
use timeline::Timecode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod editor;
mod generate;
mod routes;

use app::App;
use editor::{editor_command, open_editor, print_timeline, save_editor, EditorAction};
use generate::generate_command;
use routes::Route;

#[derive(Parser)]
#[command(name = "storyreel")]
#[command(about = "storyreel - timeline editing and chat-driven video generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a screen by path (/, /editor, /editor/<id>, /script-generation, /projects)
    Open {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Manage saved projects
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },

    /// Edit a project's timeline
    Editor {
        /// Project id; omitted means a new project
        #[arg(short, long)]
        project: Option<String>,

        #[command(subcommand)]
        action: EditorAction,
    },

    /// Chat with the generation wizard
    Generate {
        /// Use scripted providers instead of the real services
        #[arg(long)]
        mock: bool,
    },

    /// Search sound effects and music
    Search {
        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Add the first result to this project's music track
        #[arg(long)]
        add_to: Option<String>,

        /// Position for the added clip
        #[arg(long, default_value = "0")]
        at: String,

        #[arg(long)]
        mock: bool,
    },

    /// Sign in to the hosted backend
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProjectsAction {
    /// List projects, most recently updated first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one project's timeline
    Show { id: String },
    /// Delete a project and its timeline
    Delete { id: String },
}

#[derive(Subcommand)]
enum AuthAction {
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print effective settings (secrets masked)
    Show,
    /// Set a value by dotted key, e.g. `api_keys.openai`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins unless --verbose is given
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app = App::load()?;

    match cli.command {
        Commands::Open { path } => open_command(&app, &path).await,
        Commands::Projects { action } => projects_command(&app, action).await,
        Commands::Editor { project, action } => editor_command(&app, project, action).await,
        Commands::Generate { mock } => generate_command(&app, mock).await,
        Commands::Search {
            query,
            limit,
            add_to,
            at,
            mock,
        } => search_command(&app, &query, limit, add_to, &at, mock).await,
        Commands::Auth { action } => auth_command(&app, action).await,
        Commands::Config { action } => config_command(&app, action),
    }
}

async fn open_command(app: &App, path: &str) -> Result<()> {
    match Route::parse(path) {
        Route::Landing => {
            println!("storyreel");
            println!("Turn an idea into a short video, then fine-tune it on a timeline.\n");
            println!("  storyreel open /script-generation   start the generation wizard");
            println!("  storyreel open /editor              open an empty timeline");
            println!("  storyreel open /projects            list saved projects");
            if app.is_local() {
                println!("\nProjects are stored locally.");
            }
            Ok(())
        }
        Route::Editor { project_id } => {
            let open = open_editor(app, project_id.as_deref()).await?;
            print_timeline(&open);
            Ok(())
        }
        Route::ScriptGeneration => generate_command(app, false).await,
        Route::Projects => projects_command(app, ProjectsAction::List { json: false }).await,
        Route::NotFound(path) => bail!("404: nothing lives at {path}"),
    }
}

async fn projects_command(app: &App, action: ProjectsAction) -> Result<()> {
    let session = app.session().await?;
    match action {
        ProjectsAction::List { json } => {
            let projects = app.store.list_projects(session.as_ref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
                return Ok(());
            }
            if projects.is_empty() {
                println!("No projects yet. Try `storyreel generate`.");
            }
            for p in projects {
                println!(
                    "{}  {:<30}  {}  updated {}",
                    p.id,
                    p.name,
                    Timecode::from_seconds(p.duration),
                    p.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ProjectsAction::Show { id } => {
            let open = open_editor(app, Some(&id)).await?;
            print_timeline(&open);
        }
        ProjectsAction::Delete { id } => {
            app.store.delete_project(session.as_ref(), &id).await?;
            info!("deleted project {}", id);
            println!("Deleted {id}");
        }
    }
    Ok(())
}

async fn search_command(
    app: &App,
    query: &str,
    limit: usize,
    add_to: Option<String>,
    at: &str,
    mock: bool,
) -> Result<()> {
    let search = app.providers(mock)?.require_search()?;
    let library = MediaLibrary::new(search)
        .with_cache(Arc::new(app.cache()))
        .with_limit(limit);
    let results = library.search(query).await?;
    if results.is_empty() {
        println!("No sounds found for \"{query}\".");
        return Ok(());
    }
    for r in &results {
        println!(
            "{:>8}  {:<40}  {:>6.1}s  {}",
            r.id,
            r.name,
            r.duration,
            r.license.as_deref().unwrap_or("-")
        );
    }

    if let Some(project_id) = add_to {
        let start = Timecode::parse(at)
            .map_err(anyhow::Error::msg)?
            .to_seconds();
        let mut open = open_editor(app, Some(&project_id)).await?;
        let item = search_result_to_item(&results[0], MUSIC_TRACK, start);
        let name = item.name.clone();
        open.editor.add_item(item)?;
        save_editor(app, &open).await?;
        println!("Added \"{name}\" to {project_id}");
    }
    Ok(())
}

fn read_password(given: Option<String>) -> Result<String> {
    if let Some(p) = given {
        return Ok(p);
    }
    use std::io::Write as _;
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn auth_command(app: &App, action: AuthAction) -> Result<()> {
    let client = || {
        app.auth_client().context(
            "no backend configured; set one with `storyreel config set backend.url <url>`",
        )
    };
    match action {
        AuthAction::Signup { email, password } => {
            let client = client()?;
            let password = read_password(password)?;
            match client.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => {
                    app.session_file.save(&session)?;
                    println!("Account created. Signed in as {}", session.email);
                }
                SignUpOutcome::ConfirmationRequired { email } => {
                    println!("Check {email} for a confirmation link, then run `storyreel auth login`.");
                }
            }
        }
        AuthAction::Login { email, password } => {
            let client = client()?;
            let password = read_password(password)?;
            let session = client.sign_in(&email, &password).await?;
            app.session_file.save(&session)?;
            println!("Signed in as {}", session.email);
        }
        AuthAction::Logout => {
            let client = client()?;
            if let Some(session) = app.session_file.load()? {
                if let Err(e) = client.sign_out(&session).await {
                    warn!("remote sign-out failed: {}", e);
                }
            }
            app.session_file.clear()?;
            println!("Signed out");
        }
        AuthAction::Status => match (&app.hosted, app.session().await?) {
            (None, _) => println!("Local mode: projects are stored on this machine."),
            (Some(backend), Some(session)) => println!(
                "Signed in to {} as {} (expires {})",
                backend.base_url(),
                session.email,
                session.expires_at.format("%Y-%m-%d %H:%M UTC")
            ),
            (Some(backend), None) => println!("Not signed in to {}", backend.base_url()),
        },
    }
    Ok(())
}

fn config_command(app: &App, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", app.settings_path.display());
            for line in app.settings.display_lines() {
                println!("{line}");
            }
        }
        ConfigAction::Set { key, value } => {
            // reload without environment overrides so they are not persisted
            let mut raw = project::Settings::load(&app.settings_path)?;
            raw.set(&key, &value)?;
            raw.save(&app.settings_path)?;
            println!("Set {key}");
        }
    }
    Ok(())
}
