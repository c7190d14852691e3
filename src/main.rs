//! benchbook: administrative CLI over the lab notebook core.
//!
//! Bootstrap commands (init, team, user) run as the instance-level system
//! actor. Entity commands act as `--user` inside `--team` and go through
//! the same permission checks an outer API would.
//!
//! Usage:
//!   benchbook init
//!   benchbook team create "Lab A"
//!   benchbook user create Ada Lovelace ada@lab.test
//!   benchbook user join 1 1 --admin
//!   benchbook --user 1 --team 1 experiment create --tag qPCR
//!   benchbook --user 1 --team 1 category reorder 3:1 2:2

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use benchbook_lib::actor::Actor;
use benchbook_lib::db::{DbError, LabDb};
use benchbook_lib::entity::TemplateRef;
use benchbook_lib::error::{ApiError, EntityError};
use benchbook_lib::services::{
    ConcreteEntity, Experiments, Items, ItemsTypes, ServiceContext, TeamsService,
};
use benchbook_lib::state::load_config;
use benchbook_lib::types::Config;

#[derive(Parser)]
#[command(name = "benchbook")]
#[command(about = "Electronic lab notebook administration")]
struct Cli {
    /// Database file (overrides databasePath from the config file)
    #[arg(long, global = true, env = "BENCHBOOK_DB")]
    db: Option<PathBuf>,

    /// Acting user id for entity commands
    #[arg(long, global = true, env = "BENCHBOOK_USER")]
    user: Option<i64>,

    /// Team the acting user works in
    #[arg(long, global = true, env = "BENCHBOOK_TEAM")]
    team: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and apply migrations
    Init,
    /// Manage teams
    #[command(subcommand)]
    Team(TeamCommand),
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Work with experiments
    #[command(subcommand)]
    Experiment(ExperimentCommand),
    /// Work with resources
    #[command(subcommand)]
    Item(ItemCommand),
    /// Manage resource categories
    #[command(subcommand)]
    Category(CategoryCommand),
}

#[derive(Subcommand)]
enum TeamCommand {
    Create { name: String },
}

#[derive(Subcommand)]
enum UserCommand {
    Create {
        firstname: String,
        lastname: String,
        email: String,
        /// Grant instance-wide administration
        #[arg(long)]
        sysadmin: bool,
    },
    Join {
        user: i64,
        team: i64,
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum ExperimentCommand {
    Create {
        /// Template id, 0 for the team common template, -1 (default) for blank
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        template: i64,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Duplicate {
        id: i64,
        #[arg(long)]
        copy_files: bool,
    },
    Destroy { id: i64 },
    Show { id: i64 },
    List,
}

#[derive(Subcommand)]
enum ItemCommand {
    Create {
        /// Resource category id
        #[arg(long = "type")]
        item_type: i64,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Show { id: i64 },
    List,
}

#[derive(Subcommand)]
enum CategoryCommand {
    Create { title: String },
    List,
    /// Reorder with `id:position` pairs
    Reorder {
        #[arg(value_parser = parse_ordering)]
        pairs: Vec<(i64, i64)>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error("--user and --team are required for this command")]
    MissingActor,
    #[error("User {0} is not a member of team {1}")]
    NotInTeam(i64, i64),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// `id:position` into `(position, id)`.
fn parse_ordering(raw: &str) -> Result<(i64, i64), String> {
    let (id, position) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected id:position, got '{}'", raw))?;
    let id = id.trim().parse::<i64>().map_err(|e| format!("bad id '{}': {}", id, e))?;
    let position = position
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("bad position '{}': {}", position, e))?;
    Ok((position, id))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_db(cli_path: Option<PathBuf>, config: &Config) -> Result<LabDb, CliError> {
    let db = match cli_path {
        Some(path) => LabDb::open_at(path)?,
        None => LabDb::open(config)?,
    };
    Ok(db)
}

fn load_cli_actor(db: &LabDb, user: Option<i64>, team: Option<i64>) -> Result<Actor, CliError> {
    let (user, team) = match (user, team) {
        (Some(u), Some(t)) => (u, t),
        _ => return Err(CliError::MissingActor),
    };
    let actor = db
        .load_actor(user, team)?
        .ok_or(CliError::NotInTeam(user, team))?;
    log::info!("Acting as {} in team {}", db.user_fullname(user)?, team);
    Ok(actor)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config().map_err(CliError::Config)?;
    let db = open_db(cli.db, &config)?;

    match cli.command {
        Command::Init => {
            log::info!("Database ready");
            print_json(&serde_json::json!({ "status": "ok" }))
        }
        Command::Team(TeamCommand::Create { name }) => {
            let system = Actor::system();
            let id = TeamsService::new(&db, &system).create_team(&name)?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::User(UserCommand::Create {
            firstname,
            lastname,
            email,
            sysadmin,
        }) => {
            let system = Actor::system();
            let id = TeamsService::new(&db, &system).create_user(&firstname, &lastname, &email)?;
            if sysadmin {
                db.set_sysadmin(id, true)?;
            }
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::User(UserCommand::Join { user, team, admin }) => {
            let system = Actor::system();
            TeamsService::new(&db, &system).add_user_to_team(user, team, admin)?;
            print_json(&serde_json::json!({ "user": user, "team": team, "admin": admin }))
        }
        Command::Experiment(cmd) => {
            let actor = load_cli_actor(&db, cli.user, cli.team)?;
            let experiments = Experiments::new(ServiceContext::new(&db, &actor, &config));
            match cmd {
                ExperimentCommand::Create { template, tags } => {
                    let id = experiments.create(TemplateRef::from(template), &tags)?;
                    print_json(&experiments.read_one(id)?)
                }
                ExperimentCommand::Duplicate { id, copy_files } => {
                    let copy = experiments.duplicate(id, copy_files)?;
                    print_json(&experiments.read_one(copy)?)
                }
                ExperimentCommand::Destroy { id } => {
                    experiments.destroy(id)?;
                    print_json(&serde_json::json!({ "deleted": id }))
                }
                ExperimentCommand::Show { id } => print_json(&experiments.read_one(id)?),
                ExperimentCommand::List => print_json(&experiments.read_all()?),
            }
        }
        Command::Item(cmd) => {
            let actor = load_cli_actor(&db, cli.user, cli.team)?;
            let items = Items::new(ServiceContext::new(&db, &actor, &config));
            match cmd {
                ItemCommand::Create { item_type, tags } => {
                    let id = items.create(item_type, &tags)?;
                    print_json(&items.read_one(id)?)
                }
                ItemCommand::Show { id } => print_json(&items.read_one(id)?),
                ItemCommand::List => print_json(&items.read_all()?),
            }
        }
        Command::Category(cmd) => {
            let actor = load_cli_actor(&db, cli.user, cli.team)?;
            let types = ItemsTypes::new(ServiceContext::new(&db, &actor, &config));
            match cmd {
                CategoryCommand::Create { title } => {
                    let id = types.create(&title)?;
                    print_json(&types.read_one(id)?)
                }
                CategoryCommand::List => print_json(&types.read_all()?),
                CategoryCommand::Reorder { pairs } => {
                    types.update_ordering(&pairs)?;
                    print_json(&types.read_all()?)
                }
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Entity(err)) => {
            if let EntityError::Db(ref inner) = err {
                log::error!("Store failure: {}", inner);
            }
            let api = ApiError::from(&err);
            match serde_json::to_string(&api) {
                Ok(body) => eprintln!("{}", body),
                Err(_) => eprintln!("Error: {}", api.message),
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
