use anyhow::{bail, Context, Error};
use dashboard_client::{
    endpoints::{self, data, DataQuery, ProfileUpdate, RecordInput, Registration},
    guard::{self, Outcome},
    nav::{History, Route},
    notify::ToastKind,
    ApiClient, ApiError, Config, CredentialStore, FileStore, Id, Preferences,
    Session, Theme, User,
};
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::from_args();

    let config = args.config()?;
    log::debug!("Starting application with {:#?}", config);

    let store: Arc<dyn CredentialStore> = Arc::new(args.store()?);
    let api = ApiClient::new(&config, store)?;
    let start = args.command.route().unwrap_or(Route::Root);
    let history = Arc::new(History::new(start));
    let session = Session::new(api, history.clone(), &config);

    // the equivalent of mounting the application
    session.verify().await;

    let result = run(&session, &args.command).await;

    for toast in session.toasts().drain() {
        match toast.kind {
            ToastKind::Success => eprintln!("[ok] {}", toast.message),
            ToastKind::Error => eprintln!("[error] {}", toast.message),
        }
    }
    log::debug!("Visited {:?}", history.entries());

    result
}

async fn run(session: &Session, command: &Command) -> Result<(), Error> {
    let route = match command.route() {
        Some(route) => route,
        None => {
            session.logout();
            return Ok(());
        },
    };

    match guard::resolve(&session.state(), route) {
        Outcome::Render(_) => {},
        Outcome::Redirect(Route::Dashboard) => {
            if let Some(user) = session.user() {
                println!("Already logged in as {}", user.email);
            }
            return Ok(());
        },
        Outcome::Redirect(Route::Login) => {
            bail!("You need to log in first (try the \"login\" command)")
        },
        other => bail!("Unable to show {}: {:?}", route, other),
    }

    match command {
        Command::Login { email, password } => {
            session.login(email, password).await?;
            print_user(&session.user().context("Login didn't set a user")?);
        },
        Command::Register(register) => {
            session.register(&register.to_registration()).await?;
            let user = session.user().context("Registration didn't set a user")?;
            print_user(&user);
        },
        // handled before the guard
        Command::Logout => {},
        Command::Whoami => {
            session.refresh_user().await;
            match session.user() {
                Some(user) => print_user(&user),
                None => bail!("Your session has expired, please log in again"),
            }
        },
        Command::Profile(ProfileCommand::Update(update)) => {
            let current = session.user().context("No user is loaded")?;
            let update = update.to_update(&current);
            let user = session.update_profile(&update).await?;
            print_user(&user);
        },
        Command::Stats => {
            let stats = endpoints::user::stats(session.api()).await;
            let summary = data::summary(session.api()).await;
            let stats = report(session, stats, None)?;
            let summary = report(session, summary, None)?;

            println!("User:\n{}", serde_json::to_string_pretty(&stats)?);
            println!("Data:\n{}", serde_json::to_string_pretty(&summary)?);
        },
        Command::Data(cmd) => run_data(session, cmd).await?,
    }

    Ok(())
}

async fn run_data(
    session: &Session,
    command: &DataCommand,
) -> Result<(), Error> {
    let api = session.api();

    match command {
        DataCommand::List(query) => {
            let page = data::list(api, &query.to_query()).await;
            let page = report(session, page, None)?;

            for record in &page.data {
                println!(
                    "{}\t{}\t{}\t{} {}",
                    record.id,
                    record.title,
                    record.category,
                    record.value,
                    record.unit
                );
            }
            println!(
                "Page {} of {} ({} records)",
                page.pagination.page,
                page.pagination.pages,
                page.pagination.total
            );
        },
        DataCommand::Create(record) => {
            let created = data::create(api, &record.to_input()).await;
            let created = report(
                session,
                created,
                Some("Data record created successfully!"),
            )?;
            println!("{}", created.id);
        },
        DataCommand::Update { id, record } => {
            let updated = data::update(api, id, &record.to_input()).await;
            let msg = "Data record updated successfully!";
            report(session, updated, Some(msg))?;
        },
        DataCommand::Delete { id } => {
            let deleted = data::delete(api, id).await;
            let msg = "Data record deleted successfully!";
            report(session, deleted, Some(msg))?;
        },
        DataCommand::Summary => {
            let summary = report(session, data::summary(api).await, None)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
    }

    Ok(())
}

/// Turn the outcome of a data request into a notification.
fn report<T>(
    session: &Session,
    outcome: Result<T, ApiError>,
    success: Option<&str>,
) -> Result<T, Error> {
    match outcome {
        Ok(value) => {
            if let Some(msg) = success {
                session.toasts().success(msg);
            }
            Ok(value)
        },
        Err(e) => {
            session.toasts().error(e.describe());
            Err(e.into())
        },
    }
}

fn print_user(user: &User) {
    println!("{} <{}>", user.display_name(), user.email);
    println!("  role: {}", user.role);
    if let Some(ref last_login) = user.last_login {
        println!("  last login: {}", last_login);
    }
    println!(
        "  theme: {:?}, notifications: {}",
        user.preferences.theme, user.preferences.notifications
    );
}

#[derive(Debug, StructOpt)]
#[structopt(name = "dashboard", about = "Talk to the dashboard backend")]
struct Args {
    #[structopt(
        long = "api-url",
        help = "The backend's base URL, falls back to $API_URL"
    )]
    api_url: Option<String>,
    #[structopt(
        long = "token-dir",
        parse(from_os_str),
        help = "Where to keep the bearer token between runs"
    )]
    token_dir: Option<PathBuf>,
    #[structopt(subcommand)]
    command: Command,
}

impl Args {
    fn config(&self) -> Result<Config, Error> {
        let config = match self.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                Config::default().with_base_url(url)?
            },
            _ => Config::from_env()?,
        };

        Ok(config)
    }

    fn store(&self) -> Result<FileStore, Error> {
        match self.token_dir {
            Some(ref dir) => Ok(FileStore::new(dir)),
            None => FileStore::default_location()
                .context("Unable to find a config directory, use --token-dir"),
        }
    }
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(about = "Log in with an email and password")]
    Login {
        #[structopt(short = "u", long = "email")]
        email: String,
        #[structopt(
            short = "p",
            long = "password",
            env = "DASHBOARD_PASSWORD",
            hide_env_values = true
        )]
        password: String,
    },
    #[structopt(about = "Create an account and log into it")]
    Register(RegisterArgs),
    #[structopt(about = "Forget the stored token")]
    Logout,
    #[structopt(about = "Show the logged in user")]
    Whoami,
    Profile(ProfileCommand),
    #[structopt(about = "Show the dashboard statistics")]
    Stats,
    Data(DataCommand),
}

impl Command {
    /// The page this command stands in for, if any.
    fn route(&self) -> Option<Route> {
        match self {
            Command::Login { .. } | Command::Register(_) => Some(Route::Login),
            Command::Logout => None,
            Command::Whoami | Command::Profile(_) => Some(Route::Profile),
            Command::Stats => Some(Route::Dashboard),
            Command::Data(_) => Some(Route::Data),
        }
    }
}

#[derive(Debug, StructOpt)]
struct RegisterArgs {
    #[structopt(long = "name")]
    name: String,
    #[structopt(short = "u", long = "email")]
    email: String,
    #[structopt(
        short = "p",
        long = "password",
        env = "DASHBOARD_PASSWORD",
        hide_env_values = true
    )]
    password: String,
    #[structopt(long = "first-name")]
    first_name: Option<String>,
    #[structopt(long = "last-name")]
    last_name: Option<String>,
}

impl RegisterArgs {
    fn to_registration(&self) -> Registration {
        Registration {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, StructOpt)]
enum ProfileCommand {
    #[structopt(about = "Change the user's profile")]
    Update(ProfileArgs),
}

#[derive(Debug, StructOpt)]
struct ProfileArgs {
    #[structopt(long = "name")]
    name: Option<String>,
    #[structopt(long = "first-name")]
    first_name: Option<String>,
    #[structopt(long = "last-name")]
    last_name: Option<String>,
    #[structopt(long = "theme", help = "Either \"light\" or \"dark\"")]
    theme: Option<Theme>,
    #[structopt(long = "notifications")]
    notifications: bool,
    #[structopt(long = "no-notifications", conflicts_with = "notifications")]
    no_notifications: bool,
}

impl ProfileArgs {
    fn to_update(&self, current: &User) -> ProfileUpdate {
        let preferences_changed =
            self.theme.is_some() || self.notifications || self.no_notifications;

        let preferences = if preferences_changed {
            let mut prefs: Preferences = current.preferences;
            if let Some(theme) = self.theme {
                prefs.theme = theme;
            }
            if self.notifications {
                prefs.notifications = true;
            }
            if self.no_notifications {
                prefs.notifications = false;
            }
            Some(prefs)
        } else {
            None
        };

        ProfileUpdate {
            name: self.name.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            preferences,
        }
    }
}

#[derive(Debug, StructOpt)]
enum DataCommand {
    #[structopt(about = "List data records")]
    List(ListArgs),
    #[structopt(about = "Create a data record")]
    Create(RecordArgs),
    #[structopt(about = "Replace a data record")]
    Update {
        id: Id,
        #[structopt(flatten)]
        record: RecordArgs,
    },
    #[structopt(about = "Delete a data record")]
    Delete { id: Id },
    #[structopt(about = "Summarise every data record")]
    Summary,
}

#[derive(Debug, StructOpt)]
struct ListArgs {
    #[structopt(long = "page", default_value = "1")]
    page: u32,
    #[structopt(long = "limit", default_value = "10")]
    limit: u32,
    #[structopt(short = "s", long = "search")]
    search: Option<String>,
    #[structopt(long = "category")]
    category: Option<String>,
    #[structopt(long = "status")]
    status: Option<String>,
}

impl ListArgs {
    fn to_query(&self) -> DataQuery {
        DataQuery {
            page: self.page,
            limit: self.limit,
            search: self.search.clone(),
            category: self.category.clone(),
            status: self.status.clone(),
        }
    }
}

#[derive(Debug, StructOpt)]
struct RecordArgs {
    #[structopt(long = "title")]
    title: String,
    #[structopt(long = "value")]
    value: f64,
    #[structopt(long = "description", default_value = "")]
    description: String,
    #[structopt(long = "category", default_value = "analytics")]
    category: String,
    #[structopt(long = "unit", default_value = "")]
    unit: String,
    #[structopt(long = "tags", default_value = "", help = "Comma-separated")]
    tags: String,
    #[structopt(long = "public")]
    public: bool,
}

impl RecordArgs {
    fn to_input(&self) -> RecordInput {
        RecordInput {
            description: self.description.clone(),
            category: self.category.clone(),
            unit: self.unit.clone(),
            tags: data::parse_tags(&self.tags),
            is_public: self.public,
            ..RecordInput::new(self.title.clone(), self.value)
        }
    }
}
