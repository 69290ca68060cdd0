use clap::{Parser, Subcommand};
use colored::*;

use jira_inline::api::agile::SprintQuery;
use jira_inline::config::settings::{Account, AccountCache, Authentication, Settings};
use jira_inline::models::agile::SprintState;
use jira_inline::render;
use jira_inline::{JiraClient, JiraError, PageCursor, SearchOptions};

#[derive(Parser)]
#[command(name = "jira-inline")]
#[command(version)]
#[command(about = "Render Jira issues, searches and counts inline", long_about = None)]
struct Cli {
    /// for debugging purposes
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a single issue
    Issue {
        /// (e.g., PROJ-1234)
        key: String,

        /// Account alias to use instead of trying every account
        #[arg(long)]
        account: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Run a JQL search and print the results as a table
    Search {
        /// (e.g., "project = PROJ AND status = Done")
        jql: String,

        /// Maximum number of results per page
        #[arg(long)]
        limit: Option<i64>,

        /// Legacy offset of the first result
        #[arg(long, conflicts_with = "token")]
        offset: Option<u32>,

        /// Next page token printed by a previous search
        #[arg(long)]
        token: Option<String>,

        /// Follow page tokens until the last page
        #[arg(long)]
        all: bool,

        /// Upper bound on issues fetched with --all
        #[arg(long, default_value = "500")]
        max: usize,

        /// Comma separated columns (e.g., key,status,summary,$Story Points)
        #[arg(long)]
        columns: Option<String>,

        #[arg(long)]
        account: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Count the issues matching a JQL query
    Count {
        jql: String,

        #[arg(long)]
        account: Option<String>,
    },

    /// Open an issue in the browser
    Open {
        key: String,

        #[arg(long)]
        account: Option<String>,
    },

    /// Show the authenticated user
    Whoami {
        #[arg(long)]
        account: Option<String>,
    },

    /// Refresh the custom fields cache of every account
    Fields,

    /// Refresh the JQL autocomplete cache
    Autocomplete,

    /// Suggest values for a JQL field
    Suggest {
        field: String,

        #[arg(default_value = "")]
        value: String,
    },

    /// List the boards of a project
    Boards {
        project: String,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        account: Option<String>,
    },

    /// Show a sprint
    Sprint {
        id: u64,

        #[arg(long)]
        account: Option<String>,
    },

    /// List the sprints of a board
    Sprints {
        board: u64,

        /// Filter by state, repeatable
        #[arg(long, value_enum)]
        state: Vec<SprintState>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value = "0")]
        offset: u32,

        #[arg(long)]
        account: Option<String>,
    },

    /// Show the active sprint of a board
    LatestSprint {
        board: u64,

        #[arg(long)]
        account: Option<String>,
    },

    /// Show branches, commits and pull requests linked to an issue
    DevStatus {
        /// Numeric issue id (not the key)
        issue_id: String,

        #[arg(long)]
        account: Option<String>,
    },

    /// Manage Jira accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Add or replace an account interactively
    Add,

    /// List configured accounts (with masked secrets)
    List,

    /// Remove an account
    Remove { alias: String },

    /// Test the connection of an account
    Test { alias: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Display current preferences
    Show,

    /// Set a specific configuration value
    Set {
        /// Configuration key (e.g., preferences.log_images_fetch, accounts.work.token)
        key: String,
        /// New value
        value: String,
    },

    /// Get the path to the config file
    Path,
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose {
        "jira_inline=debug"
    } else {
        "jira_inline=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Issue { key, account, json } => handle_issue(&key, account.as_deref(), json).await,

        Commands::Search {
            jql,
            limit,
            offset,
            token,
            all,
            max,
            columns,
            account,
            json,
        } => {
            let options = SearchOptions {
                fields: Vec::new(),
                limit,
                page: PageCursor::from_parts(token, offset),
                account,
            };
            handle_search(&jql, options, all, max, columns.as_deref(), json).await
        }

        Commands::Count { jql, account } => handle_count(&jql, account.as_deref()).await,

        Commands::Open { key, account } => handle_open(&key, account.as_deref()),

        Commands::Whoami { account } => handle_whoami(account.as_deref()).await,

        Commands::Fields => handle_fields().await,

        Commands::Autocomplete => handle_autocomplete().await,

        Commands::Suggest { field, value } => handle_suggest(&field, &value).await,

        Commands::Boards {
            project,
            limit,
            account,
        } => handle_boards(&project, limit, account.as_deref()).await,

        Commands::Sprint { id, account } => handle_sprint(id, account.as_deref()).await,

        Commands::Sprints {
            board,
            state,
            limit,
            offset,
            account,
        } => {
            let query = SprintQuery {
                limit,
                offset,
                states: state,
                account,
            };
            handle_sprints(board, &query).await
        }

        Commands::LatestSprint { board, account } => {
            handle_latest_sprint(board, account.as_deref()).await
        }

        Commands::DevStatus { issue_id, account } => {
            handle_dev_status(&issue_id, account.as_deref()).await
        }

        Commands::Account { action } => handle_account(action).await,

        Commands::Config { action } => handle_config(action),
    };

    if let Err(e) = result {
        eprintln!("\n{}", e.to_string().red().bold());
        if let Some(hint) = e.downcast_ref::<JiraError>().and_then(JiraError::hint) {
            eprintln!("{}", hint);
        }
        std::process::exit(1);
    }
}

fn load_client() -> anyhow::Result<JiraClient> {
    let settings = Settings::load()?;
    Ok(JiraClient::new(settings))
}

/// Caches are best effort: a failed write only costs a refetch next time.
fn persist_caches(client: JiraClient) {
    if let Err(e) = client.into_settings().save() {
        tracing::warn!("Failed to save caches: {}", e);
    }
}

async fn handle_issue(key: &str, account: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut jira = load_client()?;
    let issue = jira.get_issue(key, &[], account).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issue)?);
        return Ok(());
    }

    let color = match (issue.status_name(), issue.account.as_deref()) {
        (Some(status), Some(alias)) => {
            let (status, alias) = (status.to_string(), alias.to_string());
            jira.update_status_color_cache(&status, &alias).await.ok()
        }
        _ => None,
    };

    println!("{}", render::issue_line(&issue, color.as_deref()));
    if let Some(kind) = issue.issue_type_name() {
        println!("  {} {}", "Type:".bold(), kind);
    }
    if let Some(priority) = issue.priority_name() {
        println!("  {} {}", "Priority:".bold(), priority);
    }
    if let Some(assignee) = issue.assignee_name() {
        println!("  {} {}", "Assignee:".bold(), assignee.bright_white());
    }
    if let Some(reporter) = issue.reporter_name() {
        println!("  {} {}", "Reporter:".bold(), reporter);
    }
    if let Some(alias) = issue.account.as_deref() {
        let color = jira.settings().account(alias).and_then(|a| a.color.as_deref());
        println!("  {} {}", "Account:".bold(), render::account_label(alias, color));
    }

    persist_caches(jira);
    Ok(())
}

fn resolve_custom_in_any(jira: &JiraClient, name: &str) -> Option<String> {
    jira.settings()
        .accounts
        .iter()
        .find_map(|a| jira.custom_field_key(&a.alias, name))
}

async fn handle_search(
    jql: &str,
    mut options: SearchOptions,
    all: bool,
    max: usize,
    columns: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let jira = load_client()?;

    let raw_columns: Vec<String> = match columns {
        Some(list) => list.split(',').map(str::to_string).collect(),
        None => jira.settings().preferences.search_columns.clone(),
    };
    let columns = render::parse_columns(&raw_columns);
    let resolve = |name: &str| resolve_custom_in_any(&jira, name);

    options.fields = render::fields_for_columns(&columns, &resolve);
    if options.limit.is_none() {
        options.limit = Some(jira.settings().preferences.search_results_limit);
    }

    let (issues, next_token) = if all {
        (jira.search_all(jql, &options, max).await?, None)
    } else {
        let results = jira.search(jql, &options).await?;
        if json_output {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }
        let token = results
            .has_more()
            .then(|| results.next_page_token().map(str::to_string))
            .flatten();
        (results.into_issues(), token)
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&issues)?);
        return Ok(());
    }

    println!("{}", format!("  JQL: {}", jql).dimmed());
    println!();

    if issues.is_empty() {
        println!("{}", "  No issues found".dimmed());
        return Ok(());
    }

    print!("{}", render::render_table(&issues, &columns, &resolve));
    println!();
    println!("{} results", issues.len().to_string().bright_white());

    if let Some(token) = next_token {
        println!(
            "{}",
            format!("  More results available: --token {}", token).dimmed()
        );
    }

    Ok(())
}

async fn handle_count(jql: &str, account: Option<&str>) -> anyhow::Result<()> {
    let jira = load_client()?;
    let count = jira.count(jql, account).await?;
    println!("{}", render::count_line(jql, count));
    Ok(())
}

fn handle_open(key: &str, account: Option<&str>) -> anyhow::Result<()> {
    let settings = Settings::load()?;

    let account = match account {
        Some(alias) => settings
            .account(alias)
            .ok_or_else(|| JiraError::AccountNotFound(alias.to_string()))?,
        None => settings.accounts.first().ok_or(JiraError::NoAccounts)?,
    };

    let issue_url = format!(
        "{}/browse/{}",
        account.host.trim_end_matches('/'),
        urlencoding::encode(key)
    );
    println!("{} {}", "Opening issue:".dimmed(), issue_url.bright_white());
    open::that(&issue_url)?;

    Ok(())
}

async fn handle_whoami(account: Option<&str>) -> anyhow::Result<()> {
    let jira = load_client()?;
    let user = jira.get_logged_user(account).await?;

    println!("  {} {}", "Name:".bold(), user.display_name.bright_white());
    if let Some(email) = &user.email_address {
        println!("  {} {}", "Email:".bold(), email);
    }
    if let Some(id) = user.account_id.as_ref().or(user.name.as_ref()) {
        println!("  {} {}", "Id:".bold(), id.dimmed());
    }
    Ok(())
}

async fn handle_fields() -> anyhow::Result<()> {
    let mut jira = load_client()?;

    println!("{}", "Refreshing custom fields...".cyan().bold());
    jira.update_custom_fields_cache().await?;

    for account in &jira.settings().accounts {
        println!(
            "  {} {} custom fields",
            account.alias.bright_white().bold(),
            account.cache.custom_fields_name_to_id.len()
        );
    }
    println!(
        "{}",
        format!("  {} JQL columns available", jira.columns().len()).dimmed()
    );

    jira.into_settings().save()?;
    Ok(())
}

async fn handle_autocomplete() -> anyhow::Result<()> {
    let mut jira = load_client()?;
    let cache = jira.update_jql_autocomplete_cache().await?;

    println!(
        "  {} fields, {} function groups",
        cache.fields.len().to_string().bright_white(),
        cache.functions.len().to_string().bright_white()
    );

    jira.into_settings().save()?;
    Ok(())
}

async fn handle_suggest(field: &str, value: &str) -> anyhow::Result<()> {
    let jira = load_client()?;
    let suggestions = jira.get_jql_autocomplete_field(field, value).await?;

    if suggestions.results.is_empty() {
        println!("{}", "  No suggestions".dimmed());
    }
    for suggestion in suggestions.results {
        println!("  {}", suggestion.value);
    }
    Ok(())
}

async fn handle_boards(project: &str, limit: Option<u32>, account: Option<&str>) -> anyhow::Result<()> {
    let jira = load_client()?;
    let boards = jira.get_boards(project, limit, account).await?;

    if boards.is_empty() {
        println!("{}", "  No boards found".dimmed());
    }
    for board in boards {
        println!(
            "  {}  {} {}",
            board.id.to_string().bright_white().bold(),
            board.name,
            board.kind.unwrap_or_default().dimmed()
        );
    }
    Ok(())
}

fn print_sprint(sprint: &jira_inline::models::agile::Sprint) {
    let state = match sprint.state {
        SprintState::Active => sprint.state.to_string().green(),
        SprintState::Future => sprint.state.to_string().yellow(),
        SprintState::Closed => sprint.state.to_string().bright_black(),
    };
    let dates = match (&sprint.start_date, &sprint.end_date) {
        (Some(start), Some(end)) => format!(
            "{} → {}",
            start.chars().take(10).collect::<String>(),
            end.chars().take(10).collect::<String>()
        ),
        _ => String::new(),
    };
    println!(
        "  {}  {} [{}] {}",
        sprint.id.to_string().bright_white().bold(),
        sprint.name,
        state,
        dates.dimmed()
    );
    if let Some(goal) = sprint.goal.as_deref().filter(|g| !g.is_empty()) {
        println!("      {}", goal.dimmed());
    }
}

async fn handle_sprint(id: u64, account: Option<&str>) -> anyhow::Result<()> {
    let jira = load_client()?;
    let sprint = jira.get_sprint(id, account).await?;
    print_sprint(&sprint);
    Ok(())
}

async fn handle_sprints(board: u64, query: &SprintQuery) -> anyhow::Result<()> {
    let jira = load_client()?;
    let sprints = jira.get_sprints(board, query).await?;

    if sprints.is_empty() {
        println!("{}", "  No sprints found".dimmed());
    }
    for sprint in &sprints {
        print_sprint(sprint);
    }
    Ok(())
}

async fn handle_latest_sprint(board: u64, account: Option<&str>) -> anyhow::Result<()> {
    let jira = load_client()?;
    match jira.get_latest_sprint(board, account).await? {
        Some(sprint) => print_sprint(&sprint),
        None => println!("{}", "  No active sprint".dimmed()),
    }
    Ok(())
}

async fn handle_dev_status(issue_id: &str, account: Option<&str>) -> anyhow::Result<()> {
    let jira = load_client()?;
    let status = jira.get_dev_status(issue_id, account).await?;

    let counts = status.counts();
    if counts.is_empty() {
        println!("{}", "  No development information".dimmed());
    }
    for (kind, count) in counts {
        println!("  {} {}", format!("{}:", kind).bold(), count);
    }
    Ok(())
}

fn load_or_default() -> anyhow::Result<Settings> {
    if Settings::config_path()?.exists() {
        Settings::load()
    } else {
        Ok(Settings::default())
    }
}

async fn handle_account(action: AccountAction) -> anyhow::Result<()> {
    match action {
        AccountAction::Add => handle_account_add().await,

        AccountAction::List => {
            let settings = Settings::load()?;

            if settings.accounts.is_empty() {
                println!("{}", "  No accounts configured".dimmed());
            }
            for account in &settings.accounts {
                println!(
                    "{} {}",
                    render::account_label(&account.alias, account.color.as_deref()),
                    format!("(priority {})", account.priority).dimmed()
                );
                println!("  {} {}", "host:".dimmed(), account.host);
                println!(
                    "  {} {}",
                    "auth:".dimmed(),
                    account.authentication.label()
                );
                if let Some(username) = account.authentication.username() {
                    println!("  {} {}", "username:".dimmed(), username);
                }
                println!(
                    "  {} {}",
                    "secret:".dimmed(),
                    account.authentication.masked_secret().yellow()
                );
            }
            Ok(())
        }

        AccountAction::Remove { alias } => {
            let mut settings = Settings::load()?;
            if !settings.remove_account(&alias) {
                return Err(JiraError::AccountNotFound(alias).into());
            }
            settings.save()?;
            println!("{}", format!("✓ Removed account {}", alias).green().bold());
            Ok(())
        }

        AccountAction::Test { alias } => {
            let jira = load_client()?;

            print!("{}", format!("  Testing {}... ", alias).dimmed());
            std::io::Write::flush(&mut std::io::stdout())?;

            match jira.test_connection(&alias).await {
                Ok(_) => {
                    println!("{}", "✓".green().bold());
                    Ok(())
                }
                Err(e) => {
                    println!("{}", "✗".red().bold());
                    Err(e.into())
                }
            }
        }
    }
}

async fn handle_account_add() -> anyhow::Result<()> {
    use dialoguer::{Confirm, Input, Password, Select};

    let mut settings = load_or_default()?;

    println!("{}", "Jira Account Setup".cyan().bold());
    println!(
        "{}",
        "Credentials are stored in ~/.jira-inline/config.toml (mode 600)".dimmed()
    );
    println!();

    let alias: String = Input::new().with_prompt("Alias").interact_text()?;
    let host: String = Input::new()
        .with_prompt("Host (e.g., https://<company>.atlassian.net)")
        .interact_text()?;

    let choices = [
        "Jira Cloud (email + API token)",
        "Basic (username + password)",
        "Bearer token (Personal Access Token)",
    ];
    let choice = Select::new()
        .with_prompt("Authentication")
        .items(&choices)
        .default(0)
        .interact()?;

    let authentication = match choice {
        0 => {
            println!(
                "{}",
                "  Create a token at https://id.atlassian.com/manage-profile/security/api-tokens"
                    .dimmed()
            );
            Authentication::Cloud {
                username: Input::new().with_prompt("Email").interact_text()?,
                api_token: Password::new().with_prompt("API token").interact()?,
            }
        }
        1 => Authentication::Basic {
            username: Input::new().with_prompt("Username").interact_text()?,
            password: Password::new().with_prompt("Password").interact()?,
        },
        _ => Authentication::BearerToken {
            token: Password::new()
                .with_prompt("Personal Access Token")
                .interact()?,
        },
    };

    let priority: u32 = Input::new()
        .with_prompt("Priority (lower is tried first)")
        .default(settings.accounts.len() as u32)
        .interact_text()?;

    let account = Account {
        alias: alias.trim().to_string(),
        host: host.trim().trim_end_matches('/').to_string(),
        authentication,
        priority,
        color: None,
        cache: AccountCache::default(),
    };

    println!();
    print!("{}", "  Testing Jira connection... ".dimmed());
    std::io::Write::flush(&mut std::io::stdout())?;

    let probe = JiraClient::new(Settings {
        preferences: settings.preferences.clone(),
        accounts: vec![account.clone()],
    });
    match probe.test_connection(&account.alias).await {
        Ok(_) => println!("{}", "✓".green().bold()),
        Err(e) => {
            println!("{}", "✗".red().bold());
            println!("{}", format!("  {}", e).red());
            let keep = Confirm::new()
                .with_prompt("Save the account anyway?")
                .default(false)
                .interact()?;
            if !keep {
                anyhow::bail!("Account not saved");
            }
        }
    }

    let alias = account.alias.clone();
    settings.upsert_account(account);
    settings.save()?;

    println!();
    println!("{}", format!("✓ Saved account {}", alias).green().bold());
    Ok(())
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = Settings::load()?;
            let prefs = &settings.preferences;

            println!("{}", "[preferences]".bold());
            println!(
                "  {} {}",
                "search_results_limit:".dimmed(),
                prefs.search_results_limit.to_string().bright_white()
            );
            println!(
                "  {} {}",
                "search_columns:".dimmed(),
                prefs.search_columns.join(",").bright_white()
            );
            println!(
                "  {} {}",
                "log_requests_and_responses:".dimmed(),
                prefs.log_requests_and_responses.to_string().bright_white()
            );
            println!(
                "  {} {}",
                "log_images_fetch:".dimmed(),
                prefs.log_images_fetch.to_string().bright_white()
            );
            println!(
                "  {} {}",
                "api_base_path:".dimmed(),
                prefs.api_base_path.bright_white()
            );
            println!();
            println!(
                "{}",
                format!("  {} account(s), see 'jira-inline account list'", settings.accounts.len())
                    .dimmed()
            );
            Ok(())
        }

        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load()?;
            settings.set_value(&key, &value)?;
            settings.save()?;

            println!("{}", format!("✓ Updated {}", key).green().bold());
            Ok(())
        }

        ConfigAction::Path => {
            println!("{}", Settings::config_path()?.display());
            Ok(())
        }
    }
}
