use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use tunescout::{
    catalog::{DEFAULT_ARTIST_COUNT, DEFAULT_TRACK_COUNT},
    cli,
    config::{self, Settings},
    error,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP and WebSocket API server
    Serve(ServeOptions),

    /// Search tracks by name
    Search(SearchOptions),

    /// Show the year chart
    Chart(ChartOptions),

    /// Show trending artists with their top releases
    Artists(ArtistsOptions),

    /// Fetch Wikipedia summaries for artists
    Wiki(WikiOptions),

    /// Inspect and prune accounts
    Users(UsersOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeOptions {
    /// Open the API in the default browser once started
    #[clap(long)]
    pub open: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// Search query
    pub query: String,

    /// Maximum number of tracks to show
    #[clap(long, default_value_t = 14)]
    pub limit: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct ChartOptions {
    /// Restrict the chart to a Last.fm tag
    #[clap(long)]
    pub genre: Option<String>,

    /// Number of tracks
    #[clap(long, default_value_t = DEFAULT_TRACK_COUNT)]
    pub limit: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct ArtistsOptions {
    /// Restrict to a Last.fm tag
    #[clap(long)]
    pub genre: Option<String>,

    /// Number of artists
    #[clap(long, default_value_t = DEFAULT_ARTIST_COUNT)]
    pub limit: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct WikiOptions {
    /// Artist names
    #[clap(required = true)]
    pub names: Vec<String>,

    /// Wikipedia language code
    #[clap(long, default_value = "ru")]
    pub lang: String,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Inspect and prune accounts")]
pub struct UsersOptions {
    #[command(subcommand)]
    pub command: UsersSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum UsersSubcommand {
    /// List all accounts
    List,

    /// Delete an account with its playlist, likes and notifications
    Delete(UsersDeleteOpts),
}

#[derive(Parser, Debug, Clone)]
pub struct UsersDeleteOpts {
    /// Exact username
    pub username: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn settings() -> Settings {
    match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration. Err: {}", e);
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(opt) => cli::serve(settings(), opt.open).await,
        Command::Search(opt) => cli::search(&settings(), opt.query, opt.limit).await,
        Command::Chart(opt) => cli::chart(&settings(), opt.genre, opt.limit).await,
        Command::Artists(opt) => cli::trending_artists(&settings(), opt.genre, opt.limit).await,
        Command::Wiki(opt) => cli::wiki(&settings(), opt.names, opt.lang).await,
        Command::Users(opt) => match opt.command {
            UsersSubcommand::List => cli::list_users(&settings()).await,
            UsersSubcommand::Delete(d) => cli::delete_user(&settings(), d.username).await,
        },
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
