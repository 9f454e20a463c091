use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use mep_outreach::campaign::{Campaign, Catalog, STORAGE_KEY_PREFIX};
use mep_outreach::clipboard::{copy_to_clipboard, SystemClipboard};
use mep_outreach::commands;
use mep_outreach::config::{self, Config};
use mep_outreach::db::{self, SqliteStore};
use mep_outreach::directory::{self, group_name, DataSource, Directory};
use mep_outreach::filter::{filter, format_emails_for_copy};
use mep_outreach::locale;
use mep_outreach::model::{Draft, FilterState, SaveStatus};
use mep_outreach::render::render;
use mep_outreach::session::{last_saved_ago, DraftSession};
use mep_outreach::store::KvStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List MEPs, optionally filtered
    List {
        #[arg(long, default_value = "")]
        search: String,
        /// Exact country; defaults to the one suggested by your locale
        #[arg(long)]
        country: Option<String>,
        #[arg(long, default_value = "")]
        group: String,
        /// Ignore the locale-suggested country
        #[arg(long)]
        all: bool,
        /// Copy the listed email addresses to the clipboard
        #[arg(long)]
        copy_emails: bool,
        /// Drop the cached directory and reload it
        #[arg(long)]
        refresh: bool,
    },
    /// Countries present in the directory
    Countries,
    /// Political groups present in the directory
    Groups,
    /// Compose an email interactively
    Compose {
        #[arg(long)]
        campaign: Option<String>,
    },
    /// Print the saved draft and its rendered email
    Show {
        #[arg(long)]
        campaign: Option<String>,
    },
    /// Campaigns with a saved draft
    Drafts,
    /// Delete the saved draft
    Clear {
        #[arg(long)]
        campaign: Option<String>,
    },
    /// Print an example config
    ExampleConfig,
}

struct App {
    cfg: Config,
    store: SqliteStore,
    catalog: Catalog,
}

impl App {
    async fn open(path: &Path) -> Result<Self> {
        let cfg = config::load_or_default(path)?;
        cfg.ensure_dirs()?;

        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
        let store = SqliteStore::connect(&database_url).await?;

        let mut catalog = Catalog::builtin()?;
        if let Some(file) = cfg.app.campaign_file.as_deref() {
            catalog
                .extend_from_file(Path::new(file))
                .with_context(|| format!("loading campaigns from {}", file))?;
        }
        Ok(Self { cfg, store, catalog })
    }

    fn campaign(&self, id: Option<&str>) -> Result<&Campaign> {
        let id = id.unwrap_or(self.cfg.app.default_campaign.as_str());
        Ok(self.catalog.get(id)?)
    }

    async fn directory(&self, refresh: bool) -> Result<Directory> {
        let source = DataSource::from_config(self.cfg.app.directory_file.as_deref());
        let now = Utc::now();
        let loaded = if refresh {
            directory::refetch(&self.store, &source, now).await
        } else {
            directory::load(&self.store, &source, now, self.cfg.cache_ttl()).await
        };
        loaded.context("MEP data unavailable; run `list --refresh` to retry")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match args.command {
        Cmd::ExampleConfig => print!("{}", config::example()),
        command => run(App::open(&args.config).await?, command).await?,
    }
    Ok(())
}

async fn run(app: App, command: Cmd) -> Result<()> {
    match command {
        Cmd::List {
            search,
            country,
            group,
            all,
            copy_emails,
            refresh,
        } => {
            let directory = app.directory(refresh).await?;
            let country = match (country, all) {
                (Some(c), _) => c,
                (None, true) => String::new(),
                (None, false) => suggested_country(&directory),
            };
            list(&directory, FilterState { search, country, group }, copy_emails);
        }
        Cmd::Countries => {
            for country in app.directory(false).await?.countries() {
                println!("{}", country);
            }
        }
        Cmd::Groups => {
            for code in app.directory(false).await?.groups() {
                println!("{:<12} {}", code, group_name(&code).unwrap_or(""));
            }
        }
        Cmd::Compose { campaign } => {
            let campaign = app.campaign(campaign.as_deref())?;
            let directory = app.directory(false).await?;
            compose(&app, campaign, &directory).await?;
        }
        Cmd::Show { campaign } => {
            let campaign = app.campaign(campaign.as_deref())?;
            show(&app.store, campaign).await?;
        }
        Cmd::Drafts => {
            for key in db::kv_keys(app.store.pool(), STORAGE_KEY_PREFIX).await? {
                println!("{}", key.trim_start_matches(STORAGE_KEY_PREFIX));
            }
        }
        Cmd::Clear { campaign } => {
            let campaign = app.campaign(campaign.as_deref())?;
            app.store.remove(&campaign.storage_key()).await?;
            info!(campaign = %campaign.id, "draft cleared");
            println!("Cleared the saved draft for {}.", campaign.id);
        }
        Cmd::ExampleConfig => print!("{}", config::example()),
    }
    Ok(())
}

/// Locale country, but only when the directory actually lists it.
fn suggested_country(directory: &Directory) -> String {
    match locale::detect_country() {
        Some(c) if directory.countries().iter().any(|known| known == c) => {
            println!("Showing MEPs for {} (from your locale; --all for everyone)", c);
            c.to_string()
        }
        _ => String::new(),
    }
}

fn list(directory: &Directory, filters: FilterState, copy_emails: bool) {
    let found = filter(directory.meps(), &filters);
    for m in &found {
        let email = if m.email.is_empty() { "-" } else { m.email.as_str() };
        println!("{:>4}  {:<28} {:<14} {:<12} {}", m.id, m.name, m.country, m.group, email);
    }
    println!("{} of {} MEPs", found.len(), directory.len());

    if copy_emails {
        let emails = format_emails_for_copy(found.iter().copied());
        if copy_to_clipboard(&mut SystemClipboard, &emails) {
            let count = found.iter().filter(|m| !m.email.is_empty()).count();
            println!("Copied {} addresses to clipboard.", count);
        } else {
            println!("{}", emails);
        }
    }
}

async fn show(store: &SqliteStore, campaign: &Campaign) -> Result<()> {
    let Some(raw) = store.get(&campaign.storage_key()).await? else {
        println!("No saved draft for {}.", campaign.id);
        return Ok(());
    };
    let draft: Draft = match serde_json::from_str(&raw) {
        Ok(d) => d,
        Err(err) => {
            warn!(?err, "saved draft is unreadable");
            println!("The saved draft for {} is unreadable.", campaign.id);
            return Ok(());
        }
    };
    println!(
        "Step {}/4 {} | saved {}",
        draft.current_step.number(),
        draft.current_step.label(),
        last_saved_ago(draft.last_saved, Utc::now())
    );
    let email = render(&draft, campaign);
    if let Some(rep) = draft.selected_mep.as_ref() {
        println!("{}", recipient_line(&rep.name, &rep.email));
    }
    println!("Subject: {}\n\n{}", email.subject, email.body);
    Ok(())
}

fn recipient_line(name: &str, email: &str) -> String {
    if email.is_empty() {
        format!("To: {}", name)
    } else {
        format!("To: {} <{}>", name, email)
    }
}

async fn compose(app: &App, campaign: &Campaign, directory: &Directory) -> Result<()> {
    let store: Arc<dyn KvStore> = Arc::new(app.store.clone());
    let session = DraftSession::open(store, campaign, app.cfg.draft.clone()).await;

    println!("{}", campaign.title);
    if session.status() == SaveStatus::Restored {
        println!("Restored your saved draft.");
    }
    println!("Type `help` for commands.");

    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    commands::run_compose(
        session,
        campaign,
        directory,
        &mut SystemClipboard,
        BufReader::new(tokio::io::stdin()),
        interrupted,
        &mut std::io::stdout(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_without_address_has_no_brackets() {
        assert_eq!(recipient_line("Jan Novak", ""), "To: Jan Novak");
        assert_eq!(
            recipient_line("Maria Walsh", "maria@ep.eu"),
            "To: Maria Walsh <maria@ep.eu>"
        );
    }
}
