#[macro_use]
extern crate log;

use clap::{Parser, Subcommand};
use serde::Serialize;
use toontick::{
    domain::{
        entities::library::{LibraryPatch, ManhwaId, ManhwaItem, StoredItem},
        services::{
            catalogue::CatalogueService,
            library::{LibraryError, LibraryService, SetupReport},
            session::SessionService,
        },
    },
    infrastructure::{
        config::Config,
        database,
        domain::repositories::{
            catalogue::CatalogueRepositoryImpl, guest::GuestLibraryRepositoryImpl,
            library::LibraryRepositoryImpl, session::SessionRepositoryImpl,
        },
    },
};
use toontick_catalogue::{AniList, CatalogueEntry, SearchFilters, SortBy, SortOrder, YearRange};

#[derive(Parser)]
#[clap(version, about = "Track the manhwa you read")]
struct Opts {
    /// Path to config file
    #[clap(long)]
    config: Option<String>,
    /// Print results as JSON
    #[clap(long, global = true)]
    json: bool,
    #[clap(subcommand)]
    subcmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and move the guest library into the account
    Login { user_id: String },
    /// Sign out and wipe the guest library
    Logout,
    /// Rotate the session token
    Refresh,
    Whoami,
    /// Add a title, looked up in the catalogue unless --title is given
    Add {
        id: String,
        #[clap(long)]
        title: Option<String>,
        #[clap(long)]
        status: Option<String>,
        #[clap(long)]
        chapters: Option<i64>,
        #[clap(long)]
        progress: Option<i64>,
    },
    Remove { id: String },
    Update {
        id: String,
        #[clap(long)]
        status: Option<String>,
        #[clap(long, allow_hyphen_values = true)]
        progress: Option<i64>,
        #[clap(long)]
        chapters: Option<i64>,
    },
    List,
    /// Whether a title is in the active library
    Check { id: String },
    Migrate,
    /// Remove entries sharing a title, keeping the oldest
    Cleanup,
    /// Verify the account library can be read and written
    Doctor,
    Browse {
        #[clap(long, default_value_t = 1)]
        page: i64,
        #[clap(long, default_value_t = 1)]
        pages: i64,
    },
    Search {
        #[clap(default_value = "")]
        query: String,
        #[clap(long = "genre")]
        genres: Vec<String>,
        #[clap(long)]
        from: Option<i32>,
        #[clap(long)]
        to: Option<i32>,
        /// release_date, rating or popularity
        #[clap(long, default_value = "release_date")]
        sort: SortBy,
        /// asc or desc
        #[clap(long, default_value = "desc")]
        order: SortOrder,
    },
    Details { id: i64 },
}

type Library = LibraryService<LibraryRepositoryImpl, GuestLibraryRepositoryImpl>;

async fn library_service(config: &Config) -> Result<Library, anyhow::Error> {
    let pool = database::establish_connection(&config.database_path, config.create_database).await?;

    Ok(LibraryService::new(
        LibraryRepositoryImpl::new(pool),
        GuestLibraryRepositoryImpl::new(&config.guest_library_path),
    ))
}

fn catalogue_service(config: &Config) -> Result<CatalogueService<CatalogueRepositoryImpl>, anyhow::Error> {
    let client = AniList::new(
        &config.catalogue.endpoint,
        config.catalogue.timeout(),
        config.catalogue.min_request_interval(),
    )?;

    Ok(CatalogueService::new(CatalogueRepositoryImpl::new(
        client,
        config.catalogue.per_page,
    )))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_stored(item: &StoredItem) {
    let chapters = item
        .chapters()
        .map(|chapters| chapters.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "{:>10}  {:<13} {:>5}/{:<5} {}",
        item.manhwa_id(),
        item.status(),
        item.progress(),
        chapters,
        item.title()
    );
}

fn print_entries(entries: &[CatalogueEntry], offline: bool, json: bool) -> Result<(), anyhow::Error> {
    if json {
        return print_json(&entries);
    }

    if offline {
        println!("(catalogue unavailable, showing offline data)");
    }
    for entry in entries {
        let year = entry
            .year
            .map(|year| year.to_string())
            .unwrap_or_default();
        println!("{:>10}  {:<4}  {}", entry.id, year, entry.title);
    }

    Ok(())
}

/// Duplicates are reported as a notice, everything else fails the command.
fn report(result: Result<(), LibraryError>) -> Result<(), anyhow::Error> {
    match result {
        Err(e) if e.is_warning() => {
            println!("warning: {e}");
            Ok(())
        }
        result => Ok(result?),
    }
}

async fn run(opts: Opts, config: Config) -> Result<(), anyhow::Error> {
    let session_svc = SessionService::new(
        SessionRepositoryImpl::new(&config.session_path),
        config.session_ttl(),
    );
    let json = opts.json;

    match opts.subcmd {
        Command::Login { user_id } => {
            let library_svc = library_service(&config).await?;
            let (session, event) = session_svc.sign_in(&user_id).await?;
            let library = library_svc.handle_session_event(&event).await?;

            println!(
                "signed in as {}, {} entries in library",
                session.user_id,
                library.map(|library| library.len()).unwrap_or_default()
            );
        }
        Command::Logout => {
            let library_svc = library_service(&config).await?;
            let event = session_svc.sign_out().await?;
            library_svc.handle_session_event(&event).await?;

            println!("signed out");
        }
        Command::Refresh => {
            let event = session_svc.refresh().await?;
            let library_svc = library_service(&config).await?;
            library_svc.handle_session_event(&event).await?;

            println!("session refreshed");
        }
        Command::Whoami => match session_svc.current().await? {
            Some(session) if json => print_json(&session)?,
            Some(session) => println!("{} (until {})", session.user_id, session.expires_at),
            None => println!("guest"),
        },
        Command::Add {
            id,
            title,
            status,
            chapters,
            progress,
        } => {
            let mut item = match title {
                Some(title) => ManhwaItem {
                    id: ManhwaId::new(id),
                    title,
                    ..Default::default()
                },
                None => {
                    let id = id.parse::<i64>()?;
                    ManhwaItem::from(catalogue_service(&config)?.get_by_id(id).await?)
                }
            };
            if status.is_some() {
                item.status = status;
            }
            if chapters.is_some() {
                item.chapters = chapters;
            }
            item.progress = progress.or(item.progress);

            let user_id = session_svc.current_user_id().await?;
            let library_svc = library_service(&config).await?;
            report(
                library_svc
                    .add(user_id.as_deref(), item)
                    .await
                    .map(|item| println!("added {}", item.title())),
            )?;
        }
        Command::Remove { id } => {
            let user_id = session_svc.current_user_id().await?;
            let library_svc = library_service(&config).await?;
            library_svc
                .remove(user_id.as_deref(), &ManhwaId::new(id))
                .await?;

            println!("removed");
        }
        Command::Update {
            id,
            status,
            progress,
            chapters,
        } => {
            let patch = LibraryPatch {
                status,
                progress,
                chapters,
                ..Default::default()
            };
            if patch.is_empty() {
                println!("nothing to update");
                return Ok(());
            }

            let user_id = session_svc.current_user_id().await?;
            let library_svc = library_service(&config).await?;
            let item = library_svc
                .update(user_id.as_deref(), &ManhwaId::new(id), patch)
                .await?;

            if json {
                print_json(&item)?;
            } else {
                print_stored(&StoredItem::Account(item));
            }
        }
        Command::List => {
            let user_id = session_svc.current_user_id().await?;
            let library_svc = library_service(&config).await?;
            let library = library_svc.get_library(user_id.as_deref()).await?;

            if json {
                print_json(&library)?;
            } else if library.is_empty() {
                println!("library is empty");
            } else {
                library.iter().for_each(print_stored);
            }
        }
        Command::Check { id } => {
            let user_id = session_svc.current_user_id().await?;
            let library_svc = library_service(&config).await?;
            let present = library_svc
                .is_present(user_id.as_deref(), &ManhwaId::new(id))
                .await;

            println!("{}", if present { "in library" } else { "not in library" });
        }
        Command::Migrate => {
            let user_id = session_svc
                .current_user_id()
                .await?
                .ok_or(LibraryError::AuthRequired)?;
            let library_svc = library_service(&config).await?;
            let library = library_svc.migrate(&user_id).await?;

            println!("{} entries in library", library.len());
        }
        Command::Cleanup => {
            let user_id = session_svc
                .current_user_id()
                .await?
                .ok_or(LibraryError::AuthRequired)?;
            let library_svc = library_service(&config).await?;
            let report = library_svc.cleanup_duplicates(&user_id).await?;

            if json {
                print_json(&report)?;
            } else {
                for (title, id) in &report.details {
                    println!("duplicate {title} ({id})");
                }
                println!(
                    "{} of {} duplicates removed",
                    report.duplicates_removed, report.duplicates_found
                );
            }
        }
        Command::Doctor => {
            let user_id = session_svc
                .current_user_id()
                .await?
                .ok_or(LibraryError::AuthRequired)?;
            let library_svc = library_service(&config).await?;

            match library_svc.check_setup(&user_id).await {
                SetupReport::Ready { entries } => {
                    println!("library ready, {entries} entries");
                }
                SetupReport::Failed { stage, error } => {
                    error!("setup check failed at {stage:?}: {error:?}");
                    anyhow::bail!("setup check failed at {stage:?}: {error}");
                }
            }
        }
        Command::Browse { page, pages } => {
            let catalogue_svc = catalogue_service(&config)?;
            let entries = catalogue_svc.list(page, pages).await?;

            print_entries(&entries, catalogue_svc.is_offline(), json)?;
        }
        Command::Search {
            query,
            genres,
            from,
            to,
            sort,
            order,
        } => {
            let default_range = YearRange::default();
            let filters = SearchFilters {
                genres,
                year_range: YearRange {
                    from: from.unwrap_or(default_range.from),
                    to: to.unwrap_or(default_range.to),
                },
                sort_by: sort,
                sort_order: order,
            };

            let catalogue_svc = catalogue_service(&config)?;
            let entries = catalogue_svc.search(&query, &filters).await?;

            print_entries(&entries, catalogue_svc.is_offline(), json)?;
        }
        Command::Details { id } => {
            let catalogue_svc = catalogue_service(&config)?;
            let entry = catalogue_svc.get_by_id(id).await?;

            if json {
                print_json(&entry)?;
            } else {
                println!("{} ({})", entry.title, entry.id);
                println!("status: {}", entry.status);
                if let Some(chapters) = entry.chapters {
                    println!("chapters: {chapters}");
                }
                if let Some(score) = entry.average_score {
                    println!("score: {score}");
                }
                if !entry.genres.is_empty() {
                    println!("genres: {}", entry.genres.join(", "));
                }
                if let Some(description) = entry.description {
                    println!("\n{description}");
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        if let Ok(toontick_log) = std::env::var("TOONTICK_LOG") {
            logger.parse_filters(&format!(
                "toontick={toontick_log},toontick_catalogue={toontick_log}"
            ));
        }
    }
    logger.init();

    let opts: Opts = Opts::parse();
    let config = Config::open(opts.config.as_ref())?;

    debug!("config: {:?}", config);

    run(opts, config).await
}
