mod api;
mod browser;
mod command;
mod config;
mod constants;
mod fetch;
mod list;
mod pagination;
mod preference;
mod query;
mod retry;
mod url;

use anyhow::Result;
use serde::de::DeserializeOwned;
use std::env;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{ArchiveClient, DetailCache, Endpoint, HistoryRecord, ListItem, Resource, Story, User};
use crate::browser::Browser;
use crate::config::Config;
use crate::fetch::{FetchConfig, ListFetcher};
use crate::list::ListView;
use crate::preference::FileStore;
use crate::url::MemoryHistory;

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,arkiv=debug"));

    // Try to create a log file in the config directory
    let log_file = Config::config_dir()
        .ok()
        .and_then(|dir| std::fs::create_dir_all(&dir).ok().map(|_| dir.join("arkiv.log")))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        // Log to file
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr if file logging fails
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"arkiv - Browse an Instagram story archive from the terminal

Usage: arkiv [--once] [list] [?query]

Lists:
    users           Archived profiles (default)
    stories         Archived stories
    history <uuid>  Change history of one profile

The optional query is an address-bar query string, for example
    arkiv stories '?search=jane&ordering=oldest&page=2'

Options:
    --once          Print the page and exit instead of browsing
    -h, --help      Show this help message
    -V, --version   Show the version

Type 'help' inside the browser for commands.

Configuration file: ~/.config/arkiv/config.toml
"#
    );
}

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Help,
    Version,
    Browse {
        resource: Resource,
        location: String,
        once: bool,
    },
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut resource = None;
    let mut location = String::new();
    let mut once = false;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" | "help" => return Ok(Cli::Help),
            "-V" | "--version" => return Ok(Cli::Version),
            "--once" => once = true,
            query if query.starts_with('?') => location = query.to_string(),
            name if resource.is_none() => {
                resource = Some(match name {
                    "users" => Resource::Users,
                    "stories" => Resource::Stories,
                    "history" => {
                        let uuid = iter
                            .next()
                            .filter(|u| !u.starts_with('?'))
                            .ok_or_else(|| "history needs a profile uuid".to_string())?;
                        Resource::UserHistory { uuid: uuid.clone() }
                    }
                    other => return Err(format!("Unknown list: {other}")),
                });
            }
            other => return Err(format!("Unexpected argument: {other}")),
        }
    }

    Ok(Cli::Browse {
        resource: resource.unwrap_or(Resource::Users),
        location,
        once,
    })
}

async fn browse<T>(
    config: &Config,
    client: ArchiveClient,
    resource: Resource,
    location: String,
    once: bool,
) -> Result<()>
where
    T: DeserializeOwned + ListItem + Clone + Send + Sync + 'static,
{
    let details = DetailCache::new(
        client.clone(),
        config.retry.to_retry_config(),
        config.cache.detail_capacity,
        config.cache.detail_ttl(),
    );
    let prefs = FileStore::new(Config::data_dir()?);

    let page_size = config.pagination.page_size(&resource);
    let endpoint: Endpoint<T> = Endpoint::new(client, resource.clone(), page_size);
    let fetcher = ListFetcher::new(endpoint, FetchConfig::from_config(config));
    let view = ListView::mount(fetcher, MemoryHistory::new(location))
        .with_pagination(config.pagination.clone());

    let browser = Browser::new(view, resource, details, prefs, config.ui.viewport);
    if once {
        browser.print_once().await
    } else {
        browser.run().await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let (resource, location, once) = match parse_args(&args) {
        Ok(Cli::Help) => {
            print_usage();
            return Ok(());
        }
        Ok(Cli::Version) => {
            println!("arkiv {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Ok(Cli::Browse {
            resource,
            location,
            once,
        }) => (resource, location, once),
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            std::process::exit(1);
        }
    };

    setup_logging();

    let config = Config::load()?;
    config.ensure_dirs()?;
    let client = ArchiveClient::new(&config.api)?;
    tracing::info!("Browsing {} from {}", resource.label(), client.base_url());

    match resource {
        Resource::Users => browse::<User>(&config, client, resource, location, once).await,
        Resource::Stories => browse::<Story>(&config, client, resource, location, once).await,
        Resource::UserHistory { .. } => {
            browse::<HistoryRecord>(&config, client, resource, location, once).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_is_users() {
        assert_eq!(
            parse_args(&[]),
            Ok(Cli::Browse {
                resource: Resource::Users,
                location: String::new(),
                once: false
            })
        );
    }

    #[test]
    fn test_list_and_query() {
        assert_eq!(
            parse_args(&args(&["stories", "?search=jane&page=2"])),
            Ok(Cli::Browse {
                resource: Resource::Stories,
                location: "?search=jane&page=2".into(),
                once: false
            })
        );
        assert_eq!(
            parse_args(&args(&["history", "a1"])),
            Ok(Cli::Browse {
                resource: Resource::UserHistory { uuid: "a1".into() },
                location: String::new(),
                once: false
            })
        );
    }

    #[test]
    fn test_once_flag() {
        assert_eq!(
            parse_args(&args(&["--once", "stories", "?page=3"])),
            Ok(Cli::Browse {
                resource: Resource::Stories,
                location: "?page=3".into(),
                once: true
            })
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_args(&args(&["history"])).is_err());
        assert!(parse_args(&args(&["history", "?page=2"])).is_err());
        assert!(parse_args(&args(&["posts"])).is_err());
        assert!(parse_args(&args(&["users", "stories"])).is_err());
        assert_eq!(parse_args(&args(&["users", "--help"])), Ok(Cli::Help));
        assert_eq!(parse_args(&args(&["-V"])), Ok(Cli::Version));
    }
}
