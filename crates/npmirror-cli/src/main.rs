use std::{env, fs};

use clap::Parser;
use cli::{Args, Commands};
use error::{CliError, CliResult, ErrorContext};
use npmirror_config::{
    config::{self, config_path, generate_default_config, get_config, set_config_path},
    error::ConfigError,
};
use npmirror_dl::http_client::configure_http_client;
use npmirror_registry::relative_path;
use npmirror_utils::path::resolve_path;
use sync::{plan_remote, sync_remote, SyncArgs};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};
use utils::{parse_header, COLOR, PROGRESS};

mod cli;
mod error;
mod logging;
mod progress;
mod store;
mod sync;
mod utils;

fn parse_headers(headers: &[String]) -> CliResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for header in headers {
        let invalid = || CliError::InvalidHeader(header.clone());
        let (key, value) = parse_header(header).ok_or_else(invalid)?;
        let key = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.append(key, value);
    }
    Ok(map)
}

fn configure_client(args: &Args) -> CliResult<()> {
    let proxy = args
        .proxy
        .as_deref()
        .map(|proxy| Proxy::new(proxy).map_err(|_| CliError::InvalidProxy(proxy.to_string())))
        .transpose()?;
    let headers = args.header.as_deref().map(parse_headers).transpose()?;
    let user_agent = args.user_agent.clone();

    configure_http_client(|config| {
        if proxy.is_some() {
            config.proxy = proxy;
        }
        if user_agent.is_some() {
            config.user_agent = user_agent;
        }
        if headers.is_some() {
            config.headers = headers;
        }
    });
    Ok(())
}

fn print_config() -> CliResult<()> {
    let path = config_path();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file {} not found", path.display());
            toml::to_string_pretty(&get_config()).map_err(ConfigError::from)?
        }
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    info!("{}", content.trim_end());
    Ok(())
}

fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current package");
            cancel.cancel();
        }
    });
}

async fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    logging::setup_logging(&args);

    if args.no_color {
        *COLOR.write().unwrap() = false;
    }

    if args.no_progress || args.quiet {
        *PROGRESS.write().unwrap() = false;
    }

    if let Some(ref c) = args.config {
        let path = resolve_path(c)?;
        let path = if path.is_absolute() {
            path
        } else {
            env::current_dir()
                .with_context(|| "retrieving current directory".into())?
                .join(path)
        };
        set_config_path(path);
    }

    configure_client(&args)?;

    match args.command {
        Commands::DefConfig => {
            generate_default_config()?;
        }
        command => {
            config::init()?;

            let cancel = CancellationToken::new();
            shutdown_on_ctrl_c(cancel.clone());

            match command {
                Commands::Sync {
                    selection,
                    policy,
                    mirror,
                    probe,
                    store,
                } => {
                    let sync_args = SyncArgs {
                        selection,
                        policy,
                        mirror,
                        probe,
                        store,
                    };
                    sync_remote(sync_args, cancel, args.json).await?;
                }
                Commands::Plan {
                    selection,
                } => plan_remote(selection, cancel, args.json).await?,
                Commands::Path {
                    name,
                    version,
                } => println!("{}", relative_path(&name, &version)),
                Commands::Config => print_config()?,
                Commands::DefConfig => unreachable!(),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
