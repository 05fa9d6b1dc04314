use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Password, Select};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use packnow::common::config::{apply_overrides, load_config, AppConfig, ConfigOverrides};
use packnow::common::config_commands::{run_config_path, run_config_show};
use packnow::fetch::{FirstOf, StaticCredential, TerminalPrompt, TransferClient};
use packnow::output::{self, ConsoleObserver, ConsolePackProgress};
use packnow::pack::{archive_file_name, pack, RuleTemplate};
use packnow::server::{run_host, HostOptions};

// Clap reads this struct and creates CLI
#[derive(Parser)]
#[command(name = "packnow", version)]
#[command(about = "Pack everything, now. Host it, fetch it somewhere else.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    // with no subcommand, pack
    #[command(flatten)]
    pack: PackArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct PackArgs {
    #[arg(short, long, default_value = "./", help = "The directory to pack")]
    dir: PathBuf,

    #[arg(short, long, help = "Archive base name, without the extension")]
    name: Option<String>,

    #[arg(short, long, value_enum, help = "Ignore template; prompts when omitted")]
    template: Option<RuleTemplate>,

    #[arg(long, help = "Show ignored files and directories")]
    show_ignore: bool,

    #[arg(
        long = "dangerously-disable-uuid",
        help = "Name the archive exactly <name>.zip. WARNING: this could overwrite existing files"
    )]
    disable_uuid: bool,

    #[arg(long, help = "Where to write the archive (default: current directory)")]
    output_dir: Option<PathBuf>,

    #[arg(long, help = "Host the archive right after packing, without asking")]
    host_after: bool,

    #[arg(long, help = "Bind address when hosting after packing")]
    bind: Option<String>,

    #[arg(long, help = "Port when hosting after packing")]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a simple server to send the ZIP file to another place
    Host {
        #[arg(long, help = "Bind address (e.g. 0.0.0.0)")]
        host: Option<String>,

        #[arg(long, help = "Port (e.g. 8080)")]
        port: Option<u16>,

        #[arg(long, help = "The zipped file")]
        file: PathBuf,

        #[arg(long, default_value = "", help = "Password restricting access")]
        password: String,
    },

    /// Get a ZIP file from a packnow host and extract it
    Get {
        #[arg(long, help = "The URL to get")]
        url: String,

        #[arg(long, help = "Password, if the host asks for one (prompted otherwise)")]
        password: Option<String>,

        #[arg(long, help = "Where to extract (default: current directory)")]
        output_dir: Option<PathBuf>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective config after file and environment are merged
    Show,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            output::failure(&format!("{err:#}"));
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("packnow=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => run_pack(cli.pack).await,
        Some(Commands::Host {
            host,
            port,
            file,
            password,
        }) => {
            let config = resolved_config(ConfigOverrides {
                address: host,
                port,
                ..Default::default()
            })?;
            run_host(HostOptions {
                address: config.host.address.clone(),
                port: config.host.port,
                file,
                secret: Some(password),
                public_url: config.public_url().map(str::to_string),
            })
            .await
        }
        Some(Commands::Get {
            url,
            password,
            output_dir,
        }) => {
            let config = resolved_config(ConfigOverrides {
                fetch_dir: output_dir,
                ..Default::default()
            })?;
            run_get(&url, password, &config).await
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Path => run_config_path(),
            ConfigAction::Show => run_config_show(),
        },
    }
}

fn resolved_config(overrides: ConfigOverrides) -> Result<AppConfig> {
    apply_overrides(load_config()?, &overrides)
}

fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

async fn run_pack(args: PackArgs) -> Result<()> {
    let config = resolved_config(ConfigOverrides {
        name: args.name.clone(),
        template: args.template,
        address: args.bind.clone(),
        port: args.port,
        ..Default::default()
    })?;

    let unique = config.pack.unique && !args.disable_uuid;
    if !unique {
        output::warning("By disabling the UUID feature, existing files may be overwritten.");
    }

    let file_name = archive_file_name(&config.pack.name, unique);
    let destination = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(&file_name);

    let template = match args.template {
        Some(template) => template,
        None => choose_template(config.pack.template)?,
    };
    let show_ignore = args.show_ignore || config.pack.verbose;

    println!("{}", style(format!("... Packing into '{file_name}'")).dim());

    let tree_root = args.dir.clone();
    let archive = destination.clone();
    let report = tokio::task::spawn_blocking(move || {
        pack(
            &tree_root,
            &template.rules(),
            &archive,
            &ConsoleObserver { show: show_ignore },
            &ConsolePackProgress,
        )
    })
    .await
    .context("pack task failed")?
    .context("operation failed! (removed zip)")?;

    println!("\n✨ Done: {}", report.archive.display());
    println!(
        "{}",
        style(format!(
            "Zipped {} file(s) within {:.2}s",
            report.entries.len(),
            report.elapsed.as_secs_f64()
        ))
        .dim()
    );

    if !should_host_after(args.host_after)? {
        return Ok(());
    }

    let secret = if interactive() {
        Some(
            Password::new()
                .with_prompt("Assign password (leave blank to ignore)")
                .allow_empty_password(true)
                .interact()?,
        )
    } else {
        None
    };

    run_host(HostOptions {
        address: config.host.address.clone(),
        port: config.host.port,
        file: report.archive,
        secret,
        public_url: config.public_url().map(str::to_string),
    })
    .await
}

fn choose_template(fallback: RuleTemplate) -> Result<RuleTemplate> {
    if !interactive() {
        return Ok(fallback);
    }

    let names: Vec<&str> = RuleTemplate::ALL.iter().map(RuleTemplate::name).collect();
    let default = RuleTemplate::ALL
        .iter()
        .position(|t| *t == fallback)
        .unwrap_or(0);
    let index = Select::new()
        .with_prompt("Select a packignore template")
        .items(&names)
        .default(default)
        .interact()?;
    Ok(RuleTemplate::ALL[index])
}

fn should_host_after(forced: bool) -> Result<bool> {
    if forced {
        return Ok(true);
    }
    if !interactive() {
        return Ok(false);
    }
    Ok(Confirm::new()
        .with_prompt("Would you like to host a server?")
        .default(false)
        .interact()?)
}

async fn run_get(url: &str, password: Option<String>, config: &AppConfig) -> Result<()> {
    let client =
        TransferClient::new(&config.fetch.dir).with_progress(std::io::stderr().is_terminal());
    let credentials = FirstOf(StaticCredential(password), TerminalPrompt);

    let report = client
        .fetch(url, &credentials)
        .await
        .with_context(|| format!("packnow failed to fetch {url}"))?;

    println!(
        "{}extracted {} file(s) as {}",
        style("packnow ").green(),
        report.files,
        report.directory.display()
    );
    Ok(())
}
