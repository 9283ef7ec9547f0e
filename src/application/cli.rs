use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::HostName;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

pub fn log_path() -> path::PathBuf {
    return dirs::cache_dir()
        .unwrap_or_else(|| return path::PathBuf::from("."))
        .join("cursor-relay/debug.log");
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for the relay agent")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running with environment variable RUST_LOG=cursor_relay")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn subcommand_run() -> Command {
    return Command::new("run")
        .about("Attach to the host and relay its conversation. This is the default when no subcommand is given.");
}

/// Config backed argument, settable from the command line, the environment or the config
/// file.
fn arg_config(key: ConfigKey, env: &'static str, help: &str) -> Arg {
    let mut help = help.to_string();
    let default = Config::default(key);
    if !default.is_empty() {
        help = format!("{help} [default: {default}]");
    }

    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(help)
        .global(true);
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("cursor-relay")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(false)
        .subcommand(subcommand_run())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .subcommand(Command::new("manpages").about("Generates manpages and outputs to stdout."))
        .arg(
            arg_config(
                ConfigKey::ConfigFile,
                "CURSOR_RELAY_CONFIG_FILE",
                "Path to configuration file",
            )
            .short('c'),
        )
        .arg(
            arg_config(
                ConfigKey::DevtoolsURL,
                "CURSOR_RELAY_DEVTOOLS_URL",
                "DevTools endpoint of the host when using the chrome host.",
            ),
        )
        .arg(
            arg_config(
                ConfigKey::Enabled,
                "CURSOR_RELAY_ENABLED",
                "Connect to the relay server. When disabled the agent only observes the host.",
            )
            .value_parser(PossibleValuesParser::new(["true", "false"])),
        )
        .arg(
            arg_config(ConfigKey::Host, "CURSOR_RELAY_HOST", "The host application to attach to.")
                .short('H')
                .value_parser(PossibleValuesParser::new(HostName::VARIANTS)),
        )
        .arg(arg_config(
            ConfigKey::MirrorInterval,
            "CURSOR_RELAY_MIRROR_INTERVAL",
            "Time in milliseconds between snapshots of the host page when using the chrome host.",
        ))
        .arg(arg_config(
            ConfigKey::PageMatch,
            "CURSOR_RELAY_PAGE_MATCH",
            "Part of the URL of the page to attach to when using the chrome host.",
        ))
        .arg(arg_config(
            ConfigKey::PollInterval,
            "CURSOR_RELAY_POLL_INTERVAL",
            "Time in milliseconds between completion checks of a streaming message.",
        ))
        .arg(arg_config(
            ConfigKey::PromptTimeout,
            "CURSOR_RELAY_PROMPT_TIMEOUT",
            "Time in milliseconds to wait for the answer to a relayed prompt.",
        ))
        .arg(arg_config(
            ConfigKey::ReconnectDelay,
            "CURSOR_RELAY_RECONNECT_DELAY",
            "Time in milliseconds to wait before reconnecting to the relay server.",
        ))
        .arg(arg_config(
            ConfigKey::ServerURL,
            "CURSOR_RELAY_SERVER_URL",
            "Relay server base URL.",
        ))
        .arg(
            arg_config(
                ConfigKey::SessionID,
                "CURSOR_RELAY_SESSION_ID",
                "Session the agent joins on the relay server.",
            )
            .short('i'),
        )
        .arg(arg_config(
            ConfigKey::SettleDelay,
            "CURSOR_RELAY_SETTLE_DELAY",
            "Time in milliseconds between editing the prompt input and submitting it.",
        ))
        .arg(arg_config(
            ConfigKey::StabilityThreshold,
            "CURSOR_RELAY_STABILITY_THRESHOLD",
            "Consecutive unchanged completion checks before a message is final.",
        ));
}

pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    println!("{}", log_path().to_string_lossy());
                }
                Some(("enum-config", _)) => {
                    let res = ConfigKey::VARIANTS.join("\n");
                    println!("{}", res);
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(false);
        }
        Some(("run", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("manpages", _)) => {
            clap_mangen::Man::new(build()).render(&mut io::stdout())?;
            return Ok(false);
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(true);
}
