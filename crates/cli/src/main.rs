use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "masala")]
#[command(about = "Masala: Discord relay bot backed by Gemini", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default config file (no secrets; use DISCORD_TOKEN and GEMINI_API_KEY for those).
    Init {
        /// Config file path (default: MASALA_CONFIG_PATH or ~/.masala/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the bot: keep-alive server plus the Discord connection.
    Run {
        /// Config file path (default: MASALA_CONFIG_PATH or ~/.masala/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Keep-alive port (default from PORT, then config, then 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one prompt through the reply pipeline and print the reply (fallback included).
    Ask {
        /// Config file path (default: MASALA_CONFIG_PATH or ~/.masala/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Prompt text; empty uses the configured default prompt.
        prompt: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("masala {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, port }) => {
            if let Err(e) = run_bot(config, port).await {
                log::error!("bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, prompt }) => {
            if let Err(e) = run_ask(config, prompt).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(masala::config::default_config_path);
    let (_dir, written) = masala::init::init_config_dir(&path)?;
    if written {
        println!("wrote default config to {}", path.display());
    } else {
        println!("config already exists at {}", path.display());
    }
    Ok(())
}

async fn run_bot(config_path: Option<std::path::PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (config, path) = masala::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    masala::relay::run_relay(config, port).await
}

async fn run_ask(config_path: Option<std::path::PathBuf>, prompt: Vec<String>) -> anyhow::Result<()> {
    let (config, _) = masala::config::load_config(config_path)?;
    let pipeline = masala::pipeline::ReplyPipeline::from_config(&config)?;
    let prompt = prompt.join(" ");
    let prompt = if prompt.trim().is_empty() {
        pipeline.trigger().default_prompt().to_string()
    } else {
        prompt.trim().to_string()
    };
    let reply = pipeline.reply(&prompt).await;
    if reply.is_fallback() {
        log::info!("reply is a fallback");
    }
    println!("{}", reply.text);
    Ok(())
}
