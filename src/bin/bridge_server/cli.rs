use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Log level, defaults to [`tracing::Level::Info`]
    #[arg(default_value_t = tracing::Level::INFO, long, global = true)]
    pub log_level: tracing::Level,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Serve blocks and proofs from a data directory
    Serve(ServeArgs),
    /// Write a synthetic chain, with proofs, to a data directory
    Generate(GenerateArgs),
}

#[derive(Clone, Debug, Args)]
pub struct ServeArgs {
    /// Directory holding `<height>.blk` and `<height>.proof` files
    #[arg(short, long)]
    pub datadir: PathBuf,
    /// Address to listen on, defaults to 0.0.0.0:8338
    #[arg(short, long)]
    pub listen_addr: Option<String>,
    /// Last height to serve. If not given, every contiguous height in the data directory is
    /// served
    #[arg(long)]
    pub max_height: Option<i32>,
    /// How long to wait for connections to finish when exiting
    #[arg(default_value_t = 2, long)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct GenerateArgs {
    /// Directory to write blocks to, created if it doesn't exist
    #[arg(short, long)]
    pub datadir: PathBuf,
    /// Number of blocks to generate
    #[arg(default_value_t = 100, long)]
    pub blocks: u32,
    /// Leaves created by each block
    #[arg(default_value_t = 8, long)]
    pub adds_per_block: u32,
    /// Mask applied to random leaf lifetimes, in blocks
    #[arg(default_value_t = 0x07, long)]
    pub duration_mask: u32,
    #[arg(default_value_t = 0, long)]
    pub seed: u64,
}

#[derive(Clone, Debug)]
pub enum Mode {
    Serve {
        datadir: PathBuf,
        listen_addr: SocketAddr,
        max_height: Option<i32>,
        shutdown_timeout: Duration,
    },
    Generate {
        datadir: PathBuf,
        blocks: u32,
        adds_per_block: u32,
        duration_mask: u32,
        seed: u64,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: tracing::Level,
    pub mode: Mode,
}

impl Cli {
    pub fn get_config(self) -> anyhow::Result<Config> {
        let mode = match self.command {
            Command::Serve(args) => {
                const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8338";
                let listen_addr: SocketAddr = args
                    .listen_addr
                    .unwrap_or(DEFAULT_LISTEN_ADDR.to_string())
                    .parse()?;
                Mode::Serve {
                    datadir: args.datadir,
                    listen_addr,
                    max_height: args.max_height,
                    shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
                }
            }
            Command::Generate(args) => Mode::Generate {
                datadir: args.datadir,
                blocks: args.blocks,
                adds_per_block: args.adds_per_block,
                duration_mask: args.duration_mask,
                seed: args.seed,
            },
        };

        Ok(Config {
            log_level: self.log_level,
            mode,
        })
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::Cli;
    use super::Mode;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["bridge_server", "serve", "--datadir", "/tmp/blocks"]);
        let config = cli.get_config().unwrap();

        assert_eq!(config.log_level, tracing::Level::INFO);
        match config.mode {
            Mode::Serve {
                listen_addr,
                max_height,
                shutdown_timeout,
                ..
            } => {
                assert_eq!(listen_addr.to_string(), "0.0.0.0:8338");
                assert_eq!(max_height, None);
                assert_eq!(shutdown_timeout.as_secs(), 2);
            }
            Mode::Generate { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn test_bad_listen_addr() {
        let cli = Cli::parse_from([
            "bridge_server",
            "serve",
            "--datadir",
            "/tmp/blocks",
            "--listen-addr",
            "nowhere",
        ]);
        assert!(cli.get_config().is_err());
    }
}
