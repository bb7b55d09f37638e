use std::path::PathBuf;

use clap::Parser;

/// Command-line surface of the server, parsed with `clap`'s derive API.
///
/// `--replicaof` accepts the two-token "HOST PORT" form as a single
/// argument (`--replicaof "localhost 6380"`), matching how the reference
/// implementation is invoked by the test harness.
#[derive(Parser, Debug)]
#[command(version, about = "A Redis-compatible key-value server", long_about = None)]
pub struct Cli {
    /// Directory the RDB file is read from (and would be written to).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Name of the RDB file within `--dir`.
    #[arg(long)]
    pub dbfilename: Option<String>,

    /// Port to listen on.
    #[arg(long, default_value_t = 6379)]
    pub port: u16,

    /// "HOST PORT" of the master to replicate from, e.g. `--replicaof "localhost 6379"`.
    #[arg(long)]
    pub replicaof: Option<String>,
}

/// Immutable runtime configuration shared via `Arc` across every connection task.
#[derive(Debug, Clone)]
pub struct Config {
    pub dir: Option<PathBuf>,
    pub dbfilename: Option<String>,
    pub port: u16,
    pub replicaof: Option<(String, u16)>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let replicaof = match cli.replicaof {
            Some(raw) => Some(parse_replicaof(&raw)?),
            None => None,
        };

        Ok(Config {
            dir: cli.dir,
            dbfilename: cli.dbfilename,
            port: cli.port,
            replicaof,
        })
    }

    /// Full path to the configured RDB file, if both `dir` and `dbfilename` are set.
    pub fn rdb_path(&self) -> Option<PathBuf> {
        match (&self.dir, &self.dbfilename) {
            (Some(dir), Some(name)) => Some(dir.join(name)),
            _ => None,
        }
    }

    pub fn is_replica(&self) -> bool {
        self.replicaof.is_some()
    }
}

fn parse_replicaof(raw: &str) -> anyhow::Result<(String, u16)> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let [host, port] = tokens.as_slice() else {
        anyhow::bail!("--replicaof expects \"HOST PORT\", got: {raw:?}");
    };
    let port: u16 = port
        .parse()
        .map_err(|_| anyhow::anyhow!("--replicaof port is not a valid u16: {port:?}"))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replicaof() {
        let (host, port) = parse_replicaof("localhost 6380").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 6380);
    }

    #[test]
    fn rejects_malformed_replicaof() {
        assert!(parse_replicaof("localhost").is_err());
        assert!(parse_replicaof("localhost six").is_err());
    }

    #[test]
    fn default_port_is_6379() {
        let cli = Cli::parse_from(["rustis-server"]);
        assert_eq!(cli.port, 6379);
    }
}
