use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(long, default_value = "all")]
    pub mode: Mode,
    /// Build the manifest snapshot before serving requests.
    #[arg(long, default_value_t = false)]
    pub preload: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    All,
    Api,
    Worker,
}

impl Mode {
    pub fn run_api(self) -> bool {
        matches!(self, Mode::All | Mode::Api)
    }

    pub fn run_worker(self) -> bool {
        matches!(self, Mode::All | Mode::Worker)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Mode};

    #[test]
    fn defaults_to_all_without_preload() {
        let cli = Cli::parse_from(["d2builds"]);
        assert!(cli.mode.run_api());
        assert!(cli.mode.run_worker());
        assert!(!cli.preload);
    }

    #[test]
    fn api_mode_skips_worker() {
        let cli = Cli::parse_from(["d2builds", "--mode", "api", "--preload"]);
        assert!(matches!(cli.mode, Mode::Api));
        assert!(!cli.mode.run_worker());
        assert!(cli.preload);
    }
}
