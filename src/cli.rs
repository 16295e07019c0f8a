use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "osdetect",
    about = "Active OS fingerprinting over ICMP, TCP, SMB, HTTP, SSH, DNS and NTP"
)]
pub struct Cli {
    /// Target IPv4 address
    #[arg(short = 't', long)]
    pub target: Option<String>,

    /// Verbose probe logging
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Print the detection report as JSON instead of a single line
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
