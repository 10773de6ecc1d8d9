//! unveil - run a crawled page script in the browser sandbox
//!
//! Run with: cargo run --bin unveil -- --base-url URL SCRIPT
//!
//! Prints the final `document.cookie`, every request the script caused and
//! any uncaught exceptions. Exits non-zero if the sandbox halted the script.

mod logger;

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;
use unveil_js::{Evaluation, Sandbox, SandboxConfig};

/// unveil - evaluate page scripts against an emulated browser and report the
/// cookies they set
#[derive(Parser, Debug)]
#[command(name = "unveil")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Run a script saved from a page
    unveil --base-url https://example.com/ loader.js

    # Start from cookies the crawler already holds
    unveil -u https://example.com/ -c 'sid=abc; theme=dark' loader.js

    # Inline code, JSON output, debug logging
    unveil -u https://example.com/ -e "document.cookie = 'a=1'" --json -vv

    # Read the script from stdin with a 5 second request timeout
    curl -s https://example.com/loader.js | unveil -u https://example.com/ --timeout 5 -
"#)]
struct Cli {
    /// Script file to run, or `-` for stdin
    #[arg(value_name = "SCRIPT", required_unless_present = "eval", conflicts_with = "eval")]
    script: Option<PathBuf>,

    /// Run CODE instead of a script file
    #[arg(short = 'e', long = "eval", value_name = "CODE")]
    eval: Option<String>,

    /// URL the script is treated as loaded from
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: String,

    /// Cookies already held for the page, as `name=value; name=value`
    #[arg(short = 'c', long, value_name = "COOKIES", default_value = "")]
    cookies: String,

    /// Per-request timeout in seconds (default: wait indefinitely)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// User-Agent header, also exposed as `navigator.userAgent`
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Maximum iterations of any single loop
    #[arg(long, value_name = "N")]
    loop_limit: Option<u64>,

    /// Maximum call-stack depth
    #[arg(long, value_name = "N")]
    recursion_limit: Option<usize>,

    /// Disable TCP keep-alive
    #[arg(long)]
    no_keep_alive: bool,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Sandbox settings from the flags.
    fn config(&self) -> SandboxConfig {
        let mut config = SandboxConfig::default().with_keep_alive(!self.no_keep_alive);
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        if let Some(seconds) = self.timeout {
            config = config.with_timeout(Duration::from_secs(seconds));
        }
        if let Some(limit) = self.loop_limit {
            config = config.with_loop_iteration_limit(limit);
        }
        if let Some(limit) = self.recursion_limit {
            config = config.with_recursion_limit(limit);
        }
        config
    }

    /// The script text, from `-e`, a file or stdin.
    fn source(&self) -> anyhow::Result<String> {
        if let Some(code) = &self.eval {
            return Ok(code.clone());
        }
        match &self.script {
            Some(path) if path.as_os_str() == "-" => {
                let mut source = String::new();
                let _ = io::stdin()
                    .read_to_string(&mut source)
                    .context("failed to read script from stdin")?;
                Ok(source)
            }
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            None => anyhow::bail!("no script given, pass a file or -e CODE"),
        }
    }
}

/// Machine-readable result of one run.
#[derive(Debug, Serialize)]
struct Report<'a> {
    base_url: &'a str,
    cookies: &'a str,
    requests: Vec<RequestEntry<'a>>,
    exceptions: &'a [String],
}

#[derive(Debug, Serialize)]
struct RequestEntry<'a> {
    method: String,
    url: &'a str,
    status: u16,
}

impl<'a> Report<'a> {
    fn new(base_url: &'a str, evaluation: &'a Evaluation) -> Self {
        Self {
            base_url,
            cookies: &evaluation.cookies,
            requests: evaluation
                .requests
                .iter()
                .map(|request| RequestEntry {
                    method: request.method.to_string(),
                    url: &request.url,
                    status: request.status,
                })
                .collect(),
            exceptions: &evaluation.exceptions,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let color = io::stdout().is_terminal();
    logger::init(cli.verbose, io::stderr().is_terminal());

    let script = cli.source()?;
    let mut sandbox = Sandbox::new(cli.config())?;
    // Exceptions are part of the report below.
    sandbox.set_exception_handler(|report| log::debug!(target: "unveil::script", "{report}"));

    let evaluation = sandbox
        .evaluate_detailed(&cli.base_url, &script, &cli.cookies)
        .with_context(|| format!("script for {} was halted", cli.base_url))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&Report::new(&cli.base_url, &evaluation))?
        );
    } else {
        print_report(&evaluation, color);
    }
    Ok(())
}

/// Print the evaluation for a human (text mode).
fn print_report(evaluation: &Evaluation, color: bool) {
    let heading = |text: &str| {
        if color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    };

    println!("{} {}", heading("cookies:"), evaluation.cookies);

    if !evaluation.requests.is_empty() {
        println!("\n{}", heading("requests:"));
        for request in &evaluation.requests {
            let status = request.status.to_string();
            let status = match (color, request.status) {
                (false, _) => status,
                (true, 0) => status.red().to_string(),
                (true, 200..=399) => status.green().to_string(),
                (true, _) => status.yellow().to_string(),
            };
            println!("  {} {} -> {status}", request.method, request.url);
        }
    }

    if !evaluation.exceptions.is_empty() {
        println!("\n{}", heading("uncaught exceptions:"));
        for exception in &evaluation.exceptions {
            if color {
                println!("  {}", exception.yellow());
            } else {
                println!("  {exception}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unveil_js::RequestRecord;
    use unveil_net::Method;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("unveil").chain(args.iter().copied()))
    }

    #[test]
    fn test_eval_and_script_conflict() {
        assert!(parse(&["-u", "https://a.test/", "-e", "1", "file.js"]).is_err());
    }

    #[test]
    fn test_script_or_eval_required() {
        assert!(parse(&["-u", "https://a.test/"]).is_err());
    }

    #[test]
    fn test_base_url_required() {
        assert!(parse(&["-e", "1"]).is_err());
    }

    #[test]
    fn test_eval_source() {
        let cli = parse(&["-u", "https://a.test/", "-e", "document.cookie = 'a=1'"]).unwrap();
        assert_eq!(cli.source().unwrap(), "document.cookie = 'a=1'");
        assert_eq!(cli.cookies, "");
    }

    #[test]
    fn test_flags_map_onto_config() {
        let cli = parse(&[
            "-u",
            "https://a.test/",
            "-e",
            "1",
            "--timeout",
            "5",
            "--user-agent",
            "probe/1.0",
            "--loop-limit",
            "100",
            "--recursion-limit",
            "50",
            "--no-keep-alive",
            "-vv",
        ])
        .unwrap();
        let config = cli.config();

        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.user_agent, "probe/1.0");
        assert_eq!(config.loop_iteration_limit, Some(100));
        assert_eq!(config.recursion_limit, Some(50));
        assert!(!config.keep_alive);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_defaults_match_sandbox_defaults() {
        let cli = parse(&["-u", "https://a.test/", "-e", "1"]).unwrap();
        assert_eq!(cli.config(), SandboxConfig::default());
    }

    #[test]
    fn test_json_report_shape() {
        let evaluation = Evaluation {
            cookies: "a=1; b=2".to_string(),
            exceptions: vec!["Error: boom".to_string()],
            requests: vec![RequestRecord {
                method: Method::Post,
                url: "https://a.test/api".to_string(),
                status: 201,
            }],
        };
        let value = serde_json::to_value(Report::new("https://a.test/", &evaluation)).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "base_url": "https://a.test/",
                "cookies": "a=1; b=2",
                "requests": [{ "method": "POST", "url": "https://a.test/api", "status": 201 }],
                "exceptions": ["Error: boom"],
            })
        );
    }
}
