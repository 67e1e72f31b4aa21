//! Capture one command's output to a file.
//!
//! Connects, prepares the session (enable, OS check, terminal), writes the
//! output of `--command` to `ScriptOutput/<hostname>-<desc>-<date>.txt`,
//! restores the terminal and disconnects.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example save_output -- --host 10.0.0.1 --user admin --password secret \
//!     --command "show running-config"
//! ```

use std::env;
use std::sync::Arc;

use futures_util::FutureExt;
use netscribe::{ConnectMethod, ConsoleOperator, NetworkOs, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut builder = SessionBuilder::new(&args.host)
        .username(&args.user)
        .method(args.method)
        .operator(Arc::new(ConsoleOperator));
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(password) = &args.password {
        builder = builder.password(password);
    }
    if let Some(secret) = &args.enable {
        builder = builder.enable_secret(secret);
    }

    println!("Connecting to {}...", args.host);
    let mut session = builder.connect().await?;

    let command = args.command.clone();
    let desc = args.desc.clone().unwrap_or_else(|| command.clone());
    let captured = session
        .run(|s| {
            async move {
                s.validate_os(&[NetworkOs::Ios, NetworkOs::IosXe, NetworkOs::NxOs, NetworkOs::Asa])?;
                let path = s.create_output_filename(&desc, ".txt");
                s.write_output_to_file(&command, &path).await?;
                Ok(path)
            }
            .boxed()
        })
        .await;

    session.disconnect().await?;
    let path = captured?;
    println!("Output written to {}", path.display());
    Ok(())
}

struct Args {
    host: String,
    port: Option<u16>,
    user: String,
    password: Option<String>,
    enable: Option<String>,
    method: ConnectMethod,
    command: String,
    desc: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: None,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: None,
            enable: None,
            method: ConnectMethod::BestSsh,
            command: "show running-config".to_string(),
            desc: None,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => parsed.port = value.and_then(|v| v.parse().ok()),
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--enable" | "-e" => parsed.enable = value,
                "--command" | "-c" => parsed.command = value.unwrap_or(parsed.command),
                "--desc" | "-d" => parsed.desc = value,
                "--telnet" => {
                    parsed.method = ConnectMethod::Telnet;
                    i -= 1;
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i -= 1;
                }
            }
            i += 2;
        }
        parsed
    }

    fn print_help() {
        println!(
            r#"netscribe save_output example

USAGE:
    cargo run --example save_output -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        Port [default: protocol default]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password
    -e, --enable <SECRET>    Enable secret (asked on the console if needed)
    -c, --command <CMD>      Command to capture [default: show running-config]
    -d, --desc <TEXT>        File name description [default: the command]
    --telnet                 Connect with Telnet instead of SSH
    --help                   Print this help message"#
        );
    }
}
