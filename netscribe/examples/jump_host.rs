//! Reach a device through a jump host and run one command there.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example jump_host -- --jump 10.0.0.1 --target 10.20.0.5 \
//!     --user admin --password secret --command "show ip int brief"
//! ```

use std::env;

use netscribe::{Credentials, HopProtocol, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut session = SessionBuilder::new(&args.jump)
        .username(&args.user)
        .password(&args.password)
        .connect()
        .await?;
    session.start().await?;
    println!("On jump host {}", session.hostname().unwrap_or_default());

    let creds = Credentials::password(&args.user, &args.password);
    let outcome = async {
        let prompt = session.hop_via(&args.target, args.protocol, &creds).await?;
        println!("Reached {} through {}", prompt.hostname(), args.jump);
        let output = session.get_output(&args.command).await?;
        println!("{output}");
        session.unhop().await?;
        Ok::<_, netscribe::Error>(())
    }
    .await;

    if let Err(e) = session.end().await {
        eprintln!("Terminal restore failed: {e}");
    }
    session.disconnect().await?;
    outcome?;
    Ok(())
}

struct Args {
    jump: String,
    target: String,
    user: String,
    password: String,
    protocol: HopProtocol,
    command: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            jump: "localhost".to_string(),
            target: String::new(),
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            protocol: HopProtocol::Ssh,
            command: "show version".to_string(),
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned().unwrap_or_default();
            match args[i].as_str() {
                "--jump" | "-j" => parsed.jump = value,
                "--target" | "-t" => parsed.target = value,
                "--user" | "-u" => parsed.user = value,
                "--password" | "-P" => parsed.password = value,
                "--command" | "-c" => parsed.command = value,
                "--telnet" => {
                    parsed.protocol = HopProtocol::Telnet;
                    i -= 1;
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i -= 1;
                }
            }
            i += 2;
        }
        if parsed.target.is_empty() {
            eprintln!("Error: --target is required");
            std::process::exit(1);
        }
        parsed
    }
}
