//! Push global configuration lines, or propose them in check mode.
//!
//! The operator is asked whether to run in check mode first. In check mode
//! the commands are only rendered to a `PROPOSED_CONFIG` file. Otherwise they
//! are pushed, the transcript is written next to it and the running
//! configuration is saved.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example add_global_config -- --host 10.0.0.1 --user admin \
//!     --password secret --file global.txt
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use netscribe::driver::ask_check_mode;
use netscribe::{ConsoleOperator, NetworkOs, Operator, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let operator: Arc<dyn Operator> = Arc::new(ConsoleOperator);

    let Some(check_mode) = ask_check_mode(operator.as_ref()).await else {
        println!("Cancelled.");
        return Ok(());
    };
    let file = match args.file {
        Some(file) => file,
        None => match operator.choose_file("Configuration lines", "*.txt").await {
            Some(file) => file,
            None => {
                println!("No configuration file chosen.");
                return Ok(());
            }
        },
    };
    let commands: Vec<String> = std::fs::read_to_string(&file)?
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty() && !l.starts_with('!'))
        .map(str::to_string)
        .collect();

    let mut builder = SessionBuilder::new(&args.host)
        .username(&args.user)
        .operator(operator);
    if let Some(password) = &args.password {
        builder = builder.password(password);
    }
    let mut session = builder.connect().await?;

    let outcome = session
        .run(|s| {
            async move {
                s.validate_os(&[NetworkOs::Ios, NetworkOs::IosXe, NetworkOs::NxOs])?;
                if check_mode {
                    let path = s.create_output_filename("PROPOSED_CONFIG", ".txt");
                    s.propose_config(&commands, &path)?;
                    println!("Proposed configuration written to {}", path.display());
                } else {
                    let path = s.create_output_filename("Config_Transcript", ".txt");
                    let transcript = s.send_config_commands(&commands, &path).await?;
                    println!(
                        "Applied {} commands; transcript in {}",
                        transcript.steps.len(),
                        path.display()
                    );
                    s.save().await?;
                }
                Ok(())
            }
            .boxed()
        })
        .await;

    session.disconnect().await?;
    outcome?;
    Ok(())
}

struct Args {
    host: String,
    user: String,
    password: Option<String>,
    file: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = None;
        let mut file = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if let Some(value) = args.get(i) {
                        host = value.clone();
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if let Some(value) = args.get(i) {
                        user = value.clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    password = args.get(i).cloned();
                }
                "--file" | "-f" => {
                    i += 1;
                    file = args.get(i).map(PathBuf::from);
                }
                "--help" => {
                    println!(
                        "USAGE: add_global_config --host <HOST> --user <USER> --password <PASS> [--file <LINES>]"
                    );
                    std::process::exit(0);
                }
                other => eprintln!("Unknown argument: {}", other),
            }
            i += 1;
        }

        Self {
            host,
            user,
            password,
            file,
        }
    }
}
