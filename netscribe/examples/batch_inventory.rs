//! Collect `show version` from several devices at once.
//!
//! Each host gets its own session. Failures are appended to
//! `ScriptOutput/failures.txt` and do not stop the other hosts.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example batch_inventory -- --user admin --password secret \
//!     --parallel 4 10.0.0.1 10.0.0.2 10.0.0.3
//! ```

use std::env;
use std::path::PathBuf;

use futures_util::FutureExt;
use netscribe::{FailureLog, SessionBuilder, run_batch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let (user, password) = (args.user.clone(), args.password.clone());

    let results = run_batch(args.hosts.clone(), args.parallel, move |host: String| {
        let (user, password) = (user.clone(), password.clone());
        async move {
            let mut session = SessionBuilder::new(&host)
                .username(user)
                .password(password)
                .connect()
                .await?;
            let saved = session
                .run(|s| {
                    async move {
                        let path = s.create_output_filename("show version", ".txt");
                        s.write_output_to_file("show version", &path).await?;
                        Ok(path)
                    }
                    .boxed()
                })
                .await;
            session.disconnect().await?;
            saved
        }
    })
    .await;

    let failures = FailureLog::new(PathBuf::from("ScriptOutput").join("failures.txt"));
    for (host, result) in args.hosts.iter().zip(results) {
        match result {
            Ok(path) => println!("{host}: {}", path.display()),
            Err(e) => {
                eprintln!("{}", FailureLog::line(host, &e));
                failures.record(host, &e)?;
            }
        }
    }
    Ok(())
}

struct Args {
    user: String,
    password: String,
    parallel: usize,
    hosts: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = env::args().skip(1);
        let mut parsed = Self {
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            parallel: 4,
            hosts: Vec::new(),
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--user" | "-u" => parsed.user = args.next().unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = args.next().unwrap_or_default(),
                "--parallel" | "-n" => {
                    parsed.parallel = args.next().and_then(|v| v.parse().ok()).unwrap_or(4)
                }
                _ => parsed.hosts.push(arg),
            }
        }
        parsed
    }
}
