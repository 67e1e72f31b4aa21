//! Running independent sessions against many devices.

use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, warn};
use tokio::sync::Semaphore;

use crate::error::{Error, InteractionError, Result};

/// Run `work` once per device, at most `concurrency` at a time.
///
/// Each call owns its own session; nothing is shared between them. Results
/// come back in the order of `devices`. A panicking task is resumed on the
/// caller.
pub async fn run_batch<D, T, F, Fut>(devices: Vec<D>, concurrency: usize, work: F) -> Vec<Result<T>>
where
    D: Send + 'static,
    T: Send + 'static,
    F: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let work = Arc::new(work);

    let tasks: Vec<_> = devices
        .into_iter()
        .map(|device| {
            let semaphore = Arc::clone(&semaphore);
            let work = Arc::clone(&work);
            tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!("Batch semaphore closed: {}", e);
                        return Err(InteractionError::SessionFailed.into());
                    }
                };
                work(device).await
            })
        })
        .collect();

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!("Batch task cancelled: {}", e);
                Err(InteractionError::SessionFailed.into())
            }
        })
        .collect()
}

/// Appends one line per failed device, categorised by error kind.
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The line written for `host` failing with `error`.
    pub fn line(host: &str, error: &Error) -> String {
        match error {
            Error::Connect(_) => format!("Connect to {host} failed: {error}"),
            Error::UnsupportedOs(_) => format!("Unsupported OS on {host}: {error}"),
            _ => format!("Failure on {host}: {error}"),
        }
    }

    pub fn record(&self, host: &str, error: &Error) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::output(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::output(&self.path, e))?;
        writeln!(file, "{}", Self::line(host, error)).map_err(|e| Error::output(&self.path, e))?;
        debug!("Recorded failure for {} in {}", host, self.path.display());
        Ok(())
    }
}
