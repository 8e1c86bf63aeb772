//! Line-based terminal input shared by the REPL and the agent's prompts.
//!
//! One task reads stdin and forwards lines over a channel. Every reader
//! (the REPL prompt, a confirmation, a free-text reply) takes the
//! receiver's lock for the duration of its prompt, so exactly one line
//! answers exactly one prompt.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use codeclaw_core::error::HumanIoError;
use codeclaw_core::human::HumanIo;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;

type LineResult = Result<String, std::io::Error>;

/// Set once on Ctrl-C; observed by every pending prompt.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// A receiver that reads `true` once shutdown has been triggered.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|&triggered| triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Console {
    lines: Mutex<mpsc::Receiver<LineResult>>,
    shutdown: Shutdown,
}

impl Console {
    /// Start reading stdin in the background.
    pub fn spawn(shutdown: Shutdown) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(Ok(line)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        Self::from_receiver(rx, shutdown)
    }

    pub fn from_receiver(lines: mpsc::Receiver<LineResult>, shutdown: Shutdown) -> Self {
        Self {
            lines: Mutex::new(lines),
            shutdown,
        }
    }

    /// Print `prompt` and wait for the next line.
    ///
    /// Lines typed before the prompt appeared are discarded so type-ahead
    /// cannot answer a question the user has not seen. `Ok(None)` means
    /// end of input or shutdown.
    pub async fn read_line(&self, prompt: &str) -> Result<Option<String>, HumanIoError> {
        let mut lines = self.lines.lock().await;

        let mut discarded = 0;
        while lines.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "Dropped type-ahead input");
        }

        print!("{prompt}");
        std::io::stdout().flush().map_err(|e| HumanIoError::Io(e.to_string()))?;

        tokio::select! {
            line = lines.recv() => match line {
                Some(Ok(line)) => Ok(Some(line)),
                Some(Err(e)) => Err(HumanIoError::Io(e.to_string())),
                None => Ok(None),
            },
            () = self.shutdown.wait() => {
                println!();
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl HumanIo for Console {
    async fn ask(&self, prompt: &str) -> Result<Option<String>, HumanIoError> {
        let line = self.read_line(prompt).await?.ok_or(HumanIoError::Closed)?;
        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}
