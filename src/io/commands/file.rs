use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, error, warn};

use super::{CommandSource, EngineCommand};

/// Commands appended one JSON object per line. The file is moved aside before it is read,
/// so lines appended while we read land in a fresh file and are picked up next time.
pub struct FileCommandSource {
    file: PathBuf,
    processing: PathBuf,
}

impl FileCommandSource {
    pub fn new(file: PathBuf) -> Self {
        let mut processing = file.clone().into_os_string();
        processing.push(".processing");
        Self {
            file,
            processing: PathBuf::from(processing),
        }
    }

    fn parse(contents: &str) -> Vec<EngineCommand> {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(command) => Some(command),
                Err(e) => {
                    warn!("Skipping malformed command {:?}: {}", line, e);
                    None
                }
            })
            .collect()
    }

    /// Claim the pending commands. A batch left behind by an earlier run is taken first.
    async fn claim(&self) -> std::io::Result<bool> {
        if tokio::fs::try_exists(&self.processing).await? {
            warn!("Found unprocessed commands in {:?}, applying them first", self.processing);
            return Ok(true);
        }
        match tokio::fs::rename(&self.file, &self.processing).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CommandSource for FileCommandSource {
    async fn take_commands(&self) -> Vec<EngineCommand> {
        match self.claim().await {
            Ok(true) => {}
            Ok(false) => return Vec::new(),
            Err(e) => {
                error!("Failed to claim commands from {:?}: {}", self.file, e);
                return Vec::new();
            }
        }
        let contents = match tokio::fs::read_to_string(&self.processing).await {
            Ok(contents) => contents,
            Err(e) => {
                error!("Failed to read commands from {:?}: {}", self.processing, e);
                return Vec::new();
            }
        };
        if let Err(e) = tokio::fs::remove_file(&self.processing).await {
            // Not consuming them would apply them again next time.
            error!("Failed to remove {:?}, ignoring its commands: {}", self.processing, e);
            return Vec::new();
        }
        let commands = Self::parse(&contents);
        debug!("Read {} commands from {:?}", commands.len(), self.file);
        commands
    }
}

#[cfg(test)]
mod test {
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::filtration::mode::PoolMode;

    #[tokio::test]
    async fn consumes_commands() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("commands.jsonl");
        tokio::fs::write(
            &path,
            "{\"command\": \"activate_boost\", \"duration\": \"2H\"}\nnonsense\n\n{\"command\": \"set_mode\", \"mode\": \"Standard\"}\n",
        )
        .await
        .unwrap();

        let source = FileCommandSource::new(path.clone());
        let commands = source.take_commands().await;
        assert_eq!(
            commands,
            vec![
                EngineCommand::ActivateBoost { duration: "2H".to_owned() },
                EngineCommand::SetMode { mode: Some(PoolMode::Standard) },
            ]
        );
        assert!(source.take_commands().await.is_empty(), "Commands should only be applied once");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn commands_appended_later_are_kept() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("commands.jsonl");
        let source = FileCommandSource::new(path.clone());

        tokio::fs::write(&path, "{\"command\": \"activate_boost\", \"duration\": \"4H\"}\n").await.unwrap();
        assert!(source.claim().await.unwrap());
        // The writer appends after the batch has been claimed but before it is read.
        let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await.unwrap();
        file.write_all(b"{\"command\": \"cancel_boost\"}\n").await.unwrap();
        drop(file);

        assert_eq!(
            source.take_commands().await,
            vec![EngineCommand::ActivateBoost { duration: "4H".to_owned() }]
        );
        assert_eq!(source.take_commands().await, vec![EngineCommand::CancelBoost]);
        assert!(source.take_commands().await.is_empty());
    }

    #[tokio::test]
    async fn missing_file_means_no_commands() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = FileCommandSource::new(dir.path().join("none.jsonl"));
        assert!(source.take_commands().await.is_empty());
    }
}
