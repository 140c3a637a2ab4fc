//! Replay command implementation.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tripsync_replication::{
    CollectionId, Credentials, ReplicationSupervisor, ReplicatorConfig, ScriptedTransport,
    StatusSnapshot, TransportEvent,
};

/// Options for the replay command.
#[derive(Debug)]
pub struct ReplayOptions {
    /// Remote endpoint URL.
    pub endpoint: String,
    /// Collections to replicate.
    pub collections: Vec<String>,
    /// Basic-auth user name.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Event script path.
    pub script: PathBuf,
    /// Pause before each event, in milliseconds.
    pub delay_ms: u64,
    /// Output format (text, json).
    pub format: String,
}

/// One line of JSON output.
#[derive(Debug, Serialize)]
struct StatusLine<'a> {
    status: String,
    #[serde(flatten)]
    snapshot: &'a StatusSnapshot,
}

/// Loads a JSON array of transport events.
pub fn load_script(path: &Path) -> Result<Vec<TransportEvent>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read script {:?}: {}", path, e))?;
    let events = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid event script {:?}: {}", path, e))?;
    Ok(events)
}

/// Builds the replicator configuration from command-line options.
pub fn build_config(options: &ReplayOptions) -> Result<ReplicatorConfig, Box<dyn std::error::Error>> {
    let collections = options
        .collections
        .iter()
        .map(|name| name.parse::<CollectionId>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut config = ReplicatorConfig::new(options.endpoint.clone()).with_collections(collections);
    if let Some(username) = &options.username {
        config = config.with_credentials(Credentials::basic(
            username.clone(),
            options.password.clone().unwrap_or_default(),
        ));
    }
    Ok(config)
}

/// Formats a snapshot for output.
pub fn format_snapshot(
    snapshot: &StatusSnapshot,
    format: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        "text" => Ok(snapshot.render()),
        "json" => Ok(serde_json::to_string(&StatusLine {
            status: snapshot.render(),
            snapshot,
        })?),
        other => Err(format!("Unknown output format: {}", other).into()),
    }
}

/// Runs the replay command.
///
/// Prints every snapshot until the whole script has been delivered or the
/// user interrupts, then stops the session.
pub async fn run(options: ReplayOptions) -> Result<(), Box<dyn std::error::Error>> {
    // Reject a bad format before anything starts.
    format_snapshot(&StatusSnapshot::stopped(), &options.format)?;

    let events = load_script(&options.script)?;
    let config = build_config(&options)?;
    info!("Replaying {} events from {:?}", events.len(), options.script);

    // The initial snapshot and the start transition precede the script.
    let expected = events.len() + 2;
    let transport =
        ScriptedTransport::new(events).with_delay(Duration::from_millis(options.delay_ms));
    let supervisor = ReplicationSupervisor::new(transport);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    supervisor.on_status_change(move |snapshot| {
        let _ = tx.send(snapshot.clone());
    });
    let session = supervisor.start(&config)?;
    info!("Started session {}", session);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut received = 0;
    while received < expected {
        tokio::select! {
            snapshot = rx.recv() => {
                let Some(snapshot) = snapshot else { break };
                println!("{}", format_snapshot(&snapshot, &options.format)?);
                received += 1;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted; stopping replication");
                break;
            }
        }
    }

    supervisor.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tripsync_replication::ActivityPhase;

    fn options(script: PathBuf) -> ReplayOptions {
        ReplayOptions {
            endpoint: "wss://example/endpoint".into(),
            collections: vec!["mainscope.users".into(), "mainscope.shared".into()],
            username: Some("alice".into()),
            password: None,
            script,
            delay_ms: 0,
            format: "text".into(),
        }
    }

    #[test]
    fn load_script_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"progress": {{"completed": 0, "total": 10}}, "activity": "connecting"}},
                {{"error": {{"kind": "auth", "message": "unauthorized"}}}}
            ]"#
        )
        .unwrap();

        let events = load_script(file.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].activity, ActivityPhase::Connecting);
        assert!(events[1].error.is_some());
    }

    #[test]
    fn load_script_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(load_script(file.path()).is_err());
    }

    #[test]
    fn build_config_from_options() {
        let config = build_config(&options(PathBuf::from("unused.json"))).unwrap();
        assert_eq!(config.collections.len(), 2);
        assert_eq!(
            config.credentials.as_ref().and_then(|c| c.username()),
            Some("alice")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn format_snapshot_variants() {
        let snapshot = StatusSnapshot::stopped();
        assert_eq!(format_snapshot(&snapshot, "text").unwrap(), "Not synced");

        let json: serde_json::Value =
            serde_json::from_str(&format_snapshot(&snapshot, "json").unwrap()).unwrap();
        assert_eq!(json["status"], "Not synced");
        assert_eq!(json["phase"], "stopped");
        assert_eq!(json["total"], 0);

        assert!(format_snapshot(&snapshot, "yaml").is_err());
    }

    #[tokio::test]
    async fn replay_runs_to_completion() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"progress": {{"completed": 5, "total": 10}}, "activity": "busy"}},
                {{"progress": {{"completed": 10, "total": 10}}, "activity": "idle"}}
            ]"#
        )
        .unwrap();

        run(options(file.path().to_path_buf())).await.unwrap();
    }
}
