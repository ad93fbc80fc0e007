//! Linux link driver backed by interface operstate
//!
//! Link state comes from polling `/sys/class/net/<iface>/operstate`.
//! Association is delegated to an optional external command (for example
//! `nmcli device wifi connect {ssid} password {password}`); without one the
//! link is assumed to be managed by the OS and association is a no-op.

use super::{Credentials, LinkDriver, LinkError, LinkEvent};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const DEFAULT_NET_ROOT: &str = "/sys/class/net";

pub struct SysfsLink {
    interface: String,
    net_root: PathBuf,
    poll_interval: Duration,
    associate_command: Option<Vec<String>>,
    poller: Option<JoinHandle<()>>,
}

impl SysfsLink {
    pub fn new(interface: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            interface: interface.into(),
            net_root: PathBuf::from(DEFAULT_NET_ROOT),
            poll_interval,
            associate_command: None,
            poller: None,
        }
    }

    pub fn with_net_root(mut self, net_root: impl Into<PathBuf>) -> Self {
        self.net_root = net_root.into();
        self
    }

    pub fn with_associate_command(mut self, command: Option<Vec<String>>) -> Self {
        self.associate_command = command;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn operstate_path(&self) -> PathBuf {
        self.net_root.join(&self.interface).join("operstate")
    }
}

#[async_trait]
impl LinkDriver for SysfsLink {
    async fn start(&mut self, events: mpsc::Sender<LinkEvent>) -> Result<(), LinkError> {
        if self.poller.is_some() {
            return Err(LinkError::Driver("link driver already started".to_string()));
        }

        let path = self.operstate_path();
        let poll_interval = self.poll_interval;
        info!(interface = %self.interface, path = %path.display(), "Watching link operstate");

        self.poller = Some(tokio::spawn(async move {
            if events.send(LinkEvent::Started).await.is_err() {
                return;
            }

            let mut previous = None;
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;
                let (up, detail) = read_operstate(&path).await;
                if let Some(event) = transition(previous, up, &detail) {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                previous = Some(up);
            }
        }));

        Ok(())
    }

    async fn associate(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        let Some(template) = &self.associate_command else {
            debug!(interface = %self.interface, "No association command, link managed externally");
            return Ok(());
        };

        let argv = expand_command(template, credentials);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| LinkError::Driver("association command is empty".to_string()))?;

        info!(interface = %self.interface, program = %program, "Running association command");
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| LinkError::AssociationFailed(format!("{program}: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(LinkError::AssociationFailed(format!(
                "{program} exited with {status}"
            )))
        }
    }
}

impl Drop for SysfsLink {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

async fn read_operstate(path: &Path) -> (bool, String) {
    match tokio::fs::read_to_string(path).await {
        Ok(state) => {
            let state = state.trim().to_string();
            (state == "up", format!("operstate {state}"))
        }
        Err(e) => (false, format!("operstate unreadable: {e}")),
    }
}

/// Event to emit for an operstate observation. The first observation only
/// reports a link that is already up.
fn transition(previous: Option<bool>, up: bool, detail: &str) -> Option<LinkEvent> {
    match (previous, up) {
        (None, true) | (Some(false), true) => Some(LinkEvent::Up),
        (Some(true), false) => Some(LinkEvent::Down {
            reason: detail.to_string(),
        }),
        _ => None,
    }
}

/// Substitute `{ssid}` and `{password}` in each argument
fn expand_command(template: &[String], credentials: &Credentials) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{ssid}", &credentials.ssid)
                .replace("{password}", &credentials.password)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_rules() {
        assert_eq!(transition(None, true, ""), Some(LinkEvent::Up));
        assert_eq!(transition(None, false, ""), None);
        assert_eq!(transition(Some(true), true, ""), None);
        assert_eq!(transition(Some(false), false, ""), None);
        assert_eq!(transition(Some(false), true, ""), Some(LinkEvent::Up));
        assert_eq!(
            transition(Some(true), false, "operstate down"),
            Some(LinkEvent::Down {
                reason: "operstate down".to_string()
            })
        );
    }

    #[test]
    fn test_expand_command() {
        let template = vec![
            "nmcli".to_string(),
            "device".to_string(),
            "wifi".to_string(),
            "connect".to_string(),
            "{ssid}".to_string(),
            "password".to_string(),
            "{password}".to_string(),
        ];
        let argv = expand_command(&template, &Credentials::new("garage", "s3cret"));
        assert_eq!(argv[4], "garage");
        assert_eq!(argv[6], "s3cret");
        assert_eq!(argv[0], "nmcli");
    }

    #[tokio::test]
    async fn test_associate_without_command_is_noop() {
        let mut link = SysfsLink::new("wlan0", Duration::from_millis(10));
        assert!(link.associate(&Credentials::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_associate_with_empty_command_fails() {
        let mut link =
            SysfsLink::new("wlan0", Duration::from_millis(10)).with_associate_command(Some(vec![]));
        assert!(matches!(
            link.associate(&Credentials::default()).await,
            Err(LinkError::Driver(_))
        ));
    }

    async fn next_event(rx: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("link event within timeout")
            .expect("event channel open")
    }

    #[tokio::test]
    async fn test_poller_reports_operstate_changes() {
        let root = tempfile::tempdir().unwrap();
        let iface_dir = root.path().join("wlan0");
        std::fs::create_dir(&iface_dir).unwrap();
        std::fs::write(iface_dir.join("operstate"), "up\n").unwrap();

        let mut link =
            SysfsLink::new("wlan0", Duration::from_millis(5)).with_net_root(root.path());
        let (tx, mut rx) = mpsc::channel(8);
        link.start(tx).await.unwrap();

        assert_eq!(next_event(&mut rx).await, LinkEvent::Started);
        assert_eq!(next_event(&mut rx).await, LinkEvent::Up);

        std::fs::write(iface_dir.join("operstate"), "down\n").unwrap();
        assert!(matches!(
            next_event(&mut rx).await,
            LinkEvent::Down { .. }
        ));
    }
}
