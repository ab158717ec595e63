use crate::model::HostModel;
use mccontrol_core::{HostView, ListEntry, PlayerRecord, PluginInfo, ServerInfo, Settings};
use std::sync::Arc;
use tokio::sync::watch;

/// Host state as published by the loop after a command.
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub model: Arc<HostModel>,
    /// Ticket of the newest applied command, 0 before any.
    pub last_applied: u64,
    pub stopping: bool,
}

impl HostSnapshot {
    pub fn new(model: HostModel) -> Self {
        Self {
            model: Arc::new(model),
            last_applied: 0,
            stopping: false,
        }
    }
}

/// Read side of the host. Cheap to clone; every read sees the latest
/// published snapshot.
#[derive(Clone)]
pub struct WorldView {
    rx: watch::Receiver<HostSnapshot>,
}

impl WorldView {
    pub fn new(rx: watch::Receiver<HostSnapshot>) -> Self {
        Self { rx }
    }

    pub fn snapshot(&self) -> HostSnapshot {
        self.rx.borrow().clone()
    }

    fn model(&self) -> Arc<HostModel> {
        Arc::clone(&self.rx.borrow().model)
    }

    pub fn last_applied(&self) -> u64 {
        self.rx.borrow().last_applied
    }

    pub fn is_stopping(&self) -> bool {
        self.rx.borrow().stopping
    }

    /// Resolve once `ticket` has been applied or the loop has stopped.
    pub async fn wait_applied(&self, ticket: u64) {
        let mut rx = self.rx.clone();
        // An Err means the loop is gone; nothing further will be applied.
        let _ = rx
            .wait_for(|s| s.last_applied >= ticket || s.stopping)
            .await;
    }

    pub async fn wait_stopping(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|s| s.stopping).await;
    }
}

impl HostView for WorldView {
    fn players(&self) -> Vec<PlayerRecord> {
        self.model().player_records()
    }

    fn player(&self, uuid: &str) -> Option<PlayerRecord> {
        self.model().player_record(uuid)
    }

    fn online_count(&self) -> usize {
        self.model().online_count()
    }

    fn whitelist(&self) -> Vec<ListEntry> {
        HostModel::list_entries(&self.model().whitelist)
    }

    fn whitelist_enabled(&self) -> bool {
        self.model().whitelist_enabled()
    }

    fn banned(&self) -> Vec<ListEntry> {
        HostModel::list_entries(&self.model().banned)
    }

    fn operators(&self) -> Vec<ListEntry> {
        HostModel::list_entries(&self.model().operators)
    }

    fn plugins(&self) -> Vec<PluginInfo> {
        self.model().plugins()
    }

    fn server_info(&self) -> ServerInfo {
        self.model().server_info()
    }

    fn settings(&self) -> Settings {
        self.model().settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_view_tracks_published_snapshots() {
        let (tx, rx) = watch::channel(HostSnapshot::new(HostModel::default()));
        let view = WorldView::new(rx);
        assert_eq!(view.last_applied(), 0);
        assert!(view.whitelist().is_empty());

        let mut model = HostModel::default();
        model
            .whitelist
            .insert("u-1".to_string(), "Alex".to_string());
        tx.send_replace(HostSnapshot {
            model: Arc::new(model),
            last_applied: 3,
            stopping: false,
        });

        view.wait_applied(2).await;
        assert_eq!(view.last_applied(), 3);
        assert_eq!(
            view.whitelist(),
            vec![ListEntry {
                name: "Alex".into(),
                uuid: "u-1".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_wait_applied_returns_when_loop_gone() {
        let (tx, rx) = watch::channel(HostSnapshot::new(HostModel::default()));
        let view = WorldView::new(rx);
        drop(tx);
        view.wait_applied(10).await;
        assert_eq!(view.last_applied(), 0);
    }
}
