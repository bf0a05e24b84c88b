//! Clients API: the pages a worker controls.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{Result, ServiceWorkerError};

/// A client (controlled page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub url: Url,
    pub client_type: ClientType,
    pub frame_type: FrameType,
    pub visibility_state: VisibilityState,
    pub focused: bool,
    /// Whether the current worker controls this client.
    pub controlled: bool,
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
}

/// Frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Auxiliary,
    TopLevel,
    Nested,
    None,
}

/// Visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Hidden,
    Visible,
}

impl Client {
    /// A visible top-level window showing `url`.
    pub fn window(url: Url) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed)),
            url,
            client_type: ClientType::Window,
            frame_type: FrameType::TopLevel,
            visibility_state: VisibilityState::Visible,
            focused: false,
            controlled: false,
        }
    }

    /// Same client, different kind.
    pub fn with_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        if client_type != ClientType::Window {
            self.frame_type = FrameType::None;
        }
        self
    }
}

/// What the activate handler needs from the page registry.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Window clients in the worker's scope.
    async fn list_clients(&self) -> Result<Vec<Client>>;

    /// Take control of every client without waiting for a reload.
    async fn claim(&self) -> Result<()>;

    /// Navigate a window client to `url`.
    async fn navigate(&self, client: &Client, url: &Url) -> Result<()>;
}

/// In-memory client registry.
#[derive(Debug, Default)]
pub struct Clients {
    clients: RwLock<Vec<Client>>,
    navigations: RwLock<Vec<(String, Url)>>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client.
    pub async fn add(&self, client: Client) {
        self.clients.write().await.push(client);
    }

    /// Open a new window client.
    pub async fn open_window(&self, url: &str) -> Result<Client> {
        let url = Url::parse(url).map_err(|e| ServiceWorkerError::Client(e.to_string()))?;
        let mut client = Client::window(url);
        client.focused = true;
        self.add(client.clone()).await;
        Ok(client)
    }

    /// Get a client by ID.
    pub async fn get(&self, id: &str) -> Option<Client> {
        self.clients.read().await.iter().find(|c| c.id == id).cloned()
    }

    /// Remove a client.
    pub async fn remove(&self, id: &str) -> Option<Client> {
        let mut clients = self.clients.write().await;
        let index = clients.iter().position(|c| c.id == id)?;
        Some(clients.remove(index))
    }

    /// Navigations performed so far, as (client id, target URL).
    pub async fn navigations(&self) -> Vec<(String, Url)> {
        self.navigations.read().await.clone()
    }
}

#[async_trait]
impl ClientRegistry for Clients {
    async fn list_clients(&self) -> Result<Vec<Client>> {
        Ok(self
            .clients
            .read()
            .await
            .iter()
            .filter(|c| c.client_type == ClientType::Window)
            .cloned()
            .collect())
    }

    async fn claim(&self) -> Result<()> {
        let mut clients = self.clients.write().await;
        for client in clients.iter_mut() {
            client.controlled = true;
        }
        debug!(count = clients.len(), "Clients claimed");
        Ok(())
    }

    async fn navigate(&self, client: &Client, url: &Url) -> Result<()> {
        if client.client_type != ClientType::Window {
            return Err(ServiceWorkerError::Client(
                "Can only navigate window clients".to_string(),
            ));
        }

        {
            let mut clients = self.clients.write().await;
            let stored = clients
                .iter_mut()
                .find(|c| c.id == client.id)
                .ok_or_else(|| ServiceWorkerError::NotFound(client.id.clone()))?;
            stored.url = url.clone();
        }

        self.navigations
            .write()
            .await
            .push((client.id.clone(), url.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_window() {
        let clients = Clients::new();

        let client = clients.open_window("https://example.com/").await.unwrap();
        assert_eq!(client.client_type, ClientType::Window);
        assert!(client.focused);
        assert!(!client.controlled);

        assert!(clients.get(&client.id).await.is_some());
        assert!(clients.open_window("not a url").await.is_err());
    }

    #[tokio::test]
    async fn test_list_only_windows() {
        let clients = Clients::new();
        let page = Client::window(Url::parse("https://example.com/dashboard").unwrap());
        let worker =
            Client::window(Url::parse("https://example.com/w.js").unwrap()).with_type(ClientType::Worker);
        clients.add(page.clone()).await;
        clients.add(worker).await;

        let listed = clients.list_clients().await.unwrap();
        assert_eq!(listed, vec![page]);
    }

    #[tokio::test]
    async fn test_claim_marks_controlled() {
        let clients = Clients::new();
        let a = clients.open_window("https://example.com/a").await.unwrap();
        let b = clients.open_window("https://example.com/b").await.unwrap();

        clients.claim().await.unwrap();

        assert!(clients.get(&a.id).await.unwrap().controlled);
        assert!(clients.get(&b.id).await.unwrap().controlled);
    }

    #[tokio::test]
    async fn test_navigate_records_and_updates() {
        let clients = Clients::new();
        let client = clients.open_window("https://example.com/inspections").await.unwrap();
        let target = Url::parse("https://example.com/inspections?page=2").unwrap();

        clients.navigate(&client, &target).await.unwrap();

        assert_eq!(clients.get(&client.id).await.unwrap().url, target);
        assert_eq!(clients.navigations().await, vec![(client.id.clone(), target)]);
    }

    #[tokio::test]
    async fn test_navigate_rejects_non_window_and_unknown() {
        let clients = Clients::new();
        let url = Url::parse("https://example.com/").unwrap();

        let worker = Client::window(url.clone()).with_type(ClientType::SharedWorker);
        clients.add(worker.clone()).await;
        assert!(clients.navigate(&worker, &url).await.is_err());

        let stranger = Client::window(url.clone());
        assert!(matches!(
            clients.navigate(&stranger, &url).await,
            Err(ServiceWorkerError::NotFound(_))
        ));

        let removed = clients.open_window("https://example.com/").await.unwrap();
        assert!(clients.remove(&removed.id).await.is_some());
        assert!(clients.remove(&removed.id).await.is_none());
    }
}
