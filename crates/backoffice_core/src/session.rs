//! Lifetime of one signed-in console: transport, shared cache and the
//! screens opened on top of them.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use shared::domain::{RecordId, Resource};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::ConsoleSettings,
    error::{ScreenError, TransportError},
    filter::{default_fields, FilterField},
    orchestrator::DataFetchOrchestrator,
    pagination::PageSize,
    query::ListQuery,
    screen::{ListScreen, ScreenOptions},
    transport::{BackofficeApi, HttpBackofficeApi},
};

/// One entry of a dropdown fed by another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOption {
    pub id: RecordId,
    pub name: String,
}

pub struct ConsoleSession {
    orchestrator: DataFetchOrchestrator,
    options: ScreenOptions,
    screens: Mutex<Vec<Weak<ListScreen>>>,
}

impl ConsoleSession {
    pub fn new(api: Arc<dyn BackofficeApi>, settings: &ConsoleSettings) -> Self {
        Self {
            orchestrator: DataFetchOrchestrator::new(api, settings.cache_stale_after()),
            options: ScreenOptions::from_settings(settings),
            screens: Mutex::new(Vec::new()),
        }
    }

    /// Session over the HTTP API described by `settings`.
    pub fn connect(settings: &ConsoleSettings) -> Result<Self, TransportError> {
        let api = HttpBackofficeApi::from_settings(settings)?;
        info!(base_url = %api.base_url(), "console session connected");
        Ok(Self::new(Arc::new(api), settings))
    }

    pub fn orchestrator(&self) -> &DataFetchOrchestrator {
        &self.orchestrator
    }

    pub async fn open_screen(&self, resource: Resource) -> Result<Arc<ListScreen>, ScreenError> {
        self.open_screen_with(resource, &default_fields(resource))
            .await
    }

    /// Mounts a screen and loads its first page. A failed first load is
    /// reported on the screen and does not prevent opening it; only auth
    /// failures are returned.
    pub async fn open_screen_with(
        &self,
        resource: Resource,
        fields: &[FilterField],
    ) -> Result<Arc<ListScreen>, ScreenError> {
        let screen = ListScreen::new(resource, fields, self.orchestrator.clone(), self.options);
        {
            let mut screens = self.screens.lock().await;
            screens.retain(|screen| screen.strong_count() > 0);
            screens.push(Arc::downgrade(&screen));
        }
        match screen.refresh().await {
            Err(ScreenError::Transport(err)) if err.is_auth() => {
                screen.unmount().await;
                Err(ScreenError::Transport(err))
            }
            _ => Ok(screen),
        }
    }

    /// Loads every resource's full list for dropdowns, concurrently. A
    /// failing resource yields no options.
    pub async fn load_lookups(&self, resources: &[Resource]) -> HashMap<Resource, Vec<LookupOption>> {
        let loads = resources.iter().map(|&resource| async move {
            let query = ListQuery::new(resource).with_page_size(PageSize::All);
            let options = match self.orchestrator.load(&query).await {
                Ok(result) => result
                    .items
                    .into_iter()
                    .map(|row| LookupOption {
                        id: row.id,
                        name: row.name,
                    })
                    .collect(),
                Err(err) => {
                    warn!(%resource, error = %err, "lookup load failed");
                    Vec::new()
                }
            };
            (resource, options)
        });
        join_all(loads).await.into_iter().collect()
    }

    /// Unmounts every open screen and drops all cached data.
    pub async fn logout(&self) {
        let screens: Vec<_> = self.screens.lock().await.drain(..).collect();
        for screen in screens.iter().filter_map(Weak::upgrade) {
            screen.unmount().await;
        }
        self.orchestrator.cache().clear().await;
        info!("console session closed");
    }
}
