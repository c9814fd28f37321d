//! # Integrator Client
//!
//! Validates input and sends requests to the remote POS-group service.
//!
//! ## Call Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller                                                                 │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  validate ── missing field ──► Err(Validation)   (no request sent)     │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  HttpTransport ── failure ──► Err(Transport / HttpStatus)              │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  PosResponse::from_body ──► Ok(PosResponse)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call is one stateless request/response exchange.

use chrono::Local;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use kasir_core::validation::{require_item_field, require_keys, require_non_empty};
use kasir_core::Fields;
use kasir_db::DataStore;

use crate::config::IntegratorConfig;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{Action, BulkUpdateOutcome, PosLastDate, PosResponse};
use crate::transport::HttpTransport;

/// Keys `fetch_group_pos` refuses to send without.
const GROUP_POS_REQUIRED: [&str; 3] = ["group_pos", "browser", "waktu"];

/// Format of `last_date` (local wall-clock time).
const LAST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Client for the POS-group service.
///
/// ## Example
/// ```rust,ignore
/// let client = IntegratorClient::new(IntegratorConfig::new("https://pos.example.com"))?;
/// let response = client.update_login_process("42", "1").await?;
/// println!("{:?}", response.get_str("status"));
/// ```
#[derive(Debug, Clone)]
pub struct IntegratorClient {
    config: IntegratorConfig,
    transport: HttpTransport,
    local: Option<DataStore>,
}

impl IntegratorClient {
    /// Creates a client. Fails if the base URL is not http(s).
    pub fn new(config: IntegratorConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(IntegratorClient {
            config,
            transport,
            local: None,
        })
    }

    /// Attaches the local store used by `save_to_local`.
    pub fn with_local_store(mut self, store: DataStore) -> Self {
        self.local = Some(store);
        self
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    // =========================================================================
    // Single Requests
    // =========================================================================

    /// Fetches the POS group (`act=getGroupPos`).
    ///
    /// ## Required Keys
    /// `group_pos`, `browser`, `waktu`. `pc_location` is filled from the
    /// configuration when absent. Every key is sent as a query parameter.
    pub async fn fetch_group_pos(
        &self,
        mut params: BTreeMap<String, String>,
    ) -> ClientResult<PosResponse> {
        require_keys(&params, &GROUP_POS_REQUIRED)?;

        params
            .entry("pc_location".to_string())
            .or_insert_with(|| self.config.pc_location.clone());
        // An explicit `act` from the caller must not override the action.
        params.remove("act");

        self.send(
            Action::GetGroupPos,
            params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
        .await
    }

    /// Marks the login process state of a POS (`act=updateLoginProcess`).
    pub async fn update_login_process(&self, id: &str, status: &str) -> ClientResult<PosResponse> {
        require_non_empty("id", id)?;
        require_non_empty("status", status)?;

        self.send(Action::UpdateLoginProcess, [("id", id), ("status", status)])
            .await
    }

    /// Moves a POS to another branch (`act=updateBranchId`).
    pub async fn update_branch_id(&self, branch_id: &str, id: &str) -> ClientResult<PosResponse> {
        require_non_empty("branch_id", branch_id)?;
        require_non_empty("id", id)?;

        self.send(Action::UpdateBranchId, [("branch_id", branch_id), ("id", id)])
            .await
    }

    /// Stores a new POS token (`act=updatePosToken`).
    pub async fn update_pos_token(
        &self,
        token: &str,
        id: &str,
        status: &str,
    ) -> ClientResult<PosResponse> {
        require_non_empty("token", token)?;
        require_non_empty("id", id)?;
        require_non_empty("status", status)?;

        self.send(
            Action::UpdatePosToken,
            [("token", token), ("id", id), ("status", status)],
        )
        .await
    }

    /// Reports the last data marker with the current local time
    /// (`act=updateLastDate`).
    pub async fn update_last_date(&self, id: &str, last_data: &str) -> ClientResult<PosResponse> {
        require_non_empty("last_data", last_data)?;

        let last_date = Local::now().format(LAST_DATE_FORMAT).to_string();
        self.send(
            Action::UpdateLastDate,
            [
                ("id", id),
                ("last_data", last_data),
                ("last_date", last_date.as_str()),
            ],
        )
        .await
    }

    // =========================================================================
    // Bulk Update
    // =========================================================================

    /// Posts every item as one JSON array (`act=updatePos`).
    ///
    /// Each item needs a non-empty `status` and `data`; the first offending
    /// index is reported and nothing is sent.
    pub async fn bulk_update_pos_last_date(
        &self,
        items: &[PosLastDate],
    ) -> ClientResult<BulkUpdateOutcome> {
        for (index, item) in items.iter().enumerate() {
            require_item_field(index, "status", &item.status)?;
            require_item_field(index, "data", &item.data)?;
        }

        let response = self.transport.post_json(Action::UpdatePos, items).await?;
        info!(items = items.len(), "Bulk POS last-date update sent");

        Ok(BulkUpdateOutcome {
            success: true,
            response,
        })
    }

    // =========================================================================
    // Local Mirror
    // =========================================================================

    /// Writes rows into the configured local table.
    pub async fn save_to_local(&self, rows: &[Fields]) -> ClientResult<u64> {
        self.save_to_local_in(&self.config.local_table, rows).await
    }

    /// Writes rows into `table` with one multi-row insert.
    ///
    /// Failures are logged at `warn` and returned; the caller decides
    /// whether a failed mirror write matters.
    pub async fn save_to_local_in(&self, table: &str, rows: &[Fields]) -> ClientResult<u64> {
        let Some(store) = self.local.as_ref() else {
            warn!(table = %table, "Local save skipped: no local store attached");
            return Err(ClientError::InvalidConfig("no local store attached".into()));
        };

        match store.insert_many(table, rows).await {
            Ok(inserted) => {
                debug!(table = %table, rows = inserted, "Saved rows locally");
                Ok(inserted)
            }
            Err(err) => {
                warn!(table = %table, error = %err, "Local save failed");
                Err(err.into())
            }
        }
    }

    async fn send<'a, I>(&self, action: Action, params: I) -> ClientResult<PosResponse>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let body = self.transport.get(action, params).await?;
        Ok(PosResponse::from_body(&body))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
