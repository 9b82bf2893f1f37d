//! Client records and their embedded contracts.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::label::FlexLabel;
use crate::stage::Stage;
use crate::time::{LooseTimestamp, FALLBACK_TIMESTAMP};

/// Payload for `POST /clients`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub stage: Stage,
    pub source: String,
    pub channel: String,
    pub app: String,
    pub is_active: bool,
    pub last_login: String,
    pub contracts: Vec<Contract>,
}

/// A client in canonical write form.
///
/// This is what a session keeps after a successful create and what gets sent
/// back on `PUT /clients/{id}/stage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    /// `None` when the server reported a stage outside the known set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub source: String,
    pub channel: String,
    pub app: String,
    pub is_active: bool,
    pub last_login: String,
    pub contracts: Vec<Contract>,
}

/// A contract embedded in a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub number: String,
    pub amount: f64,
    pub status: String,
    pub payment_frequency: String,
    pub autopayment: String,
    pub conclusion_date: String,
    pub expiration_date: String,
}

/// A client exactly as the API returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchedClient {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "current_stage")]
    pub stage: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub app: Option<FlexLabel>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub last_login: Option<LooseTimestamp>,
    #[serde(default)]
    pub contracts: Option<Vec<FetchedContract>>,
}

/// A contract exactly as the API returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchedContract {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_frequency: Option<String>,
    #[serde(default)]
    pub autopayment: Option<FlexLabel>,
    #[serde(default)]
    pub conclusion_date: Option<LooseTimestamp>,
    #[serde(default)]
    pub expiration_date: Option<LooseTimestamp>,
}

impl ClientRecord {
    /// Decode a fetched client into canonical form.
    pub fn from_fetched(fetched: FetchedClient) -> ModelResult<Self> {
        let id = fetched
            .id
            .filter(|id| !id.is_empty())
            .ok_or(ModelError::MissingField("id"))?;

        Ok(Self {
            id,
            name: fetched.name.unwrap_or_default(),
            email: fetched.email.unwrap_or_default(),
            stage: fetched.stage.as_deref().and_then(|s| s.parse().ok()),
            source: fetched.source.unwrap_or_default(),
            channel: fetched.channel.unwrap_or_default(),
            app: fetched.app.map(FlexLabel::into_label).unwrap_or_default(),
            is_active: fetched.is_active.unwrap_or(false),
            last_login: canonical_or_fallback(fetched.last_login.as_ref()),
            contracts: fetched
                .contracts
                .unwrap_or_default()
                .into_iter()
                .map(Contract::from_fetched)
                .collect(),
        })
    }

    /// Move the client to a new stage and activity state.
    pub fn restage(&mut self, stage: Stage, is_active: bool) {
        self.stage = Some(stage);
        self.is_active = is_active;
    }
}

impl Contract {
    pub fn from_fetched(fetched: FetchedContract) -> Self {
        Self {
            id: fetched.id,
            name: fetched.name.unwrap_or_default(),
            number: fetched.number.unwrap_or_default(),
            amount: fetched.amount.unwrap_or_default(),
            status: fetched.status.unwrap_or_default(),
            payment_frequency: fetched.payment_frequency.unwrap_or_default(),
            autopayment: fetched
                .autopayment
                .map(FlexLabel::into_label)
                .unwrap_or_default(),
            conclusion_date: canonical_or_fallback(fetched.conclusion_date.as_ref()),
            expiration_date: canonical_or_fallback(fetched.expiration_date.as_ref()),
        }
    }
}

fn canonical_or_fallback(ts: Option<&LooseTimestamp>) -> String {
    ts.map(LooseTimestamp::to_canonical)
        .unwrap_or_else(|| FALLBACK_TIMESTAMP.to_string())
}
