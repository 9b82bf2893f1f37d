//! Client lifecycle stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Lifecycle stage of a client record.
///
/// The API rejects anything outside this set, so generators must only ever
/// draw from [`Stage::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Registration,
    ProductSelection,
    DataConsent,
    FormFilling,
    ParticipantsSpecification,
    TermsAgreement,
    ClientQuestionnaire,
    ApprovalWaiting,
    Modifications,
    DocumentSigning,
    PaymentWaiting,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::Registration,
        Stage::ProductSelection,
        Stage::DataConsent,
        Stage::FormFilling,
        Stage::ParticipantsSpecification,
        Stage::TermsAgreement,
        Stage::ClientQuestionnaire,
        Stage::ApprovalWaiting,
        Stage::Modifications,
        Stage::DocumentSigning,
        Stage::PaymentWaiting,
        Stage::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Registration => "registration",
            Stage::ProductSelection => "product_selection",
            Stage::DataConsent => "data_consent",
            Stage::FormFilling => "form_filling",
            Stage::ParticipantsSpecification => "participants_specification",
            Stage::TermsAgreement => "terms_agreement",
            Stage::ClientQuestionnaire => "client_questionnaire",
            Stage::ApprovalWaiting => "approval_waiting",
            Stage::Modifications => "modifications",
            Stage::DocumentSigning => "document_signing",
            Stage::PaymentWaiting => "payment_waiting",
            Stage::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ModelError::UnknownStage(s.to_string()))
    }
}
