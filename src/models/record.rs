//! Analysis History Records
//!
//! The persisted history entry and its mapping to the document-store shape.
//! A record is the inference payload plus the analyzed image as a data URI,
//! stamped with the store-assigned id and server timestamp at commit time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use faunalens_inference::{AnalysisPayload, Classification};

/// One committed analysis in the per-identity history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Store-assigned unique identifier, immutable once assigned
    pub id: String,
    pub scientific_name: String,
    pub common_name: String,
    pub summary: String,
    pub classification: Classification,
    pub ecological_role: String,
    /// Analyzed image as `data:<mimeType>;base64,<data>`
    pub image_data: String,
    /// Server-assigned commit timestamp, never client-supplied
    pub created_at: DateTime<Utc>,
}

/// Document body written to the store: payload fields plus the image data
/// URI. Id and timestamp are assigned by the store at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody {
    scientific_name: String,
    common_name: String,
    summary: String,
    classification: Classification,
    ecological_role: String,
    image_data: String,
}

/// Encode raw image bytes as a data URI for storage-embedded display.
pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Build the document body for a payload about to be committed.
pub fn document_body(payload: &AnalysisPayload, image_data: &str) -> Value {
    let body = RecordBody {
        scientific_name: payload.scientific_name.clone(),
        common_name: payload.common_name.clone(),
        summary: payload.summary.clone(),
        classification: payload.classification.clone(),
        ecological_role: payload.ecological_role.clone(),
        image_data: image_data.to_string(),
    };
    serde_json::to_value(body).expect("record body serializes")
}

impl AnalysisRecord {
    /// Assemble a record from a freshly committed write.
    pub fn committed(
        id: String,
        created_at: DateTime<Utc>,
        payload: AnalysisPayload,
        image_data: String,
    ) -> Self {
        Self {
            id,
            scientific_name: payload.scientific_name,
            common_name: payload.common_name,
            summary: payload.summary,
            classification: payload.classification,
            ecological_role: payload.ecological_role,
            image_data,
            created_at,
        }
    }

    /// Reconstruct a record from a stored document.
    pub fn from_document(
        id: &str,
        created_at: DateTime<Utc>,
        data: &Value,
    ) -> Result<Self, String> {
        let body: RecordBody = serde_json::from_value(data.clone())
            .map_err(|e| format!("malformed history document: {}", e))?;
        Ok(Self {
            id: id.to_string(),
            scientific_name: body.scientific_name,
            common_name: body.common_name,
            summary: body.summary,
            classification: body.classification,
            ecological_role: body.ecological_role,
            image_data: body.image_data,
            created_at,
        })
    }

    /// The structured payload portion of this record.
    pub fn payload(&self) -> AnalysisPayload {
        AnalysisPayload {
            scientific_name: self.scientific_name.clone(),
            common_name: self.common_name.clone(),
            summary: self.summary.clone(),
            classification: self.classification.clone(),
            ecological_role: self.ecological_role.clone(),
        }
    }
}

/// Sort a snapshot into its canonical order: `created_at` descending, ties
/// broken by store-assigned id ascending.
pub fn sort_snapshot(records: &mut [AnalysisRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
