use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::GameStatus;

/// Why a game is due for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CleanupReason {
    /// Past `expires_at`.
    Expired,
    /// Completed longer ago than the grace period.
    CompletedAged,
}

/// Game listed by the cleanup diagnostic.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupCandidate {
    pub game_id: Uuid,
    pub name: String,
    pub status: GameStatus,
    pub reason: CleanupReason,
    pub expires_at: String,
    pub completed_at: Option<String>,
}

/// Aggregate counts of [`CleanupCandidate`]s.
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupCounts {
    pub expired: u32,
    pub completed_aged: u32,
    pub total: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupStatusResponse {
    pub success: bool,
    pub candidates: Vec<CleanupCandidate>,
    pub counts: CleanupCounts,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted: u64,
    pub game_ids: Vec<Uuid>,
}
