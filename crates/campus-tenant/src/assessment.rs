//! Assessment hierarchy
//!
//! Formative, summative and competency assessments share one root record.
//! The specialisations are variants of `AssessmentKind`, so `TenantOwned`
//! is implemented exactly once on `Assessment` and every specialisation is
//! filtered through the same path.

use crate::isolation::TenantOwned;
use crate::store::Record;
use campus_common::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Assessment root record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Assessment ID
    pub id: Uuid,
    /// Owning school
    pub tenant_id: TenantId,
    /// Display title
    pub title: String,
    /// Highest attainable score
    pub max_score: u32,
    /// Specialisation
    pub kind: AssessmentKind,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Assessment specialisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssessmentKind {
    /// Low-stakes check during learning
    Formative {
        /// Comments only, no score recorded
        feedback_only: bool,
    },
    /// Graded end-of-unit or end-of-term assessment
    Summative {
        /// Term the grade counts towards
        term: String,
        /// Share of the term grade
        weight_percent: u8,
    },
    /// Mastery check against a competency framework
    Competency {
        /// Framework code, e.g. `MATH.7.RP.1`
        competency_code: String,
        /// Percentage needed to count as mastered
        mastery_threshold: u8,
    },
}

impl Assessment {
    /// Create new assessment for `tenant_id`
    pub fn new(tenant_id: TenantId, title: impl Into<String>, max_score: u32, kind: AssessmentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            title: title.into(),
            max_score,
            kind,
            created_at: Utc::now(),
        }
    }

    /// Formative specialisation
    pub fn is_formative(&self) -> bool {
        matches!(self.kind, AssessmentKind::Formative { .. })
    }

    /// Summative specialisation
    pub fn is_summative(&self) -> bool {
        matches!(self.kind, AssessmentKind::Summative { .. })
    }

    /// Competency specialisation
    pub fn is_competency(&self) -> bool {
        matches!(self.kind, AssessmentKind::Competency { .. })
    }
}

impl TenantOwned for Assessment {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Record for Assessment {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}
