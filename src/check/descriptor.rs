// src/check/descriptor.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Construction-time error aggregating every violated constraint, never just
/// the first one found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", violations.join("; "))]
pub struct ValidationError {
    violations: Vec<String>,
}

impl ValidationError {
    pub(crate) fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }
}

/// Static metadata shared by a family of checks that monitor the same
/// dimension (e.g. "database query"). Multiple checks may hold the same
/// descriptor via `Arc<Desc>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Desc {
    id: Uuid,
    description: String,
    yellow_impact: Option<String>,
    red_impact: String,
}

impl Desc {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn yellow_impact(&self) -> Option<&str> {
        self.yellow_impact.as_deref()
    }

    pub fn red_impact(&self) -> &str {
        &self.red_impact
    }
}

/// Validating builder for [`Desc`].
#[derive(Debug, Default)]
pub struct DescBuilder {
    id: Option<Uuid>,
    id_raw: Option<String>,
    description: String,
    yellow_impact: Option<String>,
    red_impact: String,
}

impl DescBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit identifier; a fresh time-ordered one is generated if unset.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Identifier in its canonical string form; parse failures are reported
    /// by [`build`](Self::build) alongside any other violations.
    pub fn id_str(mut self, id: impl Into<String>) -> Self {
        self.id_raw = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn yellow_impact(mut self, impact: impl Into<String>) -> Self {
        self.yellow_impact = Some(impact.into());
        self
    }

    pub fn red_impact(mut self, impact: impl Into<String>) -> Self {
        self.red_impact = impact.into();
        self
    }

    /// Trims all string fields and reports every violated constraint at once.
    pub fn build(self) -> Result<Desc, ValidationError> {
        let description = self.description.trim().to_string();
        let red_impact = self.red_impact.trim().to_string();
        let yellow_impact = self
            .yellow_impact
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut violations = Vec::new();
        let id = match (self.id, self.id_raw) {
            (Some(id), _) => Some(id),
            (None, Some(raw)) => match Uuid::parse_str(raw.trim()) {
                Ok(id) => Some(id),
                Err(e) => {
                    violations.push(format!("id must be a valid UUID: {e}"));
                    None
                }
            },
            (None, None) => Some(Uuid::now_v7()),
        };
        if description.is_empty() {
            violations.push("description must not be blank".to_string());
        }
        if red_impact.is_empty() {
            violations.push("red impact must not be blank".to_string());
        }
        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        Ok(Desc {
            // violations is empty, so the id arm above produced a value
            id: id.unwrap(),
            description,
            yellow_impact,
            red_impact,
        })
    }
}
