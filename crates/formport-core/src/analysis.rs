use serde::{Deserialize, Serialize};

/// Schema version the pipeline emits and accepts. Bumped when a breaking
/// field change would make old artifacts unreadable.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// FormAnalysis (analyze_form output)
// ---------------------------------------------------------------------------

/// Structured description of a legacy WinForms form, produced by the
/// `analyze_form` step and consumed by every generation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormAnalysis {
    pub schema_version: u32,
    pub form_name: String,
    pub entity: String,
    #[serde(default)]
    pub controls: Vec<ControlInfo>,
    #[serde(default)]
    pub events: Vec<EventHandlerInfo>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default)]
    pub grid_columns: Vec<GridColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlInfo {
    pub name: String,
    pub control_type: String,
    #[serde(default)]
    pub label: Option<String>,
    /// The entity field this control edits, when the analysis can tell.
    #[serde(default)]
    pub bound_field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHandlerInfo {
    pub name: String,
    pub control: String,
    pub event: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    pub field: String,
    pub rule: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridColumn {
    pub name: String,
    pub header: String,
    #[serde(default)]
    pub sortable: bool,
}

impl FormAnalysis {
    /// Shape checks beyond what serde enforces. Returns a human-readable
    /// reason on failure; the step runner wraps it into `MalformedOutput`.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            ));
        }
        if self.entity.trim().is_empty() {
            return Err("entity is empty".to_string());
        }
        if self.form_name.trim().is_empty() {
            return Err("form_name is empty".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DataAccessAnalysis (analyze_data output)
// ---------------------------------------------------------------------------

/// Structured description of the legacy form's data access: tables touched,
/// stored procedures called, and the fields that flow to and from the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAccessAnalysis {
    pub schema_version: u32,
    pub entity: String,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub stored_procedures: Vec<String>,
    #[serde(default)]
    pub queries: Vec<QueryInfo>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInfo {
    pub purpose: String,
    pub statement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub sql_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub clr_type: Option<String>,
}

impl DataAccessAnalysis {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            ));
        }
        if self.entity.trim().is_empty() {
            return Err("entity is empty".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
