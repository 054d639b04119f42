use crate::error::Result;
use crate::paths;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Form discovery
// ---------------------------------------------------------------------------

/// A legacy WinForms form found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCandidate {
    /// Form name, e.g. `frmVendor` (designer file stem minus `.Designer`).
    pub form_name: String,
    /// The code-behind file when present (`frmVendor.vb`).
    pub code_file: Option<PathBuf>,
    /// The designer file when present (`frmVendor.Designer.vb`).
    pub designer_file: Option<PathBuf>,
}

/// Scan `source_root` for legacy forms.
///
/// A form is recognised by its `*.Designer.vb` file, or by a `.vb` file whose
/// text declares `Inherits … Windows.Forms.Form`. Results are sorted by form
/// name so prompts and listings are stable.
pub fn discover_forms(source_root: &Path) -> Result<Vec<FormCandidate>> {
    let mut found: Vec<FormCandidate> = Vec::new();

    for entry in WalkDir::new(source_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.to_ascii_lowercase().ends_with(".vb") {
            continue;
        }

        if let Some(stem) = name.strip_suffix(".Designer.vb") {
            upsert(&mut found, stem, None, Some(path.to_path_buf()));
        } else if let Some(stem) = name.strip_suffix(".vb") {
            // Only count plain .vb files that actually declare a form
            let text = std::fs::read_to_string(path).unwrap_or_default();
            if is_form_source(&text) {
                upsert(&mut found, stem, Some(path.to_path_buf()), None);
            }
        }
    }

    found.sort_by(|a, b| a.form_name.cmp(&b.form_name));
    Ok(found)
}

fn upsert(
    found: &mut Vec<FormCandidate>,
    form_name: &str,
    code: Option<PathBuf>,
    designer: Option<PathBuf>,
) {
    if let Some(existing) = found.iter_mut().find(|f| f.form_name == form_name) {
        if code.is_some() {
            existing.code_file = code;
        }
        if designer.is_some() {
            existing.designer_file = designer;
        }
        return;
    }
    found.push(FormCandidate {
        form_name: form_name.to_string(),
        code_file: code,
        designer_file: designer,
    });
}

/// True when VB source text declares a WinForms form class.
fn is_form_source(text: &str) -> bool {
    text.lines().any(|line| {
        let t = line.trim();
        t.starts_with("Inherits") && t.contains("Windows.Forms.Form")
    })
}

// ---------------------------------------------------------------------------
// Entity naming
// ---------------------------------------------------------------------------

/// Map a legacy form name to its entity name by stripping the customary
/// affixes: `frmVendor` → `Vendor`, `VendorForm` → `Vendor`.
pub fn entity_for_form(form_name: &str) -> String {
    let mut name = form_name;
    if let Some(stripped) = name.strip_prefix("frm") {
        if !stripped.is_empty() {
            name = stripped;
        }
    }
    if let Some(stripped) = name.strip_suffix("Form") {
        if !stripped.is_empty() {
            name = stripped;
        }
    }
    name.to_string()
}

/// The legacy source files feeding an entity's conversion, looked up
/// case-insensitively against the discovered forms.
pub fn form_sources(source_root: &Path, entity: &str) -> Result<Vec<PathBuf>> {
    paths::validate_entity(entity)?;
    let forms = discover_forms(source_root)?;
    let wanted = entity.to_ascii_lowercase();

    let mut sources = Vec::new();
    for form in &forms {
        if entity_for_form(&form.form_name).to_ascii_lowercase() != wanted {
            continue;
        }
        if let Some(code) = &form.code_file {
            sources.push(code.clone());
        }
        if let Some(designer) = &form.designer_file {
            sources.push(designer.clone());
        }
    }
    Ok(sources)
}

/// The form name an entity maps back to, when exactly one discovered form
/// matches. Used to stamp `form_name` into the manifest.
pub fn form_name_for_entity(source_root: &Path, entity: &str) -> Option<String> {
    let forms = discover_forms(source_root).ok()?;
    let wanted = entity.to_ascii_lowercase();
    forms
        .into_iter()
        .map(|f| f.form_name)
        .find(|name| entity_for_form(name).to_ascii_lowercase() == wanted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
