use crate::cancel::CancelToken;
use crate::config::RunConfig;
use crate::deploy;
use crate::error::{ConvertError, Result};
use crate::io;
use crate::paths;
use crate::prompter::{Choice, Prompter, CHANGED_MEMBER_CHOICES, NEW_MEMBER_CHOICES};
use crate::scanner::{self, MemberKey, MemberKind, ParsedMember, ScannedFile};
use crate::types::{ConflictStrategy, MergeMode};
use similar::TextDiff;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Whitespace-normalized rendering used for change detection; reformatting
/// alone is never a change.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct MergeConflict {
    pub key: MemberKey,
    pub reason: String,
}

/// How the generated and existing versions of one file relate, member by
/// member. Keys listed under `removed` exist only in the target; they are
/// reported and always kept.
#[derive(Debug, Default)]
pub struct MergeAnalysis {
    pub new: Vec<MemberKey>,
    pub changed: Vec<MemberKey>,
    pub unchanged: Vec<MemberKey>,
    pub removed: Vec<MemberKey>,
    pub conflicts: Vec<MergeConflict>,
    pub new_usings: Vec<String>,
}

fn duplicate_keys(members: &[ParsedMember]) -> HashSet<MemberKey> {
    let mut seen = HashSet::new();
    let mut dups = HashSet::new();
    for m in members {
        if !seen.insert(m.key()) {
            dups.insert(m.key());
        }
    }
    dups
}

pub fn analyze(generated: &ScannedFile, existing: &ScannedFile) -> MergeAnalysis {
    let mut analysis = MergeAnalysis::default();

    // A name that maps to more than one member on either side (overloads,
    // usually) cannot be matched mechanically; such members are reported
    // and left alone.
    let mut conflicted: HashSet<MemberKey> = HashSet::new();
    for key in duplicate_keys(&generated.members) {
        conflicted.insert(key.clone());
        analysis.conflicts.push(MergeConflict {
            key,
            reason: "multiple generated members share this name".to_string(),
        });
    }
    for key in duplicate_keys(&existing.members) {
        if conflicted.insert(key.clone()) {
            analysis.conflicts.push(MergeConflict {
                key,
                reason: "multiple existing members share this name".to_string(),
            });
        }
    }

    let existing_by_key: HashMap<MemberKey, &ParsedMember> =
        existing.members.iter().map(|m| (m.key(), m)).collect();
    let generated_keys: HashSet<MemberKey> =
        generated.members.iter().map(|m| m.key()).collect();

    for m in &generated.members {
        let key = m.key();
        if conflicted.contains(&key) {
            continue;
        }
        match existing_by_key.get(&key) {
            None => analysis.new.push(key),
            Some(ex) => {
                if normalize_ws(&m.text) == normalize_ws(&ex.text) {
                    analysis.unchanged.push(key);
                } else {
                    analysis.changed.push(key);
                }
            }
        }
    }
    for m in &existing.members {
        let key = m.key();
        if !conflicted.contains(&key) && !generated_keys.contains(&key) {
            analysis.removed.push(key);
        }
    }

    for u in &generated.usings {
        if !existing.usings.contains(u) {
            analysis.new_usings.push(u.clone());
        }
    }
    analysis
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// No difference beyond whitespace.
    Identical,
    Merged {
        added: usize,
        replaced: usize,
        usings_added: usize,
    },
    /// Left untouched: every change declined, quit, or unmergeable.
    Kept,
    /// Dry run: the decisions a real merge would put up.
    Planned {
        added: usize,
        replaced: usize,
        usings_added: usize,
    },
}

#[derive(Debug, Default)]
pub struct MergeReport {
    pub files: Vec<(PathBuf, FileOutcome)>,
    pub conflicts: usize,
}

// ---------------------------------------------------------------------------
// MergeSession
// ---------------------------------------------------------------------------

/// One merge invocation over an entity's generated tree. Only generated
/// `.cs` files whose deployment target already exists are considered;
/// placing new files is the deploy step's job. The first write to each
/// target within the session snapshots it to a `.backup` sibling.
pub struct MergeSession<'a> {
    mode: MergeMode,
    strategy: ConflictStrategy,
    prompter: &'a mut dyn Prompter,
    cancel: CancelToken,
    backed_up: HashSet<PathBuf>,
}

impl<'a> MergeSession<'a> {
    pub fn new(
        mode: MergeMode,
        strategy: ConflictStrategy,
        prompter: &'a mut dyn Prompter,
        cancel: CancelToken,
    ) -> Self {
        Self {
            mode,
            strategy,
            prompter,
            cancel,
            backed_up: HashSet::new(),
        }
    }

    pub fn merge_entity(&mut self, cfg: &RunConfig) -> Result<MergeReport> {
        let gen_dir = paths::generated_dir(&cfg.output_root, &cfg.entity);
        if !gen_dir.is_dir() {
            return Err(ConvertError::Usage(format!(
                "no generated output for '{}': run the pipeline first",
                cfg.entity
            )));
        }

        let mut report = MergeReport::default();
        for entry in WalkDir::new(&gen_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            // An interrupt finishes the file in flight; files not yet
            // started are left for a later session.
            if self.cancel.is_cancelled() {
                tracing::info!("merge interrupted; applied decisions are kept");
                break;
            }
            let rel = entry
                .path()
                .strip_prefix(&gen_dir)
                .expect("walk stays under the generated dir");
            if rel.extension().and_then(|e| e.to_str()) != Some("cs") {
                tracing::debug!(file = %rel.display(), "not a C# source, left to deploy");
                continue;
            }
            let Some(target) = deploy::target_for(cfg, rel) else {
                tracing::debug!(file = %rel.display(), "no merge target for file");
                continue;
            };
            if !target.exists() {
                tracing::debug!(target = %target.display(), "target absent, left to deploy");
                continue;
            }
            self.merge_file(entry.path(), &target, &mut report)?;
        }
        Ok(report)
    }

    /// Merge one generated C# file into an existing target.
    pub fn merge_file(
        &mut self,
        source: &Path,
        target: &Path,
        report: &mut MergeReport,
    ) -> Result<()> {
        if !target.exists() {
            return Err(ConvertError::Usage(format!(
                "merge target {} does not exist; 'formport deploy' places new files",
                target.display()
            )));
        }
        let generated_text = std::fs::read_to_string(source)?;
        let existing_text = std::fs::read_to_string(target)?;
        if existing_text == generated_text {
            report
                .files
                .push((target.to_path_buf(), FileOutcome::Identical));
            return Ok(());
        }

        let scans = scanner::scan_text(&source.display().to_string(), &generated_text)
            .and_then(|g| {
                scanner::scan_text(&target.display().to_string(), &existing_text)
                    .map(|e| (g, e))
            });
        let (generated, existing) = match scans {
            Ok((g, e)) if g.structured && e.structured => (g, e),
            Ok(_) => {
                self.prompter.show(&format!(
                    "cannot merge {} structurally: no mergeable class body; leaving it untouched",
                    target.display()
                ));
                report.conflicts += 1;
                report.files.push((target.to_path_buf(), FileOutcome::Kept));
                return Ok(());
            }
            Err(err) => {
                self.prompter.show(&format!(
                    "cannot merge {} structurally: {err}; leaving it untouched",
                    target.display()
                ));
                report.conflicts += 1;
                report.files.push((target.to_path_buf(), FileOutcome::Kept));
                return Ok(());
            }
        };
        self.merge_structured(&generated, &existing, target, report)
    }

    fn merge_structured(
        &mut self,
        generated: &ScannedFile,
        existing: &ScannedFile,
        target: &Path,
        report: &mut MergeReport,
    ) -> Result<()> {
        let analysis = analyze(generated, existing);
        report.conflicts += analysis.conflicts.len();

        self.prompter.show(&format!(
            "merging {}: {} new, {} changed, {} unchanged, {} only in target, {} conflict(s)",
            target.display(),
            analysis.new.len(),
            analysis.changed.len(),
            analysis.unchanged.len(),
            analysis.removed.len(),
            analysis.conflicts.len(),
        ));
        for c in &analysis.conflicts {
            self.prompter
                .show(&format!("  conflict on {}: {}; left untouched", c.key, c.reason));
        }
        for key in &analysis.removed {
            self.prompter
                .show(&format!("  {key} exists only in the target; keeping it"));
        }

        if analysis.new.is_empty() && analysis.changed.is_empty() && analysis.new_usings.is_empty()
        {
            let outcome = if analysis.conflicts.is_empty() {
                FileOutcome::Identical
            } else {
                FileOutcome::Kept
            };
            report.files.push((target.to_path_buf(), outcome));
            return Ok(());
        }

        let gen_by_key: HashMap<MemberKey, &ParsedMember> =
            generated.members.iter().map(|m| (m.key(), m)).collect();
        let ex_by_key: HashMap<MemberKey, &ParsedMember> =
            existing.members.iter().map(|m| (m.key(), m)).collect();

        if self.mode == MergeMode::DryRun {
            for key in &analysis.new {
                self.prompter
                    .show(&format!("new {key}: {}", gen_by_key[key].signature));
            }
            for key in &analysis.changed {
                self.prompter.show(&format!("changed {key}:"));
                self.prompter
                    .show(&unified_diff(&ex_by_key[key].text, &gen_by_key[key].text));
            }
            report.files.push((
                target.to_path_buf(),
                FileOutcome::Planned {
                    added: analysis.new.len(),
                    replaced: analysis.changed.len(),
                    usings_added: analysis.new_usings.len(),
                },
            ));
            return Ok(());
        }

        // Quit stops the questions for this file only; everything accepted
        // up to that point is still applied.
        let mut accepted_new: Vec<&ParsedMember> = Vec::new();
        let mut accepted_changed: Vec<(&ParsedMember, &ParsedMember)> = Vec::new();
        let mut quit = false;

        for key in &analysis.new {
            if quit {
                break;
            }
            let gen_m = gen_by_key[key];
            if self.mode != MergeMode::Auto {
                self.prompter
                    .show(&format!("new {key}: {}", gen_m.signature));
            }
            match self.decide_new(key, gen_m) {
                Choice::Add => accepted_new.push(gen_m),
                Choice::Quit => quit = true,
                _ => {}
            }
        }
        for key in &analysis.changed {
            if quit {
                break;
            }
            let gen_m = gen_by_key[key];
            let ex_m = ex_by_key[key];
            if self.mode != MergeMode::Auto {
                self.prompter
                    .show(&format!("changed {key}: {}", gen_m.signature));
            }
            match self.decide_changed(key, ex_m, gen_m) {
                Choice::UseGenerated => accepted_changed.push((ex_m, gen_m)),
                Choice::Quit => quit = true,
                _ => {}
            }
        }

        // Missing using directives ride along without a question of their
        // own, but only when something was actually taken from the
        // generated file (or the usings are the only difference at all).
        let no_member_changes = analysis.new.is_empty() && analysis.changed.is_empty();
        let apply_usings = !analysis.new_usings.is_empty()
            && (no_member_changes || !accepted_new.is_empty() || !accepted_changed.is_empty());

        if accepted_new.is_empty() && accepted_changed.is_empty() && !apply_usings {
            report.files.push((target.to_path_buf(), FileOutcome::Kept));
            return Ok(());
        }

        let mut edits: Vec<Edit> = Vec::new();
        for (ex_m, gen_m) in &accepted_changed {
            let text = reindent(
                &gen_m.text,
                &member_indent(existing, ex_m),
                &member_indent(generated, gen_m),
            );
            edits.push(Edit {
                span: ex_m.span.clone(),
                text,
                seq: edits.len(),
            });
        }
        for gen_m in &accepted_new {
            let ins = insertion_for(existing, gen_m.kind);
            let body = reindent(&gen_m.text, &ins.indent, &member_indent(generated, gen_m));
            let text = if ins.after_member {
                format!("\n\n{}{body}", ins.indent)
            } else {
                format!("\n{}{body}\n", ins.indent)
            };
            edits.push(Edit {
                span: ins.at..ins.at,
                text,
                seq: edits.len(),
            });
        }

        let mut usings_added = 0;
        if apply_usings {
            let block = rebuild_usings(&existing.usings, &generated.usings);
            let (span, text) = match existing.using_span.clone() {
                Some(span) => (span, block),
                None => {
                    let at = existing.header_insert_offset();
                    (at..at, format!("{block}\n"))
                }
            };
            edits.push(Edit {
                span,
                text,
                seq: edits.len(),
            });
            usings_added = analysis.new_usings.len();
        }

        let added = accepted_new.len();
        let replaced = accepted_changed.len();
        let merged = apply_edits(&existing.text, edits);
        self.backup_then_write(target, &existing.text, &merged)?;
        tracing::info!(
            target = %target.display(),
            added,
            replaced,
            usings_added,
            "merged file"
        );
        report.files.push((
            target.to_path_buf(),
            FileOutcome::Merged {
                added,
                replaced,
                usings_added,
            },
        ));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    /// Additions are always taken in auto mode; they cannot clobber
    /// anything. The view choices answer nothing and ask again.
    fn decide_new(&mut self, key: &MemberKey, member: &ParsedMember) -> Choice {
        if self.mode == MergeMode::Auto {
            return Choice::Add;
        }
        loop {
            if self.cancel.is_cancelled() {
                return Choice::Quit;
            }
            match self.prompter.ask(&format!("add {key}?"), NEW_MEMBER_CHOICES) {
                Choice::ViewDiff => self.prompter.show(&unified_diff("", &member.text)),
                Choice::ViewFull => self.prompter.show(&member.text),
                other => return other,
            }
        }
    }

    /// Replacing something the target already has is where the conflict
    /// strategy applies in auto mode.
    fn decide_changed(
        &mut self,
        key: &MemberKey,
        ex_m: &ParsedMember,
        gen_m: &ParsedMember,
    ) -> Choice {
        if self.mode == MergeMode::Auto {
            return match self.strategy {
                ConflictStrategy::UseGenerated => Choice::UseGenerated,
                // Prompt cannot happen in auto mode (config validation
                // rejects it); fall back to the safe answer.
                ConflictStrategy::KeepExisting | ConflictStrategy::Prompt => Choice::KeepExisting,
            };
        }
        loop {
            if self.cancel.is_cancelled() {
                return Choice::Quit;
            }
            match self
                .prompter
                .ask(&format!("replace {key}?"), CHANGED_MEMBER_CHOICES)
            {
                Choice::ViewDiff => self.prompter.show(&unified_diff(&ex_m.text, &gen_m.text)),
                other => return other,
            }
        }
    }

    /// Snapshot the target once per session, then write the merged text.
    fn backup_then_write(&mut self, target: &Path, original: &str, merged: &str) -> Result<()> {
        if self.backed_up.insert(target.to_path_buf()) {
            io::atomic_write(&paths::backup_path(target), original.as_bytes())?;
        }
        io::atomic_write(target, merged.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Edit application
// ---------------------------------------------------------------------------

struct Edit {
    span: Range<usize>,
    text: String,
    seq: usize,
}

/// Apply span edits back to front so earlier offsets stay valid. Edits
/// inserted at the same position keep their original relative order.
fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(b.seq.cmp(&a.seq)));
    let mut out = text.to_string();
    for e in &edits {
        out.replace_range(e.span.clone(), &e.text);
    }
    out
}

fn unified_diff(old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(2)
        .header("existing", "generated")
        .to_string()
}

/// The whitespace prefix of the line a member starts on.
fn member_indent(file: &ScannedFile, m: &ParsedMember) -> String {
    let line_start = file.text[..m.span.start]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    file.text[line_start..m.span.start]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect()
}

/// Re-anchor a member's continuation lines from one indent level to
/// another. The first line carries no prefix; the splice target supplies
/// it.
fn reindent(text: &str, new_indent: &str, old_indent: &str) -> String {
    if new_indent == old_indent {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i == 0 {
            out.push_str(line);
            continue;
        }
        out.push('\n');
        let stripped = line.strip_prefix(old_indent).unwrap_or(line);
        if !stripped.trim().is_empty() {
            out.push_str(new_indent);
            out.push_str(stripped);
        }
    }
    out
}

struct Insertion {
    at: usize,
    indent: String,
    after_member: bool,
}

/// Splice point for a new member. Methods go after the last existing
/// method, falling back to the last property; properties go after the
/// last property, falling back to the start of the class body so they
/// stay ahead of the methods.
fn insertion_for(existing: &ScannedFile, kind: MemberKind) -> Insertion {
    let last_of = |k: MemberKind| existing.members.iter().filter(|m| m.kind == k).last();
    let anchor = match kind {
        MemberKind::Method => {
            last_of(MemberKind::Method).or_else(|| last_of(MemberKind::Property))
        }
        MemberKind::Property => last_of(MemberKind::Property),
    };
    match anchor {
        Some(m) => Insertion {
            at: m.span.end,
            indent: member_indent(existing, m),
            after_member: true,
        },
        None => Insertion {
            at: existing
                .body
                .as_ref()
                .map(|b| b.start)
                .unwrap_or(existing.text.len()),
            indent: body_start_indent(existing),
            after_member: false,
        },
    }
}

/// One level deeper than the line holding the type's opening brace.
fn body_start_indent(existing: &ScannedFile) -> String {
    let open = existing
        .body
        .as_ref()
        .map(|b| b.start.saturating_sub(1))
        .unwrap_or(0);
    let line_start = existing.text[..open]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let base: String = existing.text[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();
    format!("{base}    ")
}

/// Union of both using lists, `System` namespaces first, each group
/// sorted.
fn rebuild_usings(existing: &[String], generated: &[String]) -> String {
    let mut all: Vec<String> = existing.to_vec();
    for u in generated {
        if !all.contains(u) {
            all.push(u.clone());
        }
    }
    all.sort_by_key(|u| using_sort_key(u));
    all.dedup();
    let mut block = all.join("\n");
    block.push('\n');
    block
}

fn using_sort_key(u: &str) -> (u8, String) {
    let name = u
        .trim_start_matches("global ")
        .trim_start_matches("using ")
        .trim_start_matches("static ")
        .trim_end_matches(';')
        .trim()
        .to_string();
    let system = name == "System" || name.starts_with("System.");
    (u8::from(!system), name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompter::ScriptedPrompter;
    use tempfile::TempDir;

    const GEN_MODEL: &str = r#"using System;
using System.ComponentModel.DataAnnotations;

namespace App.Shared.Models
{
    public class Vendor
    {
        public int Id { get; set; }

        [Required]
        [StringLength(100)]
        public string Name { get; set; }

        public string Phone { get; set; }

        public bool IsActive { get; set; }
    }
}
"#;

    const EXISTING_MODEL: &str = r#"using System;

namespace App.Shared.Models
{
    public class Vendor
    {
        public int Id { get; set; }

        [Required]
        public string Name { get; set; }

        public string Notes { get; set; }
    }
}
"#;

    const GEN_CONTROLLER: &str = r#"using Microsoft.AspNetCore.Mvc;

namespace App.Api.Controllers
{
    public class VendorController : Controller
    {
        public IActionResult Index()
        {
            return View();
        }

        public IActionResult Details(int id)
        {
            return View(id);
        }
    }
}
"#;

    const EXISTING_CONTROLLER: &str = r#"using Microsoft.AspNetCore.Mvc;

namespace App.Api.Controllers
{
    public class VendorController : Controller
    {
        public IActionResult Index()
        {
            return View();
        }

        public IActionResult Edit(int id)
        {
            return View(id);
        }
    }
}
"#;

    fn scan(name: &str, text: &str) -> ScannedFile {
        scanner::scan_text(name, text).unwrap()
    }

    fn write_pair(dir: &Path, gen: &str, existing: &str) -> (PathBuf, PathBuf) {
        let source = dir.join("generated/Models/Vendor.cs");
        let target = dir.join("shared/Models/Vendor.cs");
        io::atomic_write(&source, gen.as_bytes()).unwrap();
        io::atomic_write(&target, existing.as_bytes()).unwrap();
        (source, target)
    }

    fn run_merge(
        mode: MergeMode,
        strategy: ConflictStrategy,
        prompter: &mut ScriptedPrompter,
        source: &Path,
        target: &Path,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        MergeSession::new(mode, strategy, prompter, CancelToken::new())
            .merge_file(source, target, &mut report)
            .unwrap();
        report
    }

    fn member_names(text: &str) -> Vec<String> {
        scan("merged.cs", text)
            .members
            .iter()
            .map(|m| m.key().to_string())
            .collect()
    }

    #[test]
    fn analyze_classifies_members() {
        let gen = scan("gen.cs", GEN_MODEL);
        let ex = scan("ex.cs", EXISTING_MODEL);
        let a = analyze(&gen, &ex);

        let names = |keys: &[MemberKey]| -> Vec<String> {
            keys.iter().map(|k| k.name.clone()).collect()
        };
        assert_eq!(names(&a.new), vec!["Phone", "IsActive"]);
        assert_eq!(names(&a.changed), vec!["Name"]);
        assert_eq!(names(&a.unchanged), vec!["Id"]);
        assert_eq!(names(&a.removed), vec!["Notes"]);
        assert_eq!(
            a.new_usings,
            vec!["using System.ComponentModel.DataAnnotations;"]
        );
        assert!(a.conflicts.is_empty());
    }

    #[test]
    fn auto_use_generated_applies_everything_and_keeps_removed() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        let mut p = ScriptedPrompter::default();

        let report = run_merge(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(
            report.files[0].1,
            FileOutcome::Merged {
                added: 2,
                replaced: 1,
                usings_added: 1
            }
        );
        assert!(p.questions.is_empty(), "auto mode never prompts");

        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(merged.contains("StringLength(100)"));
        assert!(merged.contains("using System.ComponentModel.DataAnnotations;"));
        // Members only in the target are never deleted
        assert!(merged.contains("public string Notes"));

        // The merged file still parses, with every member in place
        assert_eq!(
            member_names(&merged),
            vec![
                "property Id",
                "property Name",
                "property Notes",
                "property Phone",
                "property IsActive",
            ]
        );

        // Backup holds the pre-merge bytes
        let backup = std::fs::read_to_string(paths::backup_path(&target)).unwrap();
        assert_eq!(backup, EXISTING_MODEL);
    }

    #[test]
    fn auto_keep_existing_only_adds() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        let mut p = ScriptedPrompter::default();

        let report = run_merge(
            MergeMode::Auto,
            ConflictStrategy::KeepExisting,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(
            report.files[0].1,
            FileOutcome::Merged {
                added: 2,
                replaced: 0,
                usings_added: 1
            }
        );

        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(!merged.contains("StringLength"), "changed member kept as was");
        assert!(merged.contains("public string Phone"));
    }

    #[test]
    fn keep_existing_with_only_changed_members_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let gen = EXISTING_MODEL.replace("[Required]", "[StringLength(50)]");
        let (source, target) = write_pair(dir.path(), &gen, EXISTING_MODEL);
        let mut p = ScriptedPrompter::default();

        let report = run_merge(
            MergeMode::Auto,
            ConflictStrategy::KeepExisting,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(report.files[0].1, FileOutcome::Kept);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), EXISTING_MODEL);
        assert!(!paths::backup_path(&target).exists());
    }

    #[test]
    fn interactive_choices_are_respected() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        // add Phone, skip IsActive, replace Name
        let mut p = ScriptedPrompter::new([Choice::Add, Choice::Skip, Choice::UseGenerated]);

        let report = run_merge(
            MergeMode::Interactive,
            ConflictStrategy::Prompt,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(
            report.files[0].1,
            FileOutcome::Merged {
                added: 1,
                replaced: 1,
                usings_added: 1
            }
        );
        assert_eq!(
            p.questions,
            vec![
                "add property Phone?",
                "add property IsActive?",
                "replace property Name?",
            ]
        );
        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(merged.contains("StringLength(100)"));
        assert!(merged.contains("public string Phone"));
        assert!(!merged.contains("IsActive"));
    }

    #[test]
    fn view_choices_show_and_ask_again() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        // Phone: view full, then add; IsActive: skip; Name: view diff, then keep
        let mut p = ScriptedPrompter::new([
            Choice::ViewFull,
            Choice::Add,
            Choice::Skip,
            Choice::ViewDiff,
            Choice::KeepExisting,
        ]);

        let report = run_merge(
            MergeMode::Interactive,
            ConflictStrategy::Prompt,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(
            report.files[0].1,
            FileOutcome::Merged {
                added: 1,
                replaced: 0,
                usings_added: 1
            }
        );
        assert_eq!(p.questions.len(), 5, "view answers re-ask the same question");
        assert!(p
            .shown
            .iter()
            .any(|s| s == "public string Phone { get; set; }"));
        assert!(p
            .shown
            .iter()
            .any(|s| s.contains("+        [StringLength(100)]")));
        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(!merged.contains("StringLength"));
    }

    #[test]
    fn quit_applies_decisions_already_made() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        // accept Phone, quit at IsActive; Name is never asked about
        let mut p = ScriptedPrompter::new([Choice::Add, Choice::Quit]);

        let report = run_merge(
            MergeMode::Interactive,
            ConflictStrategy::Prompt,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(
            report.files[0].1,
            FileOutcome::Merged {
                added: 1,
                replaced: 0,
                usings_added: 1
            }
        );
        assert_eq!(p.questions.len(), 2);
        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(merged.contains("public string Phone"));
        assert!(!merged.contains("IsActive"));
        assert!(!merged.contains("StringLength"));
        assert!(paths::backup_path(&target).exists());
    }

    #[test]
    fn quit_at_the_first_question_keeps_the_file() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        let mut p = ScriptedPrompter::new([Choice::Quit]);

        let report = run_merge(
            MergeMode::Interactive,
            ConflictStrategy::Prompt,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(report.files[0].1, FileOutcome::Kept);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), EXISTING_MODEL);
        assert!(!paths::backup_path(&target).exists());
    }

    #[test]
    fn cancellation_asks_no_questions() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        let mut p = ScriptedPrompter::new([Choice::Add, Choice::Add, Choice::UseGenerated]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut report = MergeReport::default();
        MergeSession::new(MergeMode::Interactive, ConflictStrategy::Prompt, &mut p, cancel)
            .merge_file(&source, &target, &mut report)
            .unwrap();
        assert_eq!(report.files[0].1, FileOutcome::Kept);
        assert!(p.questions.is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), EXISTING_MODEL);
    }

    #[test]
    fn dry_run_reports_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_MODEL, EXISTING_MODEL);
        let mut p = ScriptedPrompter::default();

        let report = run_merge(
            MergeMode::DryRun,
            ConflictStrategy::Prompt,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(
            report.files[0].1,
            FileOutcome::Planned {
                added: 2,
                replaced: 1,
                usings_added: 1
            }
        );
        assert!(p.questions.is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), EXISTING_MODEL);
        assert!(p.shown.iter().any(|s| s.contains("changed property Name")));
    }

    #[test]
    fn whitespace_only_difference_is_identical() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(
            dir.path(),
            "class C\n{\n    void F() { }\n}\n",
            "class C\n{\n    void F()  {  }\n}\n",
        );
        let mut p = ScriptedPrompter::default();

        let report = run_merge(
            MergeMode::Interactive,
            ConflictStrategy::Prompt,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(report.files[0].1, FileOutcome::Identical);
        assert!(p.questions.is_empty());
    }

    #[test]
    fn usings_only_difference_is_added_silently() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(
            dir.path(),
            "using System;\nusing System.Linq;\n\nclass C\n{\n    void F() { }\n}\n",
            "using System;\n\nclass C\n{\n    void F() { }\n}\n",
        );
        let mut p = ScriptedPrompter::new([Choice::Quit]);

        let report = run_merge(
            MergeMode::Interactive,
            ConflictStrategy::Prompt,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(
            report.files[0].1,
            FileOutcome::Merged {
                added: 0,
                replaced: 0,
                usings_added: 1
            }
        );
        assert!(p.questions.is_empty(), "using directives are not prompted for");
        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(merged.contains("using System.Linq;"));
        assert!(paths::backup_path(&target).exists());
    }

    #[test]
    fn duplicate_names_become_conflicts_and_nothing_is_applied() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(
            dir.path(),
            "class C\n{\n    void Log(string m) { }\n    void Log(object m) { }\n}\n",
            "class C\n{\n    void Log(string m) { }\n}\n",
        );
        let mut p = ScriptedPrompter::default();

        let report = run_merge(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.files[0].1, FileOutcome::Kept);
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "class C\n{\n    void Log(string m) { }\n}\n"
        );
        assert!(!paths::backup_path(&target).exists());
    }

    #[test]
    fn new_methods_follow_existing_methods() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(dir.path(), GEN_CONTROLLER, EXISTING_CONTROLLER);
        let mut p = ScriptedPrompter::default();

        run_merge(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            &source,
            &target,
        );
        let merged = std::fs::read_to_string(&target).unwrap();
        assert_eq!(
            member_names(&merged),
            vec!["method Index", "method Edit", "method Details"],
            "the new method lands after the last existing one"
        );
    }

    #[test]
    fn insertion_is_kind_aware() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(
            dir.path(),
            concat!(
                "class C\n{\n",
                "    public int Id { get; set; }\n\n",
                "    public string Name { get; set; }\n\n",
                "    public void A() { }\n\n",
                "    public void B() { }\n",
                "}\n",
            ),
            concat!(
                "class C\n{\n",
                "    public int Id { get; set; }\n\n",
                "    public void A() { }\n",
                "}\n",
            ),
        );
        let mut p = ScriptedPrompter::default();

        run_merge(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            &source,
            &target,
        );
        let merged = std::fs::read_to_string(&target).unwrap();
        assert_eq!(
            member_names(&merged),
            vec!["property Id", "property Name", "method A", "method B"],
            "properties stay ahead of methods"
        );
    }

    #[test]
    fn first_property_lands_before_methods() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(
            dir.path(),
            "class C\n{\n    public int Count { get; set; }\n\n    public void A() { }\n}\n",
            "class C\n{\n    public void A() { }\n}\n",
        );
        let mut p = ScriptedPrompter::default();

        run_merge(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            &source,
            &target,
        );
        let merged = std::fs::read_to_string(&target).unwrap();
        assert_eq!(member_names(&merged), vec!["property Count", "method A"]);
    }

    #[test]
    fn replacement_is_reindented_to_the_target() {
        // Generated code nests under a block namespace (8 spaces); the
        // target uses a file-scoped namespace (4 spaces).
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(
            dir.path(),
            GEN_MODEL,
            concat!(
                "using System;\n\n",
                "namespace App.Shared.Models;\n\n",
                "public class Vendor\n",
                "{\n",
                "    public int Id { get; set; }\n\n",
                "    [Required]\n",
                "    public string Name { get; set; }\n",
                "}\n",
            ),
        );
        let mut p = ScriptedPrompter::default();

        run_merge(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            &source,
            &target,
        );
        let merged = std::fs::read_to_string(&target).unwrap();
        assert!(
            merged.contains("\n    [StringLength(100)]\n    public string Name"),
            "continuation lines re-anchored: {merged}"
        );
        assert!(merged.contains("\n    public string Phone"));
    }

    #[test]
    fn ambiguous_target_is_kept_and_counted() {
        let dir = TempDir::new().unwrap();
        let (source, target) = write_pair(
            dir.path(),
            "class C\n{\n    void F() { }\n}\n",
            "class C { void F() { } /* unterminated\n",
        );
        let mut p = ScriptedPrompter::default();

        let report = run_merge(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            &source,
            &target,
        );
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.files[0].1, FileOutcome::Kept);
        assert!(p.shown.iter().any(|s| s.contains("cannot merge")));
    }

    #[test]
    fn merge_file_requires_an_existing_target() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("gen.cs");
        io::atomic_write(&source, GEN_MODEL.as_bytes()).unwrap();
        let target = dir.path().join("missing.cs");
        let mut p = ScriptedPrompter::default();

        let mut report = MergeReport::default();
        let err = MergeSession::new(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            CancelToken::new(),
        )
        .merge_file(&source, &target, &mut report)
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn merge_entity_only_touches_existing_cs_targets() {
        let dir = TempDir::new().unwrap();
        let cfg = crate::config::RunConfig::resolve(
            dir.path(),
            &crate::config::FileConfig::default(),
            "Vendor",
            &crate::config::FlagOverrides::default(),
        )
        .unwrap();
        let gen = paths::generated_dir(&cfg.output_root, "Vendor");
        io::atomic_write(&gen.join("Models/Vendor.cs"), GEN_MODEL.as_bytes()).unwrap();
        // New controller and view: deploy's job, not merge's
        io::atomic_write(
            &gen.join("Controllers/VendorController.cs"),
            GEN_CONTROLLER.as_bytes(),
        )
        .unwrap();
        io::atomic_write(
            &gen.join("Views/Vendor/Index.cshtml"),
            b"<h1>Vendors</h1>\n",
        )
        .unwrap();
        io::atomic_write(&gen.join("CONVERSION.md"), b"# notes\n").unwrap();
        io::atomic_write(
            &cfg.shared_root.join("Models/Vendor.cs"),
            EXISTING_MODEL.as_bytes(),
        )
        .unwrap();

        let mut p = ScriptedPrompter::default();
        let report = MergeSession::new(
            MergeMode::Auto,
            ConflictStrategy::UseGenerated,
            &mut p,
            CancelToken::new(),
        )
        .merge_entity(&cfg)
        .unwrap();

        assert_eq!(report.files.len(), 1, "only the existing model is merged");
        assert!(report.files[0].0.ends_with("Models/Vendor.cs"));
        assert!(matches!(report.files[0].1, FileOutcome::Merged { .. }));
        assert!(
            !cfg.api_root.join("Controllers/VendorController.cs").exists(),
            "merge never places new files"
        );
    }

    #[test]
    fn rebuild_usings_groups_system_first() {
        let existing = vec![
            "using Microsoft.AspNetCore.Mvc;".to_string(),
            "using System;".to_string(),
        ];
        let generated = vec![
            "using System.Linq;".to_string(),
            "using App.Shared.Models;".to_string(),
        ];
        let block = rebuild_usings(&existing, &generated);
        assert_eq!(
            block,
            "using System;\nusing System.Linq;\nusing App.Shared.Models;\nusing Microsoft.AspNetCore.Mvc;\n"
        );
    }

    #[test]
    fn apply_edits_keeps_offsets_straight() {
        let text = "abc DEF ghi";
        let edits = vec![
            Edit {
                span: 4..7,
                text: "def".to_string(),
                seq: 0,
            },
            Edit {
                span: 11..11,
                text: " jkl".to_string(),
                seq: 1,
            },
            Edit {
                span: 11..11,
                text: " mno".to_string(),
                seq: 2,
            },
        ];
        assert_eq!(apply_edits(text, edits), "abc def ghi jkl mno");
    }
}
