use crate::settings::Settings;
use anyhow::{bail, Context as AnyhowContext, Result};
use scribe_engine::{DependencyResolver, Scan, SourceDocument, UnparseOptions};
use scribe_tasks::{registry_with, task_groups, PromptSection, TaskGroup};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ScanRequest {
    pub file: PathBuf,
    pub strip_markers: bool,
    pub json: bool,
}

pub struct UnparseRequest {
    pub file: PathBuf,
    pub entity: Option<String>,
    pub drop_markers: bool,
    pub drop_implementation: bool,
    pub keep: Vec<String>,
    pub with_imports: bool,
    pub include_ancestor: bool,
}

pub struct IntegrateRequest {
    pub file: PathBuf,
    pub response: PathBuf,
    pub group: Option<String>,
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct GroupOutput {
    group: String,
    sections: Vec<PromptSection>,
}

fn load(file: &Path) -> Result<SourceDocument> {
    SourceDocument::from_file(file).with_context(|| format!("Failed to load {}", file.display()))
}

fn scan_groups(
    settings: &Settings,
    doc: &mut SourceDocument,
    strip_markers: bool,
) -> Result<(Scan, Vec<TaskGroup>)> {
    let registry = registry_with(&settings.engine)?;
    let scan = registry
        .parse(doc, strip_markers)
        .context("Directive detection failed")?;
    let resolver = DependencyResolver::new(settings.engine.resolver);
    let groups = task_groups(&scan, doc, &resolver)?;
    Ok((scan, groups))
}

/// Detect, group and print the prompt sections of every group
pub fn scan(settings: &Settings, request: &ScanRequest) -> Result<String> {
    let mut doc = load(&request.file)?;
    let strip = request.strip_markers || settings.engine.strip_markers;
    let (scan, groups) = scan_groups(settings, &mut doc, strip)?;

    if groups.is_empty() {
        log::info!("No directive detected in {}", request.file.display());
        return Ok(if request.json || settings.json {
            "[]".to_string()
        } else {
            "No directive detected.".to_string()
        });
    }

    let mut outputs = Vec::with_capacity(groups.len());
    for group in &groups {
        for task in group.tasks() {
            for diagnostic in task.diagnostics() {
                log::warn!(
                    "{}: unresolved hint {}: {}",
                    task.name(),
                    diagnostic.reference,
                    diagnostic.message
                );
            }
        }
        outputs.push(GroupOutput {
            group: group.name().to_string(),
            sections: group.prompt_sections(&scan, &doc)?,
        });
    }

    if strip {
        doc.save(&request.file)?;
    }

    if request.json || settings.json {
        return Ok(serde_json::to_string_pretty(&outputs)?);
    }
    Ok(render_text(&outputs))
}

fn render_text(outputs: &[GroupOutput]) -> String {
    let mut out = String::new();
    for output in outputs {
        let _ = writeln!(out, "# Group {}", output.group);
        for section in &output.sections {
            let _ = writeln!(out, "\n## {} ({} {})", section.title, section.kind, section.name);
            let _ = writeln!(out, "{}", section.requirement.trim_end());
            let _ = writeln!(out, "\n```python\n{}\n```", section.context);
            if !section.dependencies.is_empty() {
                let _ = writeln!(
                    out,
                    "\nBelow are snippets of code in the current project that you may find useful:"
                );
                for dependency in &section.dependencies {
                    let _ = writeln!(out, "```python\n{}\n```", dependency.code);
                }
            }
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Render one entity, or the whole file, with the requested transformations
pub fn unparse(settings: &Settings, request: &UnparseRequest) -> Result<String> {
    let doc = load(&request.file)?;
    let opts = UnparseOptions::default()
        .drop_markers(request.drop_markers)
        .drop_implementation(request.drop_implementation)
        .keep_implementation(request.keep.iter().map(String::as_str))
        .with_imports(request.with_imports)
        .include_ancestor(request.include_ancestor)
        .prefix(settings.engine.prefix.as_str());
    let code = match &request.entity {
        Some(name) => doc.get_entity(name, &opts)?,
        None => doc.render(&opts)?,
    };
    Ok(code)
}

/// Splice a response into the selected groups and save the result
pub fn integrate(settings: &Settings, request: &IntegrateRequest) -> Result<PathBuf> {
    let response = fs::read_to_string(&request.response)
        .with_context(|| format!("Failed to read response {}", request.response.display()))?;
    let mut doc = load(&request.file)?;
    let (mut scan, groups) = scan_groups(settings, &mut doc, settings.engine.strip_markers)?;

    let selected: Vec<&TaskGroup> = match &request.group {
        Some(name) => groups.iter().filter(|g| g.name() == name).collect(),
        None => groups.iter().collect(),
    };
    if selected.is_empty() {
        match &request.group {
            Some(name) => bail!("No task group named '{name}'"),
            None => bail!("No directive detected in {}", request.file.display()),
        }
    }

    for group in selected {
        group
            .integrate(&mut scan, &mut doc, &response)
            .with_context(|| format!("Failed to integrate group '{}'", group.name()))?;
    }

    let target = request.output.clone().unwrap_or_else(|| request.file.clone());
    doc.save(&target)?;
    Ok(target)
}
