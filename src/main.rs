use anyhow::{Context, Result};
use clap::Parser;
use class_scope::analyze::{ClassAnalysis, ClassAnalyzer};
use class_scope::cli::{AnalysisFormat, Cli, Commands, OutputFormat};
use class_scope::config::{RecoveryToolLookup, Settings};
use class_scope::indexer::ClassIndexer;
use class_scope::recover::{RecoveredSource, RecoveryCache, is_error_placeholder};
use class_scope::store::ProjectStore;
use class_scope::toolchain::{JavaToolchain, Toolchain};
use class_scope::unit::normalize_unit_name;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    init_logging();
    let cli = parse_cli()?;

    let settings = Arc::new(Settings::from_env(cli.m2.clone()).context("failed to resolve settings")?);
    let project = resolve_project(&cli)?;
    let store = ProjectStore::open(&project, &settings)
        .with_context(|| format!("cannot use project directory {}", project.display()))?;
    let toolchain: Arc<dyn Toolchain> = Arc::new(JavaToolchain::new(&settings));
    let indexer = ClassIndexer::new(settings.clone(), toolchain.clone());

    match cli.command.clone() {
        Commands::Scan { force } => {
            let summary = indexer
                .scan(&store, force)
                .with_context(|| format!("scan failed for {}", store.project_root().display()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Decompile {
            class_names,
            no_cache,
            format,
            output,
        } => {
            let cache = RecoveryCache::new(
                indexer,
                toolchain,
                RecoveryToolLookup::from_env(cli.cfr.clone()),
            );
            let names: Vec<String> = class_names.iter().map(|n| normalize_unit_name(n)).collect();
            let content = if let [name] = names.as_slice() {
                let start = Instant::now();
                let recovered = cache
                    .recover(&store, name, !no_cache, None)
                    .with_context(|| format!("failed to decompile {name}"))?;
                log::info!("recovered {name} in {} ms", start.elapsed().as_millis());
                render_recovered(&recovered, format)?
            } else {
                let results = cache.recover_many(&store, &names, !no_cache, None);
                let failed = results.values().filter(|text| is_error_placeholder(text)).count();
                if failed > 0 {
                    log::warn!("{failed} of {} classes could not be decompiled", results.len());
                }
                render_batch(&results, format)?
            };
            write_output(&content, output.as_deref())?;
        }
        Commands::Analyze { class_name, format } => {
            let analyzer = ClassAnalyzer::new(indexer, toolchain);
            let name = normalize_unit_name(&class_name);
            let analysis = analyzer
                .describe(&store, &name)
                .with_context(|| format!("failed to analyze {name}"))?;
            let content = match format {
                AnalysisFormat::Json => serde_json::to_string_pretty(&analysis)?,
                AnalysisFormat::Text => render_analysis(&analysis),
            };
            write_output(&content, None)?;
        }
        Commands::Classes { prefix, limit } => {
            let names = indexer.list_all_unit_names(&store)?;
            let listing = filter_classes(names, prefix.as_deref(), limit);
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Commands::Clear => {
            let removed = store
                .clear()
                .with_context(|| format!("failed to remove {}", store.state_dir().display()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&ClearResult {
                    state_dir: store.state_dir().to_string_lossy().into_owned(),
                    removed,
                })?
            );
        }
    }

    Ok(())
}

fn init_logging() {
    let filter_var = if std::env::var_os("CLASS_SCOPE_LOG").is_some() {
        "CLASS_SCOPE_LOG"
    } else {
        "RUST_LOG"
    };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(filter_var, "warn"))
        .target(env_logger::Target::Stderr)
        .init();
}

fn parse_cli() -> Result<Cli> {
    let args: Vec<String> = std::env::args().collect();
    Ok(Cli::parse_from(rewrite_args_for_implicit_decompile(args)))
}

fn rewrite_args_for_implicit_decompile(mut args: Vec<String>) -> Vec<String> {
    if args.len() <= 1 {
        return args;
    }

    let subcommands = ["scan", "decompile", "analyze", "classes", "clear", "help"];
    let valued = ["--project", "--m2", "--cfr"];

    let mut idx = 1usize;
    while idx < args.len() {
        let a = args[idx].as_str();
        if a == "--" {
            idx += 1;
            break;
        }

        if valued.contains(&a) {
            idx += 2;
            continue;
        }

        if valued.iter().any(|flag| a.starts_with(&format!("{flag}="))) {
            idx += 1;
            continue;
        }

        if a.starts_with('-') {
            idx += 1;
            continue;
        }

        break;
    }

    if idx < args.len() {
        let token = args[idx].as_str();
        if !subcommands.contains(&token) {
            args.insert(idx, "decompile".to_string());
        }
    }

    args
}

fn resolve_project(cli: &Cli) -> Result<PathBuf> {
    match cli.project.clone() {
        Some(p) => Ok(p),
        None => std::env::current_dir().context("cannot determine the current directory"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassListing {
    total: usize,
    classes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResult {
    state_dir: String,
    removed: bool,
}

fn filter_classes(names: Vec<String>, prefix: Option<&str>, limit: Option<usize>) -> ClassListing {
    let matching: Vec<String> = names
        .into_iter()
        .filter(|n| prefix.is_none_or(|p| n.starts_with(p)))
        .collect();
    let total = matching.len();
    let classes = match limit {
        Some(n) => matching.into_iter().take(n).collect(),
        None => matching,
    };
    ClassListing { total, classes }
}

fn render_recovered(recovered: &RecoveredSource, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(recovered)?,
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("unit_name: {}\n", recovered.unit_name));
            if let Some(jar) = &recovered.archive_path {
                out.push_str(&format!("archive: {jar}\n"));
            }
            out.push_str(&format!("cache_hit: {}\n", recovered.cache_hit));
            out.push_str(&format!("content_hash: {}\n", recovered.content_hash));
            out.push('\n');
            out.push_str(&recovered.content);
            out
        }
        OutputFormat::Code => recovered.content.clone(),
    })
}

fn render_batch(results: &BTreeMap<String, String>, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(results)?,
        OutputFormat::Text | OutputFormat::Code => {
            let mut out = String::new();
            for (name, content) in results {
                out.push_str(&format!("// ===== {name} =====\n"));
                out.push_str(content);
                if !content.ends_with('\n') {
                    out.push('\n');
                }
            }
            out
        }
    })
}

fn render_analysis(analysis: &ClassAnalysis) -> String {
    let mut out = String::new();
    let qualified = if analysis.package_name.is_empty() {
        analysis.class_name.clone()
    } else {
        format!("{}.{}", analysis.package_name, analysis.class_name)
    };
    let mut header: Vec<&str> = analysis.modifiers.iter().map(String::as_str).collect();
    header.push(&analysis.kind);
    out.push_str(&format!("{} {qualified}\n", header.join(" ").trim_start()));
    if let Some(super_class) = &analysis.super_class {
        out.push_str(&format!("  extends {super_class}\n"));
    }
    if !analysis.interfaces.is_empty() {
        out.push_str(&format!("  implements {}\n", analysis.interfaces.join(", ")));
    }

    if !analysis.fields.is_empty() {
        out.push_str("\nfields:\n");
        for f in &analysis.fields {
            out.push_str(&format!("  {}\n", join_words(&f.modifiers, &[&f.field_type, &f.name])));
        }
    }

    if !analysis.methods.is_empty() {
        out.push_str("\nmethods:\n");
        for m in &analysis.methods {
            let signature = format!("{}({})", m.name, m.parameters.join(", "));
            out.push_str(&format!("  {}\n", join_words(&m.modifiers, &[&m.return_type, &signature])));
        }
    }
    out
}

fn join_words(modifiers: &[String], rest: &[&str]) -> String {
    modifiers
        .iter()
        .map(String::as_str)
        .chain(rest.iter().copied())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use class_scope::analyze::{FieldInfo, MethodInfo};

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rewrite_args_inserts_decompile_after_global_options() {
        let rewritten = rewrite_args_for_implicit_decompile(args(&[
            "class-scope",
            "--cfr",
            "/tmp/cfr.jar",
            "--project=/work/app",
            "org.springframework.stereotype.Component",
            "--no-cache",
        ]));
        assert_eq!(rewritten[1], "--cfr");
        assert_eq!(rewritten[2], "/tmp/cfr.jar");
        assert_eq!(rewritten[3], "--project=/work/app");
        assert_eq!(rewritten[4], "decompile");
        assert_eq!(rewritten[5], "org.springframework.stereotype.Component");
    }

    #[test]
    fn rewrite_args_leaves_explicit_subcommands_alone() {
        let original = args(&["class-scope", "--m2", "/repo", "analyze", "a.B"]);
        assert_eq!(rewrite_args_for_implicit_decompile(original.clone()), original);
        let bare = args(&["class-scope"]);
        assert_eq!(rewrite_args_for_implicit_decompile(bare.clone()), bare);
    }

    #[test]
    fn filter_classes_applies_prefix_then_limit() {
        let names = args(&["a.One", "a.Two", "b.Three", "a.Four"]);
        let listing = filter_classes(names, Some("a."), Some(2));
        assert_eq!(listing.total, 3);
        assert_eq!(listing.classes, vec!["a.One", "a.Two"]);
    }

    #[test]
    fn render_analysis_lists_members() {
        let analysis = ClassAnalysis {
            class_name: "Demo".to_string(),
            package_name: "org.example".to_string(),
            kind: "class".to_string(),
            modifiers: vec!["public".to_string()],
            super_class: Some("org.example.Base".to_string()),
            interfaces: vec![],
            fields: vec![FieldInfo {
                name: "count".to_string(),
                field_type: "int".to_string(),
                modifiers: vec!["private".to_string()],
            }],
            methods: vec![MethodInfo {
                name: "Demo".to_string(),
                return_type: String::new(),
                parameters: vec!["int count".to_string()],
                modifiers: vec!["public".to_string()],
            }],
        };
        let text = render_analysis(&analysis);
        assert!(text.starts_with("public class org.example.Demo\n  extends org.example.Base\n"));
        assert!(text.contains("  private int count\n"));
        assert!(text.contains("  public Demo(int count)\n"));
    }
}
