//! Minimal CLI: load → build → (model | tree)
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use crate::config::Config;
use crate::error::LoadError;
use crate::low::Document;
use crate::model::{Composition, Schema, SchemaBuilder, SchemaProxy};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build the high-level schema model of OpenAPI / JSON Schema documents and print it
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// log build progress (overridden by RUST_LOG)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// build and print the JSON view of the model
    Model(ModelOut),
    /// build and print an outline of the model with source locations
    Tree(TreeOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to the schema inside each document (e.g. /components/schemas/Pet)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is modeled separately
    #[arg(long)]
    jq_expr: Option<String>,

    /// JSON config file (build/emit settings)
    #[arg(long)]
    config: Option<PathBuf>,

    /// worker threads for child fan-out (defaults to available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct ModelOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// levels of nested schemas to materialize
    #[arg(long)]
    depth: Option<usize>,

    /// materialize `$ref` targets instead of printing `$ref` stubs
    #[arg(long, default_value_t = false)]
    expand_refs: bool,

    /// attach `x-origin` pointers to every schema
    #[arg(long, default_value_t = false)]
    origins: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct TreeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// levels of nested schemas to print
    #[arg(long, default_value_t = 4)]
    depth: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn config(&self) -> Result<Config> {
        let mut config = match self.config.as_ref() {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if self.threads.is_some() {
            config.build.threads = self.threads;
        }
        Ok(config)
    }

    fn load_process(&self, mut apply: impl FnMut(&str, Document) -> Result<()>) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let bytes = std::fs::read(&source_path).map_err(|source| LoadError::Io {
                path: source_path.clone(),
                source,
            })?;
            let json_value = crate::path_de::from_slice_with_path::<Value>(&bytes)
                .map_err(LoadError::from)
                .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
            let json_values = match self.jq_expr.as_ref() {
                None => vec![json_value],
                Some(jq_expr) => crate::jq_exec::run_jaq(jq_expr, &json_value).with_context(|| {
                    format!("failed to apply jq expression to source file ({source_path_str})")
                })?,
            };
            for json_value in json_values {
                let document = match self.json_pointer.as_deref() {
                    Some(pointer) => Document::from_value_at(&json_value, pointer)
                        .with_context(|| format!("in source file ({source_path_str})"))?,
                    None => Document::from_value(&json_value),
                };
                apply(&source_path_str, document)?;
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_tracing(&self) {
        let fallback = if self.verbose { "schema_model=debug" } else { "warn" };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Model(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let mut config = target.input_settings.config()?;
                if let Some(depth) = target.depth {
                    config.emit.max_depth = depth;
                }
                config.emit.expand_refs |= target.expand_refs;
                config.emit.origins |= target.origins;

                let mut outputs = Vec::new();
                target.input_settings.load_process(|_, document| {
                    let builder = SchemaBuilder::with_config(&document, &config.build)?;
                    let root = builder.root();
                    outputs.push(crate::emit::emit_proxy(&root, &config.emit));
                    Ok(())
                })?;
                let output = match outputs.len() {
                    1 => outputs.remove(0),
                    _ => Value::Array(outputs),
                };
                let output_src = serde_json::to_string_pretty(&output)?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &output_src)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    println!("{output_src}");
                }
                Ok(())
            }
            Command::Tree(target) => {
                let config = target.input_settings.config()?;
                target.input_settings.load_process(|source, document| {
                    let builder = SchemaBuilder::with_config(&document, &config.build)?;
                    let root = builder.root();
                    let mut out = String::new();
                    render_tree(&mut out, source, &root, 0, target.depth);
                    print!("{out}");
                    tracing::debug!(
                        built = builder.stats().schemas_built(),
                        children = builder.stats().children_dispatched(),
                        "rendered tree"
                    );
                    Ok(())
                })
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn render_tree(out: &mut String, label: &str, proxy: &SchemaProxy<'_>, depth: usize, max_depth: usize) {
    let indent = "  ".repeat(depth);
    let origin = proxy.origin().map(|o| o.to_string()).unwrap_or_default();
    if !proxy.is_present() {
        let _ = writeln!(out, "{indent}{} {} {}", label.bold(), "(empty)".dimmed(), origin.dimmed());
        return;
    }
    if let Some(reference) = proxy.reference() {
        let _ = writeln!(out, "{indent}{} → {} {}", label.bold(), reference.yellow(), origin.dimmed());
        return;
    }
    let schema = proxy.materialize();
    let _ = writeln!(out, "{indent}{} {} {}", label.bold(), describe(schema).cyan(), origin.dimmed());
    if depth >= max_depth {
        return;
    }
    for (name, child) in &schema.properties {
        render_tree(out, name, child, depth + 1, max_depth);
    }
    for keyword in Composition::ALL {
        for (i, child) in schema.composition(keyword).iter().enumerate() {
            render_tree(out, &format!("{}[{i}]", keyword.keyword()), child, depth + 1, max_depth);
        }
    }
}

fn describe(schema: &Schema<'_>) -> String {
    let mut parts = Vec::new();
    if !schema.type_.is_empty() {
        parts.push(schema.type_.join("|"));
    }
    if !schema.format.is_empty() {
        parts.push(format!("<{}>", schema.format));
    }
    if !schema.required.is_empty() {
        parts.push(format!("required={}", schema.required.join(",")));
    }
    if parts.is_empty() {
        parts.push("{}".to_string());
    }
    parts.join(" ")
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tree_stops_at_references() {
        colored::control::set_override(false);
        let source = json!({"components": {"schemas": {"Node": {
            "type": "object",
            "required": ["next"],
            "properties": {"next": {"$ref": "#/components/schemas/Node"}, "any": true},
            "allOf": [{"type": "string", "format": "uuid"}],
        }}}});
        let doc = Document::from_value_at(&source, "/components/schemas/Node").unwrap();
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let mut out = String::new();
        render_tree(&mut out, "Node", &root, 0, 4);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, [
            "Node object required=next #/components/schemas/Node",
            "  next → #/components/schemas/Node #/components/schemas/Node/properties/next",
            "  any (empty) #/components/schemas/Node/properties/any",
            "  allOf[0] string <uuid> #/components/schemas/Node/allOf/0",
        ]);
    }

    #[test]
    fn cli_parses_model_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "schema-model", "model", "-i", "pet.json", "--json-pointer", "/components/schemas/Pet",
            "--depth", "3", "--expand-refs", "--threads", "2",
        ]).unwrap();
        match cli.cmd {
            Command::Model(m) => {
                assert_eq!(m.depth, Some(3));
                assert!(m.expand_refs);
                assert_eq!(m.input_settings.threads, Some(2));
                assert_eq!(m.input_settings.config().unwrap().build.threads, Some(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let paths = resolve_file_path_patterns(["a.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("a.json")]);
        assert!(resolve_file_path_patterns(["/no/such/dir/*.json"]).is_err());
    }
}
