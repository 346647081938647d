//! Command-line front end for parsing and expanding Wikitext files.

use std::{io::ErrorKind, path::PathBuf};
use wikitext_ast::{
    expand::{AsyncContentProvider, ExpansionOptions, TemplateExpander},
    wikitext::{Parser, ParserOptions, Severity},
};

fn usage<T>(err: &'static str) -> anyhow::Result<T> {
    let exe = std::env::args().next().unwrap_or_default();
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("Usage: {exe} parse [options] <file.wiki>");
    println!("       {exe} expand [options] <file.wiki>\n");
    println!("Options:");
    println!("    --parser-options <file.json>: Parser options");
    println!("    --tree: Print the syntax tree (parse)");
    println!("    --templates <dir>: Template directory, as <dir>/<Name>.wiki (expand)");
    println!("    --options <file.json>: Expansion options (expand)\n");
    Err(anyhow::Error::msg(err))
}

/// Reads templates from files in a directory.
struct DirectoryProvider {
    /// The template directory.
    root: PathBuf,
}

impl DirectoryProvider {
    /// The path of the file for the template with the given name, or `None`
    /// if the name cannot be a file name.
    fn path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            log::warn!("not a template file name: {name:?}");
            return None;
        }
        Some(self.root.join(format!("{name}.wiki")))
    }
}

impl AsyncContentProvider for DirectoryProvider {
    fn fetch(&self, name: &str) -> impl Future<Output = Option<String>> + Send {
        let path = self.path(name);
        async move {
            let path = path?;
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => Some(text),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    log::debug!("no template at {}", path.display());
                    None
                }
                Err(err) => {
                    log::warn!("could not read {}: {err}", path.display());
                    None
                }
            }
        }
    }
}

fn parser_options(path: Option<PathBuf>) -> anyhow::Result<ParserOptions> {
    Ok(match path {
        Some(path) => ParserOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => ParserOptions::default(),
    })
}

fn parse(mut args: pico_args::Arguments) -> anyhow::Result<()> {
    let options = parser_options(args.opt_value_from_str("--parser-options")?)?;
    let tree = args.contains("--tree");
    let Some(path) = args.opt_free_from_str::<PathBuf>()? else {
        return usage("Missing input file");
    };
    if !args.finish().is_empty() {
        return usage("Unknown extra arguments passed");
    }

    let text = std::fs::read_to_string(&path)?;
    let output = Parser::new(options).parse_with_diagnostics(&text);
    for diagnostic in &output.diagnostics {
        eprintln!("{}:{diagnostic}", path.display());
    }

    if tree {
        println!("{:#?}", output.document);
    }

    let errors = output
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Error)
        .count();
    println!(
        "{} blocks, {} diagnostics ({errors} errors)",
        output.document.lines.len(),
        output.diagnostics.len()
    );

    if output.document.to_string() == text {
        println!("Round trip: ok");
        Ok(())
    } else {
        Err(anyhow::Error::msg("Round trip: source text mismatch"))
    }
}

async fn expand(mut args: pico_args::Arguments) -> anyhow::Result<()> {
    let parser_options = parser_options(args.opt_value_from_str("--parser-options")?)?;
    let options = match args.opt_value_from_str::<_, PathBuf>("--options")? {
        Some(path) => ExpansionOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => ExpansionOptions::default(),
    };
    let root = args
        .opt_value_from_str::<_, PathBuf>("--templates")?
        .unwrap_or_else(|| PathBuf::from("."));
    let Some(path) = args.opt_free_from_str::<PathBuf>()? else {
        return usage("Missing input file");
    };
    if !args.finish().is_empty() {
        return usage("Unknown extra arguments passed");
    }

    let text = tokio::fs::read_to_string(&path).await?;
    let expander = TemplateExpander::new(parser_options, options);
    let provider = DirectoryProvider { root };
    let expanded = expander.expand_async(&text, &provider).await?;
    println!("{expanded}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let mut args = pico_args::Arguments::from_env();
    match args.subcommand()?.as_deref() {
        Some("parse") => parse(args),
        Some("expand") => expand(args).await,
        Some(_) => usage("Unknown command"),
        None => usage("Missing command"),
    }
}
