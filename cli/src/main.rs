//! waymark CLI - driving adapter for the navigation engine.
//!
//! Subcommands:
//! - `check <sitemap>` - validate a sitemap definition loads without errors
//! - `resolve <sitemap> <fragment>` - resolve a fragment and print the result
//! - `fragment <sitemap> <view> [key=value...]` - build a fragment for a view
//! - `info` - print the pattern grammar and standard page keys

use std::process;
use std::sync::Arc;

use waymark::{
    ConfigLoader, NavigationParams, Sitemap, SitemapConfig, StandardPage, ViewId,
};

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "check" => cmd_check(&args[2..]),
        "resolve" => cmd_resolve(&args[2..]),
        "fragment" => cmd_fragment(&args[2..]),
        "info" => cmd_info(),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("error: unknown command \"{other}\"");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_check(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err("check requires a sitemap definition path".into());
    }

    let sitemap = load_sitemap(&args[0])?;
    println!("Sitemap valid: {} node(s)", sitemap.len());
    for page in StandardPage::ALL {
        if let Some(node) = sitemap.standard_page(page) {
            println!("  {page} -> {}", node.pattern().raw());
        }
    }
    Ok(())
}

fn cmd_resolve(args: &[String]) -> Result<(), String> {
    if args.len() < 2 {
        return Err("resolve requires a sitemap definition path and a fragment".into());
    }

    let sitemap = load_sitemap(&args[0])?;
    let state = sitemap
        .resolve_fragment(&args[1])
        .map_err(|e| e.to_string())?;

    println!("view:     {}", state.view_id());
    println!("pattern:  {}", state.node().pattern().raw());
    println!("access:   {}", state.access_rule());
    println!("fragment: {}", state.fragment());
    for key in state.node().pattern().param_names() {
        match state.params().as_string(key) {
            Some(value) => println!("param:    {key} = \"{value}\""),
            None => println!("param:    {key} (unset)"),
        }
    }
    Ok(())
}

fn cmd_fragment(args: &[String]) -> Result<(), String> {
    if args.len() < 2 {
        return Err("fragment requires a sitemap definition path and a view id".into());
    }

    let sitemap = load_sitemap(&args[0])?;
    let params = parse_params(&args[2..])?;
    let state = sitemap
        .resolve_view(&ViewId::from(args[1].as_str()), params)
        .map_err(|e| e.to_string())?;

    println!("{}", state.fragment());
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Uniform return type for all commands
fn cmd_info() -> Result<(), String> {
    println!("Pattern grammar:");
    println!("  {{name}}        required parameter, default constraint \\w*");
    println!("  {{name:regex}}  parameter with a custom constraint");
    println!("  [...]         optional group, at most one level deep");
    println!("  anything else is literal text");

    println!("\nStandard page keys:");
    for page in StandardPage::ALL {
        println!("  {page}");
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Definition loading
// ═══════════════════════════════════════════════════════════════════════════════

fn load_sitemap(path: &str) -> Result<Arc<Sitemap>, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{path}\": {e}"))?;

    let is_json = std::path::Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config: SitemapConfig = if is_json {
        serde_json::from_str(&content).map_err(|e| format!("JSON parse error: {e}"))?
    } else {
        // Default to YAML (handles .yaml and .yml)
        serde_yaml::from_str(&content).map_err(|e| format!("YAML parse error: {e}"))?
    };

    Sitemap::build_with(&[&ConfigLoader::new(config)]).map_err(|e| format!("sitemap invalid: {e}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Argument parsing
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_params(args: &[String]) -> Result<NavigationParams, String> {
    let mut params = NavigationParams::new();
    for pair in args {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid parameter \"{pair}\", expected key=value"))?;
        params.set(key, value);
    }
    Ok(params)
}

fn print_usage() {
    eprintln!(
        "Usage: waymark <command> [options]

Commands:
  check <sitemap>                          Validate a sitemap definition
  resolve <sitemap> <fragment>             Resolve a fragment
  fragment <sitemap> <view> [key=value...] Build a fragment for a view
  info                                     Print grammar and standard pages
  help                                     Show this help"
    );
}
