//! setdata CLI - Inspect and convert game set files.

mod config;

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use setdata::formats::{load_file, save_file, LoadOptions, Loaded, SetFormat};
use setdata::interchange;
use setdata::template::Templates;
use setdata::Result;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_DATE: &str = env!("SETDATA_BUILD_DATE");

/// Command line after global flags and `--key value` options are pulled out
#[derive(Debug, Default)]
struct Args {
    positional: Vec<String>,
    options: BTreeMap<String, String>,
    flags: Vec<String>,
}

impl Args {
    fn parse(raw: &[String]) -> Self {
        let mut args = Args::default();
        let mut iter = raw.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--format" | "-f" | "--from" | "--to" | "--templates" | "-t" | "--config" => {
                    let key = match arg.as_str() {
                        "-f" => "--format",
                        "-t" => "--templates",
                        other => other,
                    };
                    if let Some(value) = iter.next() {
                        args.options.insert(key.to_string(), value.clone());
                    } else {
                        args.flags.push(key.to_string());
                    }
                }
                s if s.starts_with('-') && s.len() > 1 => args.flags.push(s.to_string()),
                _ => args.positional.push(arg.clone()),
            }
        }
        args
    }

    fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    fn flag(&self, names: &[&str]) -> bool {
        self.flags.iter().any(|f| names.contains(&f.as_str()))
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let level = if args.flag(&["-q", "--quiet"]) {
        "error"
    } else if args.flag(&["-vv", "--trace"]) {
        "trace"
    } else if args.flag(&["-v", "--verbose"]) {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("setdata={level},setdata_cli={level}")));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = Args::parse(&raw);
    init_logging(&args);

    if args.flag(&["-V", "--version"]) {
        println!("setdata {} (built {})", VERSION, BUILD_DATE);
        return;
    }
    if args.positional.is_empty() || args.flag(&["-h", "--help"]) {
        print_help();
        return;
    }

    let config = match Config::load(args.option("--config").map(Path::new)) {
        Ok(c) => c,
        // `config` may be creating the file
        Err(setdata::Error::FileNotFound(_)) if args.positional[0] == "config" => Config::default(),
        Err(e) => {
            eprintln!("Failed to read config: {}", e);
            std::process::exit(1);
        }
    };
    debug!(?config, "loaded config");

    let result = match args.positional[0].as_str() {
        "info" | "i" => {
            require(&args, 2, "setdata-cli info <file> --format <fmt> [--templates <path>]");
            cmd_info(&args, &config, &args.positional[1])
        }
        "convert" | "c" => {
            require(&args, 3, "setdata-cli convert <in> <out> --from <fmt> --to <fmt> [--templates <path>]");
            cmd_convert(&args, &config, &args.positional[1], &args.positional[2])
        }
        "export" | "e" => {
            require(&args, 3, "setdata-cli export <in> <out.json> --format <fmt> [--pretty]");
            cmd_export(&args, &config, &args.positional[1], &args.positional[2])
        }
        "import" | "m" => {
            require(&args, 3, "setdata-cli import <in.json> <out> --format <fmt>");
            cmd_import(&args, &config, &args.positional[1], &args.positional[2])
        }
        "templates" | "t" => {
            let path = args
                .positional
                .get(1)
                .map(PathBuf::from)
                .or_else(|| config.templates.clone());
            match path {
                Some(p) => cmd_templates(&p),
                None => {
                    eprintln!("Error: missing template path");
                    eprintln!("Usage: setdata-cli templates <path>");
                    std::process::exit(1);
                }
            }
        }
        "config" => cmd_config(&args, config),
        "version" => {
            println!("setdata {} (built {})", VERSION, BUILD_DATE);
            Ok(())
        }
        "help" | "h" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn require(args: &Args, count: usize, usage: &str) {
    if args.positional.len() < count {
        eprintln!("Error: missing arguments");
        eprintln!("Usage: {}", usage);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("setdata - Game set file toolkit");
    println!();
    println!("USAGE:");
    println!("    setdata-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info      <file>              Show object counts by type");
    println!("    c, convert   <in> <out>          Convert between formats (--from, --to)");
    println!("    e, export    <in> <out.json>     Export a set as JSON");
    println!("    m, import    <in.json> <out>     Build a set file from JSON");
    println!("    t, templates [path]              List object templates");
    println!("    config                           Save --format/--templates/--best-effort/--pretty as defaults");
    println!("    version                          Show version and build date");
    println!("    h, help                          Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -f, --format <fmt>     Set format: colors, lost_world, forces, heroes, sonic06");
    println!("    -t, --templates <path> Template JSON file or directory");
    println!("    --config <path>        Config file (default: <config dir>/setdata/config.json)");
    println!("    --best-effort          Skip objects that fail to decode");
    println!("    --pretty               Indent exported JSON");
    println!("    -v, --verbose          Show debug output");
    println!("    -vv, --trace           Show trace output (very verbose)");
    println!("    -q, --quiet            Only show errors");
    println!();
    println!("EXAMPLES:");
    println!("    setdata-cli info w1a01_obj.gedit -f forces -t forces.json");
    println!("    setdata-cli convert stage.set stage.json --from colors --to lost_world -t gens");
    println!("    setdata-cli export set.bin set.json -f heroes -t heroes --pretty");
}

/// Resolve a format from an option, falling back to the config default
fn format_arg(args: &Args, config: &Config, key: &str) -> Result<SetFormat> {
    match args.option(key).or_else(|| args.option("--format")) {
        Some(name) => name.parse(),
        None => config
            .format
            .ok_or_else(|| setdata::Error::other(format!("no format given (use {key} or set one in the config)"))),
    }
}

fn templates_arg(args: &Args, config: &Config, format: SetFormat) -> Result<Option<Templates>> {
    let path = args.option("--templates").map(PathBuf::from).or_else(|| config.templates.clone());
    match path {
        Some(p) => {
            let templates = Templates::load(&p)?;
            debug!(path = %p.display(), count = templates.len(), "loaded templates");
            Ok(Some(templates))
        }
        None if format.requires_templates() => Err(setdata::Error::MissingTemplates(format.name())),
        None => Ok(None),
    }
}

fn load_options(args: &Args, config: &Config) -> LoadOptions {
    if args.flag(&["--best-effort"]) || config.best_effort {
        LoadOptions::best_effort()
    } else {
        LoadOptions::default()
    }
}

fn load_input(args: &Args, config: &Config, path: &str, key: &str) -> Result<(SetFormat, Loaded)> {
    let format = format_arg(args, config, key)?;
    let templates = templates_arg(args, config, format)?;
    info!("Loading {} as {}", path, format);
    let loaded = load_file(format, path, templates.as_ref(), &load_options(args, config))?;
    for w in &loaded.warnings {
        debug!("{}", w);
    }
    if !loaded.warnings.is_empty() {
        warn!("{} warning(s) while loading {}", loaded.warnings.len(), path);
    }
    Ok((format, loaded))
}

fn cmd_info(args: &Args, config: &Config, path: &str) -> Result<()> {
    let (format, loaded) = load_input(args, config, path, "--format")?;
    let set = &loaded.set;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for obj in &set.objects {
        *counts.entry(obj.object_type.as_str()).or_default() += 1;
    }

    println!("Set:     {}", set.name);
    println!("Format:  {}", format);
    if let Some(header) = &set.header {
        println!("Header:  {:?}", header);
    }
    if let Some(groups) = &set.group_table {
        println!("Groups:  {} ({} bytes)", groups.count, groups.bytes.len());
    }
    println!();
    println!("Objects:");
    for (ty, count) in &counts {
        println!("  {:<32} {}", ty, count);
    }
    println!();
    println!("Total objects: {}", set.len());
    if !loaded.warnings.is_empty() {
        println!("Warnings: {}", loaded.warnings.len());
    }
    Ok(())
}

fn cmd_convert(args: &Args, config: &Config, input: &str, output: &str) -> Result<()> {
    let (_, loaded) = load_input(args, config, input, "--from")?;
    let to = format_arg(args, config, "--to")?;
    let mut set = loaded.set;
    // The source container header does not apply to a different layout
    set.header = None;
    save_file(to, output, &set)?;
    info!("Wrote {} objects to {} as {}", set.len(), output, to);
    Ok(())
}

fn cmd_export(args: &Args, config: &Config, input: &str, output: &str) -> Result<()> {
    let (_, loaded) = load_input(args, config, input, "--format")?;
    let pretty = args.flag(&["--pretty"]) || config.pretty_json;
    interchange::export_file(output, &loaded.set, pretty)?;
    info!("Exported {} objects to {}", loaded.set.len(), output);
    Ok(())
}

fn cmd_import(args: &Args, config: &Config, input: &str, output: &str) -> Result<()> {
    let format = format_arg(args, config, "--format")?;
    let set = interchange::import_file(input)?;
    save_file(format, output, &set)?;
    info!("Wrote {} objects to {} as {}", set.len(), output, format);
    Ok(())
}

fn cmd_templates(path: &Path) -> Result<()> {
    let templates = Templates::load(path)?;
    println!("Templates: {}", path.display());
    for (name, template) in templates.iter() {
        let params: Vec<String> = template
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.data_type))
            .collect();
        println!("  {:<32} [{}]", name, params.join(", "));
    }
    println!();
    println!("Total templates: {}", templates.len());
    Ok(())
}

fn cmd_config(args: &Args, mut config: Config) -> Result<()> {
    if let Some(name) = args.option("--format") {
        config.format = Some(name.parse()?);
    }
    if let Some(path) = args.option("--templates") {
        config.templates = Some(PathBuf::from(path));
    }
    config.best_effort |= args.flag(&["--best-effort"]);
    config.pretty_json |= args.flag(&["--pretty"]);

    let path = match args.option("--config") {
        Some(p) => PathBuf::from(p),
        None => Config::default_path().ok_or_else(|| setdata::Error::other("no config directory on this system"))?,
    };
    config.save(&path)?;
    println!("Saved {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_parse_args() {
        let args = parse(&["convert", "a.set", "b.gedit", "--from", "colors", "--to", "forces", "-t", "tpl", "-v"]);
        assert_eq!(args.positional, ["convert", "a.set", "b.gedit"]);
        assert_eq!(args.option("--from"), Some("colors"));
        assert_eq!(args.option("--templates"), Some("tpl"));
        assert!(args.flag(&["-v", "--verbose"]));
    }

    #[test]
    fn test_format_fallback() {
        let args = parse(&["info", "x.bin"]);
        let config = Config { format: Some(SetFormat::Heroes), ..Default::default() };
        assert_eq!(format_arg(&args, &config, "--format").unwrap(), SetFormat::Heroes);
        assert!(format_arg(&args, &Config::default(), "--format").is_err());

        let args = parse(&["convert", "a", "b", "--to", "s06", "-f", "lw"]);
        assert_eq!(format_arg(&args, &Config::default(), "--to").unwrap(), SetFormat::Sonic06);
        assert_eq!(format_arg(&args, &Config::default(), "--from").unwrap(), SetFormat::LostWorld);
    }
}
