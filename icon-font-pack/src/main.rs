//! binary icon font builder
//!
//! Reads SVG icons from a directory and/or a JSON manifest, builds the icon
//! font package and writes the zip archive and, optionally, the individual
//! files.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use icon_font_pack::{FontConfig, Icon, PackError, Woff2FailurePolicy};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory of `.svg` files; each file stem becomes an icon name
    #[arg(short, long)]
    icons: Option<PathBuf>,

    /// JSON array of icons: `[{"name": ..., "svg": ..., "codepoint": ...}]`
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// JSON font config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    font_name: Option<String>,

    #[arg(long)]
    css_prefix: Option<String>,

    /// Base name of the generated files
    #[arg(long)]
    file_name: Option<String>,

    /// First automatically assigned codepoint, e.g. `0xE001` or `U+E001`
    #[arg(long, value_parser = parse_codepoint)]
    start_codepoint: Option<u32>,

    #[arg(long)]
    font_height: Option<u16>,

    #[arg(long)]
    descent: Option<u16>,

    #[arg(long)]
    fixed_width: bool,

    /// Also produce a WOFF2 font
    #[arg(long)]
    woff2: bool,

    /// Leave WOFF2 out instead of failing if its encoder breaks
    #[arg(long)]
    skip_woff2_failure: bool,

    #[arg(long)]
    font_version: Option<String>,

    /// Reject icons with more than one drawable element
    #[arg(long)]
    strict_glyphs: bool,

    /// Where to write the zip archive; defaults to `<file name>.zip`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write every generated file into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no icons given, use --icons or --manifest")]
    NoInput,
    #[error(transparent)]
    Pack(#[from] PackError),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::NoInput => ExitCode::from(2),
            CliError::Pack(e) if e.is_validation() => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let config = font_config(&args)?;
    let mut icons = Vec::new();
    if let Some(dir) = &args.icons {
        icons.extend(icons_from_dir(dir)?);
    }
    if let Some(path) = &args.manifest {
        icons.extend(read_json::<Vec<Icon>>(path)?);
    }
    if args.icons.is_none() && args.manifest.is_none() {
        return Err(CliError::NoInput);
    }

    let package = icon_font_pack::pack(icons, &config).await?;

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).map_err(io_error(dir))?;
        for asset in package.files.values() {
            let path = dir.join(&asset.file_name);
            std::fs::write(&path, &asset.bytes).map_err(io_error(&path))?;
        }
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&package.archive.file_name));
    std::fs::write(&output, &package.archive.bytes).map_err(io_error(&output))?;
    log::info!("wrote {}", output.display());
    Ok(())
}

fn font_config(args: &Args) -> Result<FontConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => read_json(path)?,
        None => FontConfig::default(),
    };
    let overrides = [
        (&args.font_name, &mut config.font_name),
        (&args.css_prefix, &mut config.css_prefix),
        (&args.file_name, &mut config.file_name),
        (&args.font_version, &mut config.font_version),
    ];
    for (value, field) in overrides {
        if let Some(value) = value {
            field.clone_from(value);
        }
    }
    if let Some(start) = args.start_codepoint {
        config.start_codepoint = start;
    }
    if let Some(height) = args.font_height {
        config.font_height = height;
    }
    if let Some(descent) = args.descent {
        config.descent = descent;
    }
    config.fixed_width |= args.fixed_width;
    config.enable_woff2 |= args.woff2;
    config.strict_glyphs |= args.strict_glyphs;
    if args.skip_woff2_failure {
        config.woff2_failure = Woff2FailurePolicy::Skip;
    }
    Ok(config)
}

/// Every `.svg` file in `dir`, sorted by file name.
fn icons_from_dir(dir: &Path) -> Result<Vec<Icon>, CliError> {
    let mut paths = std::fs::read_dir(dir)
        .map_err(io_error(dir))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(dir))?;
    paths.retain(|path| {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
    });
    paths.sort();

    let mut icons = Vec::with_capacity(paths.len());
    for path in paths {
        let svg = std::fs::read_to_string(&path).map_err(io_error(&path))?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        icons.push(Icon::new(name, svg));
    }
    Ok(icons)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(io_error(path))?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_owned(),
        source,
    })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.to_owned(),
        source,
    }
}

fn parse_codepoint(value: &str) -> Result<u32, String> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix("U+"))
        .or_else(|| value.strip_prefix("u+"));
    match hex {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    }
    .map_err(|e| format!("invalid codepoint '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0xE001", 0xE001)]
    #[case("U+e001", 0xE001)]
    #[case("57345", 0xE001)]
    fn codepoints(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(parse_codepoint(input), Ok(expected));
    }

    #[test]
    fn bad_codepoint() {
        assert!(parse_codepoint("0xZZ").is_err());
    }

    #[test]
    fn icon_dir_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.svg"), "<svg/>").unwrap();
        std::fs::write(dir.path().join("a.SVG"), "<svg/>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let icons = icons_from_dir(dir.path()).unwrap();
        let names: Vec<_> = icons.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"fontName": "FromFile", "cssPrefix": "ff"}"#).unwrap();
        let args = Args::parse_from([
            "icon-font-pack",
            "--config",
            path.to_str().unwrap(),
            "--font-name",
            "FromFlag",
            "--woff2",
        ]);
        let config = font_config(&args).unwrap();
        assert_eq!(config.font_name, "FromFlag");
        assert_eq!(config.css_prefix, "ff");
        assert!(config.enable_woff2);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::NoInput.exit_code(), ExitCode::from(2));
        let validation = CliError::Pack(PackError::Validation(
            icon_font_pack::ValidationError::NoIcons,
        ));
        assert_eq!(validation.exit_code(), ExitCode::from(2));
        assert_eq!(
            CliError::Pack(PackError::Cancelled).exit_code(),
            ExitCode::FAILURE
        );
    }
}
