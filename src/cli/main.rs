use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use imgmeta::{Image, TagRow, config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "imgmeta",
    version,
    about = "Show and edit EXIF, IPTC, XMP, comment and ICC metadata of JPEG, PNG and WebP images"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: imgmeta.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default imgmeta.json and exit
    #[arg(long)]
    init: bool,

    /// Display all metadata
    #[arg(long)]
    show: bool,

    /// Output metadata as JSON
    #[arg(long)]
    json: bool,

    /// Print the XMP packet as stored in the file
    #[arg(long = "raw-xmp")]
    raw_xmp: bool,

    /// Set an EXIF tag, e.g. `Exif.Image.Artist=Jane`. An empty value deletes it.
    #[arg(long = "set-exif", value_name = "KEY=VALUE")]
    set_exif: Vec<String>,

    /// Set an IPTC dataset
    #[arg(long = "set-iptc", value_name = "KEY=VALUE")]
    set_iptc: Vec<String>,

    /// Set an XMP property
    #[arg(long = "set-xmp", value_name = "KEY=VALUE")]
    set_xmp: Vec<String>,

    /// Treat IPTC and XMP values as `, `-separated lists
    #[arg(long)]
    array: bool,

    /// Replace the image comment
    #[arg(long, value_name = "TEXT")]
    comment: Option<String>,

    /// Remove one kind of metadata (repeatable)
    #[arg(long, value_enum, value_name = "DOMAIN")]
    clear: Vec<Domain>,

    /// Encoding of tag values (default: from config, else utf-8)
    #[arg(short, long, value_name = "LABEL")]
    encoding: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Domain {
    Exif,
    Iptc,
    Xmp,
    Comment,
    Icc,
    All,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let config = config::Config::load(cli.config.as_deref())?;
    let encoding = cli.encoding.clone().unwrap_or_else(|| config.encoding.clone());

    let edits = Edits::from_cli(&cli)?;
    let show = cli.show || (edits.is_empty() && !cli.json && !cli.raw_xmp);

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }
    log::debug!("Found {} image(s)", images.len());

    let mut json_results = Vec::new();
    let mut failed = 0;

    for image_path in &images {
        let mut img = match Image::open_with(image_path, &config) {
            Ok(img) => img,
            Err(e) => {
                log::error!("{}: {e}", image_path.display());
                failed += 1;
                continue;
            }
        };

        if !edits.is_empty() {
            match edits.apply(&mut img, &encoding) {
                Ok(()) => log::info!("Updated: {}", image_path.display()),
                Err(e) => {
                    log::error!("Failed to update {}: {e:#}", image_path.display());
                    failed += 1;
                }
            }
        }

        if cli.raw_xmp {
            println!("{}", img.read_raw_xmp()?);
        }
        if cli.json {
            json_results.push(metadata_json(image_path, &mut img, &encoding)?);
        } else if show {
            print_metadata(image_path, &mut img, &encoding)?;
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} image(s) failed", images.len());
    }
    Ok(())
}

/// Everything the command line asks to change.
struct Edits {
    exif: Vec<TagRow>,
    iptc: Vec<TagRow>,
    xmp: Vec<TagRow>,
    comment: Option<String>,
    clear: Vec<Domain>,
}

impl Edits {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let hint = if cli.array { imgmeta::rows::ARRAY_HINT } else { "" };
        Ok(Self {
            exif: parse_assignments(&cli.set_exif, "")?,
            iptc: parse_assignments(&cli.set_iptc, hint)?,
            xmp: parse_assignments(&cli.set_xmp, hint)?,
            comment: cli.comment.clone(),
            clear: cli.clear.clone(),
        })
    }

    fn is_empty(&self) -> bool {
        self.exif.is_empty()
            && self.iptc.is_empty()
            && self.xmp.is_empty()
            && self.comment.is_none()
            && self.clear.is_empty()
    }

    fn apply(&self, img: &mut Image, encoding: &str) -> Result<()> {
        for domain in &self.clear {
            let all = *domain == Domain::All;
            if all || *domain == Domain::Exif {
                img.clear_exif().context("clearing EXIF")?;
            }
            if all || *domain == Domain::Iptc {
                img.clear_iptc().context("clearing IPTC")?;
            }
            if all || *domain == Domain::Xmp {
                img.clear_xmp().context("clearing XMP")?;
            }
            if all || *domain == Domain::Comment {
                img.clear_comment().context("clearing the comment")?;
            }
            if all || *domain == Domain::Icc {
                img.clear_icc().context("clearing the ICC profile")?;
            }
        }
        if !self.exif.is_empty() {
            img.modify_exif(&self.exif, encoding).context("writing EXIF")?;
        }
        if !self.iptc.is_empty() {
            img.modify_iptc(&self.iptc, encoding).context("writing IPTC")?;
        }
        if !self.xmp.is_empty() {
            img.modify_xmp(&self.xmp, encoding).context("writing XMP")?;
        }
        if let Some(comment) = &self.comment {
            img.modify_comment(comment, encoding).context("writing the comment")?;
        }
        Ok(())
    }
}

/// Parse `KEY=VALUE` arguments into rows.
fn parse_assignments(args: &[String], type_name: &str) -> Result<Vec<TagRow>> {
    args.iter()
        .map(|arg| {
            let (key, value) = arg
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got `{arg}`"))?;
            Ok(TagRow::new(key.trim(), value, type_name))
        })
        .collect()
}

fn decode(row: &TagRow, encoding: &str) -> String {
    row.decode_value(encoding)
        .unwrap_or_else(|_| String::from_utf8_lossy(&row.value).into_owned())
}

fn rows_json(rows: &[TagRow], encoding: &str) -> serde_json::Value {
    rows.iter()
        .map(|r| {
            serde_json::json!({
                "key": r.key_str(),
                "value": decode(r, encoding),
                "type": r.type_name,
            })
        })
        .collect()
}

fn metadata_json(path: &Path, img: &mut Image, encoding: &str) -> Result<serde_json::Value> {
    let comment = img.read_comment()?;
    let icc = match img.read_icc() {
        Ok(profile) => Some(profile.len()),
        Err(imgmeta::Error::NotPresent(_)) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::json!({
        "path": path.display().to_string(),
        "format": img.kind()?.name(),
        "exif": rows_json(&img.read_exif()?, encoding),
        "iptc": rows_json(&img.read_iptc()?, encoding),
        "xmp": rows_json(&img.read_xmp()?, encoding),
        "comment": String::from_utf8_lossy(&comment),
        "icc_profile_bytes": icc,
    }))
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 60;
/// Indent for continuation lines (key column width + " : " + 2 leading spaces).
const INDENT: &str = "                                           ";

/// Print all metadata of one image, one section per domain.
fn print_metadata(path: &Path, img: &mut Image, encoding: &str) -> Result<()> {
    println!();
    let kind = img.kind()?;
    println!("{BOLD}File:{RESET} {} ({})", path.display(), kind.name());
    println!("{DIM}{}{RESET}", "═".repeat(100));

    print_section("EXIF", &img.read_exif()?, encoding);
    if kind.supports_iptc() {
        print_section("IPTC", &img.read_iptc()?, encoding);
    }
    if kind.supports_xmp() {
        print_section("XMP", &img.read_xmp()?, encoding);
    }

    let comment = img.read_comment()?;
    if !comment.is_empty() {
        println!("  {BOLD}Comment{RESET}");
        println!("  {}", String::from_utf8_lossy(&comment));
        println!();
    }

    match img.read_icc() {
        Ok(profile) => {
            println!("  {BOLD}ICC profile{RESET}: {} bytes", profile.len());
            println!();
        }
        Err(imgmeta::Error::NotPresent(_)) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn print_section(title: &str, rows: &[TagRow], encoding: &str) {
    if rows.is_empty() {
        return;
    }
    println!("  {BOLD}{title}{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(98));
    for row in rows {
        print_row(&row.key_str(), &row.type_name, &decode(row, encoding));
    }
    println!();
}

/// Print a single row in the metadata table.
fn print_row(key: &str, type_name: &str, val: &str) {
    let key_col = format!("{:<28} {DIM}{:<10}{RESET}", key, type_name);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {key_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
