//! Generate or validate FSG tickets offline, and pack seed files.
//!
//! Usage:
//!   fsg-ticket generate --cat 7 --key key.bin --salt salt.txt [--seed 42] [--time N] [--profile high]
//!   fsg-ticket validate --ticket 4-... --key key.bin [--salt salt.txt] [--seed 42] [--seeds DIR]
//!   fsg-ticket pack --url URL --name NAME --output 007.seeds.gz seeds.tsv ...
//!
//! `validate` exits with status 127 when the ticket is invalid or expired.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::SystemTime,
};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use fsg_tickets::{
    load_seed_file, load_seed_list, pack_seed_file, seal_ticket,
    seedfile::write_seed_file,
    ticket::live_remaining,
    CatalogLoader, CategoryNumber, Item, KeyMaterial, Period, PeriodWindows, RateLimitConfig,
    RateLimiter, SecurityProfile, SeedDirLoader, TicketVerifier, Timestamp, Verdict,
    DEFAULT_DEAD_SECS, DEFAULT_LIVE_SECS, MAX_SALT_LEN, MIN_SALT_LEN,
};
use tracing::Level;

const INVALID_EXIT: u8 = 127;
const KEY_LENS: [usize; 3] = [16, 24, 32];

#[derive(Parser, Debug)]
#[command(name = "fsg-ticket")]
#[command(about = "Generate or validate a FSG ticket. Primarily used for offline verification.")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a ticket for a given seed
    Generate(GenerateArgs),
    /// Check a ticket against a claimed seed
    Validate(ValidateArgs),
    /// Pack seed lists into a seed file, or print them
    Pack(PackArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// The seed to put in the ticket
    #[arg(long, default_value_t = 404, allow_negative_numbers = true)]
    seed: i64,

    /// The category that seed falls into (0-225)
    #[arg(long)]
    cat: u16,

    /// Issuance time in 1/8ths of a second since 2021-01-01 UTC; defaults to now
    #[arg(long)]
    time: Option<u32>,

    /// Secret key: a file (raw or hex) or a hex string of 16, 24 or 32 bytes
    #[arg(long)]
    key: String,

    /// Salt: a file (raw or hex), a hex string, or text of 24-64 bytes
    #[arg(long)]
    salt: String,

    /// Security profile; defaults to the strongest the key allows
    #[arg(long)]
    profile: Option<SecurityProfile>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// The seed the ticket is claimed to name
    #[arg(long, default_value_t = 404, allow_negative_numbers = true)]
    seed: i64,

    /// The ticket to validate
    #[arg(long)]
    ticket: String,

    /// Secret key: a file (raw or hex) or a hex string
    #[arg(long)]
    key: String,

    /// Salt; without it the ticket can only be checked structurally
    #[arg(long)]
    salt: Option<String>,

    /// The category the seed is claimed to fall into
    #[arg(long)]
    cat: Option<u16>,

    /// Seconds a ticket stays live after creation
    #[arg(long, default_value_t = DEFAULT_LIVE_SECS)]
    live_time: u64,

    /// Seconds until a ticket is fully expired
    #[arg(long, default_value_t = DEFAULT_DEAD_SECS)]
    dead_time: u64,

    /// Directory of NNN.seeds files to check the seed against
    #[arg(long)]
    seeds: Option<PathBuf>,

    /// Validate as of this time (1/8ths of a second since 2021-01-01 UTC)
    #[arg(long)]
    time: Option<u32>,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Locator stored in the output file
    #[arg(long)]
    url: Option<String>,

    /// Display name stored in the output file
    #[arg(long)]
    name: Option<String>,

    /// Where to write the packed file (.gz compresses)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Existing packed seed file to merge in
    #[arg(long)]
    input: Option<PathBuf>,

    /// Text files with one seed per line (.gz allowed)
    #[arg(value_name = "TSV")]
    seeds: Vec<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Generate(args) => generate(&args),
        Command::Validate(args) => validate(&args),
        Command::Pack(args) => pack(args),
    }
}

fn decode_hex_text(raw: &[u8]) -> Option<Vec<u8>> {
    std::str::from_utf8(raw).ok().and_then(|s| hex::decode(s.trim()).ok())
}

fn read_key(arg: &str) -> anyhow::Result<Vec<u8>> {
    let path = Path::new(arg);
    if path.is_file() {
        let raw = std::fs::read(path).with_context(|| format!("reading key file {arg}"))?;
        if let Some(decoded) = decode_hex_text(&raw).filter(|k| KEY_LENS.contains(&k.len())) {
            return Ok(decoded);
        }
        if KEY_LENS.contains(&raw.len()) {
            return Ok(raw);
        }
    } else if let Some(decoded) = hex::decode(arg.trim()).ok().filter(|k| KEY_LENS.contains(&k.len())) {
        return Ok(decoded);
    }
    bail!("an invalid key was given: it must be a file or hex string, and either 16, 24 or 32 bytes long")
}

fn read_salt(arg: &str) -> anyhow::Result<Vec<u8>> {
    let fits = |s: &[u8]| (MIN_SALT_LEN..=MAX_SALT_LEN).contains(&s.len());
    let path = Path::new(arg);
    if path.is_file() {
        let raw = std::fs::read(path).with_context(|| format!("reading salt file {arg}"))?;
        if let Some(decoded) = decode_hex_text(&raw).filter(|s| fits(s)) {
            return Ok(decoded);
        }
        if fits(&raw) {
            return Ok(raw);
        }
    } else {
        if let Some(decoded) = hex::decode(arg.trim()).ok().filter(|s| fits(s)) {
            return Ok(decoded);
        }
        if fits(arg.as_bytes()) {
            return Ok(arg.as_bytes().to_vec());
        }
    }
    bail!("an invalid salt was given: it must be a file or string between {MIN_SALT_LEN} and {MAX_SALT_LEN} bytes")
}

fn profile_for(key: &[u8]) -> anyhow::Result<SecurityProfile> {
    SecurityProfile::for_key_len(key.len()).with_context(|| format!("no profile uses a {}-byte key", key.len()))
}

fn timestamp_or_now(time: Option<u32>) -> anyhow::Result<Timestamp> {
    Ok(match time {
        Some(t) => Timestamp(t),
        None => Timestamp::now()?,
    })
}

fn format_time(t: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(t).format("%Y/%m/%d %H:%M UTC").to_string()
}

fn generate(args: &GenerateArgs) -> anyhow::Result<ExitCode> {
    let key = read_key(&args.key)?;
    let salt = read_salt(&args.salt)?;
    let profile = match args.profile {
        Some(p) => p,
        None => profile_for(&key)?,
    };
    let keys = KeyMaterial::initialize(profile, Some(key), Some(salt))?;
    let category = CategoryNumber::new(args.cat)?;
    let timestamp = timestamp_or_now(args.time)?;

    let ticket = seal_ticket(&keys, profile, Item::from_i64(args.seed), category.get(), timestamp)?;
    println!("Here is a ticket for seed {}:", args.seed);
    println!(" TICKET: {ticket}");
    Ok(ExitCode::SUCCESS)
}

fn validate(args: &ValidateArgs) -> anyhow::Result<ExitCode> {
    let key = read_key(&args.key)?;
    let profile = profile_for(&key)?;
    let keys = match &args.salt {
        Some(s) => KeyMaterial::initialize(profile, Some(key), Some(read_salt(s)?))?,
        None => KeyMaterial::verify_only(profile, key)?,
    };
    let claimed_category = args.cat.map(CategoryNumber::new).transpose()?;
    let catalog = args
        .seeds
        .as_ref()
        .map(|dir| SeedDirLoader::new(dir).load())
        .transpose()?
        .map(Arc::new);
    let windows = PeriodWindows::from_secs(args.live_time, args.dead_time)?;
    let now = timestamp_or_now(args.time)?;

    let verifier = TicketVerifier::new(
        Arc::new(keys),
        catalog,
        Arc::new(RateLimiter::<()>::new(RateLimitConfig::unlimited())),
        windows,
    );
    let result = verifier.verify(&(), args.ticket.trim(), Item::from_i64(args.seed), claimed_category, now);

    let ticket = match &result.ticket {
        Some(t) if result.is_accepted() => t,
        _ => {
            println!("The ticket is INVALID/EXPIRED!");
            println!("  TICKET: {}", args.ticket);
            if let Some(failure) = result.failure {
                println!("  REASON: {failure}");
            }
            return Ok(ExitCode::from(INVALID_EXIT));
        }
    };

    match result.period {
        Period::Live => {
            println!("The ticket is LIVE, and could be a viable record if submitted for validation.");
            if let Some(left) = live_remaining(ticket.timestamp, now, &windows) {
                let s = left.as_secs();
                println!(
                    " EXPIRES: In {} hours, {} minutes, and {} seconds.",
                    s / 3600,
                    (s / 60) % 60,
                    s % 60
                );
            }
        }
        Period::Dead => {
            println!("The ticket is DEAD; if it was not submitted for verification while it was live, it is invalid.");
            println!("    TIME: {}", format_time(ticket.timestamp.to_system_time()));
        }
        Period::Invalid => {}
    }
    println!("  TICKET: {}", args.ticket);
    println!("    SEED: {}", ticket.item);
    println!("     CAT: {}", ticket.category);
    if result.verdict == Verdict::StructuralOnly {
        println!(" WARNING: No value for the salt was provided, so this could be a forged ticket.");
    }
    Ok(ExitCode::SUCCESS)
}

fn pack(args: PackArgs) -> anyhow::Result<ExitCode> {
    let mut url = args.url;
    let mut name = args.name;
    let mut seeds = Vec::new();

    if let Some(input) = &args.input {
        let unpacked = load_seed_file(input, true)
            .with_context(|| format!("could not read the input seed file {}", input.display()))?;
        url = url.or(Some(unpacked.locator));
        name = name.or(Some(unpacked.display_name));
        seeds.extend(unpacked.items);
    }
    for path in &args.seeds {
        match load_seed_list(path) {
            Ok(items) => seeds.extend(items),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable seed list"),
        }
    }
    seeds.sort_unstable();
    seeds.dedup();

    if let Some(output) = &args.output {
        let (Some(url), Some(name)) = (url.as_deref(), name.as_deref()) else {
            bail!("when writing to a file, both --url and --name are mandatory");
        };
        let packed = pack_seed_file(url, name, &seeds, true)?;
        write_seed_file(output, &packed)?;
        println!("Wrote {} seeds to {}", seeds.len(), output.display());
    } else {
        if let Some(url) = &url {
            println!("# url: {url}");
        }
        if let Some(name) = &name {
            println!("# name: {name}");
        }
        for seed in &seeds {
            println!("{seed}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn key_from_hex_string() {
        let hex_key = "00".repeat(31) + "ff";
        let key = read_key(&hex_key).unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(key[31], 0xff);
        assert!(read_key("abcd").is_err());
        assert!(read_key("not a key").is_err());
    }

    #[test]
    fn key_from_file_raw_or_hex() {
        let dir = tempfile::tempdir().unwrap();
        let raw = write(&dir, "raw.key", &[0xfe; 16]);
        assert_eq!(read_key(&raw).unwrap(), vec![0xfe; 16]);

        let text = write(&dir, "hex.key", format!("{}\n", "3a".repeat(24)).as_bytes());
        assert_eq!(read_key(&text).unwrap(), vec![0x3a; 24]);

        let short = write(&dir, "short.key", &[1; 20]);
        assert!(read_key(&short).is_err());
    }

    #[test]
    fn salt_from_text_hex_or_file() {
        let text = "correct horse battery staple";
        assert_eq!(read_salt(text).unwrap(), text.as_bytes());

        let hex_salt = "c3".repeat(32);
        assert_eq!(read_salt(&hex_salt).unwrap(), vec![0xc3; 32]);

        let dir = tempfile::tempdir().unwrap();
        let raw = write(&dir, "salt.bin", &[0x80; 40]);
        assert_eq!(read_salt(&raw).unwrap(), vec![0x80; 40]);
        let hexed = write(&dir, "salt.hex", "5c".repeat(24).as_bytes());
        assert_eq!(read_salt(&hexed).unwrap(), vec![0x5c; 24]);

        assert!(read_salt("too short").is_err());
        assert!(read_salt(&"x".repeat(MAX_SALT_LEN + 1)).is_err());
    }
}
