//! citadel-kb: key blob tooling
//!
//! Usage:
//!   citadel-kb enc <cleartext file> <blob file> [OPTIONS]
//!   citadel-kb dec <cleartext file> <blob file> [OPTIONS]
//!   citadel-kb inspect <blob file>

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use citadel_keyblob::{
    inspect, Access, BlobFlags, BlobFormat, CipherContext, Command, CoverMode, EncryptOptions,
    EngineConfig, KbData, Keyblob, LocalTransport, MemoryClass, Permissions, Transport,
    BLOB_OVERHEAD, MAX_KEYBLOB_LEN,
};

const MASTER_KEY_ENV: &str = "CITADEL_KB_MASTER_KEY";

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "enc" => cmd_transform(Command::Encrypt, &args[2..]),
        "dec" => cmd_transform(Command::Decrypt, &args[2..]),
        "inspect" => cmd_inspect(&args[2..]),
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("citadel-kb {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{}'", cmd);
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("citadel-kb: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let log_format = std::env::var("CITADEL_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "citadel_keyblob=info,citadel_kb=info".into());
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"citadel-kb: key blob encapsulation

USAGE:
    citadel-kb <enc|dec> <cleartext file> <blob file> [OPTIONS]
    citadel-kb inspect <blob file>

COMMANDS:
    enc         Generate a key blob from a raw key
    dec         Recover the raw key from a key blob
    inspect     Show blob metadata (no decapsulation)

OPTIONS:
    --keymod <hex>            Key modifier (default: all zero)
    --cover <ecb|ccm>         Covering mode (default: CITADEL_KB_COVER or ecb)
    --format <normal|master|test>
    --secure                  Key resides in secure memory
    --master-key-file <path>  32-byte master key (default: ${}, hex)
    -h, --help                Print help
    -V, --version             Print version

Output files are created exclusively with mode 600.
"#,
        MASTER_KEY_ENV
    );
}

struct Options {
    keymod: Option<Vec<u8>>,
    cover: Option<CoverMode>,
    format: BlobFormat,
    domain: MemoryClass,
    master_key_file: Option<PathBuf>,
}

fn parse_options(args: &[String]) -> CliResult<Options> {
    let mut opts = Options {
        keymod: None,
        cover: None,
        format: BlobFormat::Normal,
        domain: MemoryClass::General,
        master_key_file: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--keymod" => {
                i += 1;
                let v = args.get(i).ok_or("missing keymod")?;
                opts.keymod = Some(hex::decode(v).map_err(|_| "keymod must be hex")?);
            }
            "--cover" => {
                i += 1;
                opts.cover = Some(args.get(i).ok_or("missing cover mode")?.parse()?);
            }
            "--format" => {
                i += 1;
                opts.format = match args.get(i).ok_or("missing format")?.as_str() {
                    "normal" => BlobFormat::Normal,
                    "master" => BlobFormat::Master,
                    "test" => BlobFormat::Test,
                    other => return Err(format!("unknown format: {}", other).into()),
                };
            }
            "--secure" => opts.domain = MemoryClass::Secure,
            "--master-key-file" => {
                i += 1;
                opts.master_key_file =
                    Some(PathBuf::from(args.get(i).ok_or("missing master key path")?));
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    Ok(opts)
}

fn load_context(opts: &Options) -> CliResult<CipherContext> {
    if let Some(path) = &opts.master_key_file {
        let bytes = zeroize::Zeroizing::new(fs::read(path)?);
        return Ok(CipherContext::from_bytes(&bytes)?);
    }
    match std::env::var(MASTER_KEY_ENV) {
        Ok(v) => {
            let bytes = zeroize::Zeroizing::new(
                hex::decode(v.trim()).map_err(|_| format!("{} must be hex", MASTER_KEY_ENV))?,
            );
            Ok(CipherContext::from_bytes(&bytes)?)
        }
        // Test-format blobs never touch the master key.
        Err(_) if opts.format == BlobFormat::Test => Ok(CipherContext::generate()),
        Err(_) => Err(format!("no master key: set {} or --master-key-file", MASTER_KEY_ENV).into()),
    }
}

fn cmd_transform(cmd: Command, args: &[String]) -> CliResult<()> {
    if args.len() < 2 {
        return Err("expected <cleartext file> <blob file>".into());
    }
    let text_path = PathBuf::from(&args[0]);
    let blob_path = PathBuf::from(&args[1]);
    let opts = parse_options(&args[2..])?;

    let config = EngineConfig::from_env()?;
    let keymod = opts
        .keymod
        .clone()
        .unwrap_or_else(|| vec![0u8; config.keymod_len]);
    let max_rawkey_len = config.max_rawkey_len();
    let engine = Arc::new(Keyblob::with_config(load_context(&opts)?, config)?);

    let access = Access::new(Permissions::BLOB, opts.domain);
    let mut options = EncryptOptions::for_domain(opts.domain);
    options.flags = options.flags.with_format(opts.format);
    if let Some(cover) = opts.cover {
        options = options.with_cover(cover);
    }
    let transport = LocalTransport::new(engine, access).with_options(options);

    match cmd {
        Command::Encrypt => {
            let mut text = zeroize::Zeroizing::new(read_bounded(&text_path, max_rawkey_len)?);
            tracing::info!("encrypting {} bytes from {}", text.len(), text_path.display());

            let mut blob = vec![0u8; citadel_keyblob::blob_len(text.len())];
            let mut kb = KbData::for_encrypt(&mut text, &mut blob, &keymod);
            transport.submit(cmd, &mut kb)?;
            let blob_len = kb.keyblob_len;

            write_exclusive(&blob_path, &blob[..blob_len])?;
            tracing::info!("encrypted {} bytes to {}", blob_len, blob_path.display());
        }
        Command::Decrypt => {
            let mut blob = read_bounded(&blob_path, MAX_KEYBLOB_LEN)?;
            if blob.len() < BLOB_OVERHEAD {
                return Err(format!("input from {} is not a key blob", blob_path.display()).into());
            }
            tracing::info!("decrypting {} bytes from {}", blob.len(), blob_path.display());

            let mut text = zeroize::Zeroizing::new(vec![0u8; blob.len() - BLOB_OVERHEAD]);
            let mut kb = KbData::for_decrypt(&mut blob, &mut text, &keymod);
            transport.submit(cmd, &mut kb)?;
            let text_len = kb.rawkey_len;

            write_exclusive(&text_path, &text[..text_len])?;
            tracing::info!("decrypted {} bytes to {}", text_len, text_path.display());
        }
    }

    Ok(())
}

fn cmd_inspect(args: &[String]) -> CliResult<()> {
    let path = args.first().ok_or("missing blob file")?;
    let blob = read_bounded(Path::new(path), MAX_KEYBLOB_LEN)?;
    let info = inspect(&blob).map_err(|_| "not a valid key blob")?;

    println!("Blob: {}", path);
    println!("  Size:        {} bytes", info.blob_len);
    println!("  Key length:  {} bytes", info.key_len);
    let tagging = if info.cover.is_authenticated() {
        "intrinsic tag"
    } else {
        "HMAC tag"
    };
    println!("  Cover:       {} ({})", info.cover, tagging);
    describe_flags(info.flags);
    Ok(())
}

fn describe_flags(flags: BlobFlags) {
    println!("  Flags:       {:#06x}", flags.bits());
    if let Some(format) = flags.format() {
        println!("  Format:      {}", format);
    }
    if let Some(routing) = flags.routing() {
        println!("  K2KR:        {:?}", routing);
    }
    println!("  Trusted key: {}", flags.is_trusted_key());
    println!("  Secure mem:  {}", flags.is_secure_memory());
}

/// Read `path`, refusing files larger than `max` before loading them.
fn read_bounded(path: &Path, max: usize) -> CliResult<Vec<u8>> {
    let too_large = || format!("input from {} cannot exceed {}", path.display(), max);
    if fs::metadata(path)?.len() > max as u64 {
        return Err(too_large().into());
    }
    let data = fs::read(path)?;
    // The file may have grown since the metadata check.
    if data.len() > max {
        return Err(too_large().into());
    }
    Ok(data)
}

fn write_exclusive(path: &Path, data: &[u8]) -> CliResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file: File = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
