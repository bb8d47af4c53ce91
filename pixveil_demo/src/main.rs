use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::Env;
use hex::{FromHex, encode as hex_encode};
use image::RgbImage;
use log::{LevelFilter, debug, info, warn};
use pixveil_core::{
    ArtifactStore, JsonFileStore, MaskKey, MaskMode, PipelineConfig, PixelBuffer, VeilSession,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "pixveil",
    author,
    version,
    about = "Reversible image obfuscation: mask, noise, shuffle and channel rotation"
)]
struct Cli {
    #[arg(long, global = true)]
    debug: bool,
    /// JSON file with operation, key, noise_level and shift_amount.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// add, multiply or swap.
    #[arg(long, global = true)]
    operation: Option<MaskMode>,
    /// Integer key, or x1,y1,x2,y2 for swap.
    #[arg(long, global = true, allow_hyphen_values = true)]
    key: Option<MaskKey>,
    #[arg(long, global = true, value_name = "N")]
    noise_level: Option<i64>,
    #[arg(long, global = true, value_name = "N", allow_hyphen_values = true)]
    shift: Option<i64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obfuscate an image and write the noise and shuffle artifacts.
    Encrypt {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        #[arg(long, value_name = "FILE", default_value = "noise.json")]
        noise_out: PathBuf,
        #[arg(long, value_name = "FILE", default_value = "shuffle.json")]
        shuffle_out: PathBuf,
        /// Derive artifacts from this seed instead of the OS RNG (prefix hex: for raw bytes).
        #[arg(long)]
        seed: Option<String>,
    },
    /// Restore an image obfuscated by `encrypt`.
    Decrypt {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        #[arg(long, value_name = "FILE", default_value = "noise.json")]
        noise: PathBuf,
        #[arg(long, value_name = "FILE", default_value = "shuffle.json")]
        shuffle: PathBuf,
    },
    /// Compare an original image with a restored one.
    Verify {
        #[arg(long, value_name = "FILE")]
        original: PathBuf,
        #[arg(long, value_name = "FILE")]
        restored: PathBuf,
    },
    /// Print the effective configuration as JSON.
    ShowConfig {
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Round-trip a synthetic gradient in memory.
    Demo {
        #[arg(long, default_value_t = 4)]
        height: usize,
        #[arg(long, default_value_t = 6)]
        width: usize,
        #[arg(long, default_value = "pixveil-demo-seed")]
        seed: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let config = resolve_config(&cli)?;
    debug!("effective config {:?}", config);
    match cli.command {
        Commands::Encrypt {
            input,
            out,
            noise_out,
            shuffle_out,
            seed,
        } => cmd_encrypt(config, input, out, noise_out, shuffle_out, seed),
        Commands::Decrypt {
            input,
            out,
            noise,
            shuffle,
        } => cmd_decrypt(config, input, out, noise, shuffle),
        Commands::Verify { original, restored } => cmd_verify(original, restored),
        Commands::ShowConfig { out } => cmd_show_config(config, out),
        Commands::Demo {
            height,
            width,
            seed,
        } => cmd_demo(config, height, width, seed),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

/// Defaults, then the optional config file, then individual flags.
fn resolve_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_json(path, "config")?,
        None => PipelineConfig::default(),
    };
    if let Some(operation) = cli.operation {
        config.operation = operation;
    }
    if let Some(key) = cli.key {
        config.key = key;
    }
    if let Some(level) = cli.noise_level {
        config.noise_level = level;
    }
    if let Some(shift) = cli.shift {
        config.shift_amount = shift;
    }
    config
        .validate()
        .with_context(|| format!("invalid configuration {config:?}"))?;
    Ok(config)
}

fn cmd_encrypt(
    config: PipelineConfig,
    input: PathBuf,
    out: PathBuf,
    noise_out: PathBuf,
    shuffle_out: PathBuf,
    seed: Option<String>,
) -> Result<()> {
    if !is_lossless(&out) {
        bail!(
            "{} is not a lossless format; use .png or .bmp so the image can be restored",
            out.display()
        );
    }
    let buffer = load_image(&input)?;
    let mut session = VeilSession::new(config)?;
    if let Some(seed) = seed {
        session = session.with_seed(parse_seed(&seed)?);
    }
    let mut store = JsonFileStore::new(&noise_out, &shuffle_out);
    println!(
        "Encrypting {}x{} image with {} key {} (noise level {}, shift {}).",
        buffer.width(),
        buffer.height(),
        config.operation,
        config.key,
        config.noise_level,
        config.shift_amount
    );
    let encoded = session.encode(buffer)?;
    debug!("encode trace {:?}", encoded.report.trace);
    // Artifacts are only replaced once the image they belong to is on disk.
    save_image(&out, &encoded.buffer)?;
    store
        .save_artifacts(&encoded.noise, &encoded.permutation)
        .context("writing noise and shuffle artifacts")?;
    println!("Encrypted image saved to {}", out.display());
    println!("Noise data saved to {}", noise_out.display());
    println!("Shuffle order saved to {}", shuffle_out.display());
    Ok(())
}

fn cmd_decrypt(
    config: PipelineConfig,
    input: PathBuf,
    out: PathBuf,
    noise: PathBuf,
    shuffle: PathBuf,
) -> Result<()> {
    let buffer = load_image(&input)?;
    let session = VeilSession::new(config)?;
    let store = JsonFileStore::new(&noise, &shuffle);
    let (restored, report) = session
        .decode_from(buffer, &store)
        .with_context(|| format!("restoring {}", input.display()))?;
    debug!("decode trace {:?}", report.trace);
    if report.has_fidelity_loss() {
        warn!(
            "restored image is approximate: {} cannot be inverted exactly",
            config.operation
        );
    }
    if !is_lossless(&out) {
        warn!(
            "{} uses a lossy format; saved pixels will differ from the restored buffer",
            out.display()
        );
    }
    save_image(&out, &restored)?;
    println!("Decrypted image saved to {}", out.display());
    Ok(())
}

fn cmd_verify(original: PathBuf, restored: PathBuf) -> Result<()> {
    let a = load_image(&original)?;
    let b = load_image(&restored)?;
    println!("{}: {}", original.display(), digest(&a));
    println!("{}: {}", restored.display(), digest(&b));
    if a.shape() != b.shape() {
        bail!("shape differs: {:?} vs {:?}", a.shape(), b.shape());
    }
    let differing = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .filter(|(x, y)| x != y)
        .count();
    if differing == 0 {
        println!("Images match exactly.");
        Ok(())
    } else {
        bail!("{differing} of {} samples differ", a.as_bytes().len())
    }
}

fn cmd_show_config(config: PipelineConfig, out: Option<PathBuf>) -> Result<()> {
    match out {
        Some(path) => {
            save_json(&path, "config", &config)?;
            println!("Wrote configuration to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

fn cmd_demo(config: PipelineConfig, height: usize, width: usize, seed: String) -> Result<()> {
    let data = (0..height * width * 3)
        .map(|i| (i * 255 / (height * width * 3).max(1)) as u8)
        .collect();
    let original = PixelBuffer::new(height, width, data)?;
    let session = VeilSession::new(config)?.with_seed(parse_seed(&seed)?);
    let encoded = session.encode(original.clone())?;
    debug!(
        "demo artifacts noise={:?} permutation_len={}",
        encoded.noise.shape(),
        encoded.permutation.len()
    );
    let decoded = session
        .pipeline()
        .decode(encoded.buffer.clone(), &encoded.noise, &encoded.permutation)?;
    println!("original : {}", hex_encode(original.as_bytes()));
    println!("encrypted: {}", hex_encode(encoded.buffer.as_bytes()));
    println!("decrypted: {}", hex_encode(decoded.buffer.as_bytes()));
    if decoded.buffer == original {
        info!("demo round trip restored every sample");
    } else {
        warn!("demo round trip was lossy (operation {})", config.operation);
    }
    Ok(())
}

fn load_image(path: &Path) -> Result<PixelBuffer> {
    let rgb = image::open(path)
        .with_context(|| format!("reading image from {}", path.display()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let buffer = PixelBuffer::new(height as usize, width as usize, rgb.into_raw())?;
    Ok(buffer)
}

fn save_image(path: &Path, buffer: &PixelBuffer) -> Result<()> {
    let image = RgbImage::from_raw(
        buffer.width() as u32,
        buffer.height() as u32,
        buffer.as_bytes().to_vec(),
    )
    .context("pixel buffer does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("writing image to {}", path.display()))?;
    Ok(())
}

fn is_lossless(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "bmp"))
        .unwrap_or(false)
}

fn digest(buffer: &PixelBuffer) -> String {
    let mut hasher = blake3::Hasher::new();
    let (height, width, _) = buffer.shape();
    hasher.update(&(height as u64).to_le_bytes());
    hasher.update(&(width as u64).to_le_bytes());
    hasher.update(buffer.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, label: &str) -> Result<T> {
    let data =
        fs::read(path).with_context(|| format!("reading {} from {}", label, path.display()))?;
    let value = serde_json::from_slice(&data)
        .with_context(|| format!("parsing {} from {}", label, path.display()))?;
    Ok(value)
}

fn save_json<T: ?Sized + serde::Serialize>(path: &Path, label: &str, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("writing {} to {}", label, path.display()))?;
    Ok(())
}

fn parse_seed(seed: &str) -> Result<Vec<u8>> {
    if let Some(hex) = seed.strip_prefix("hex:") {
        let bytes = Vec::from_hex(hex.trim())
            .with_context(|| "failed to parse hex-encoded seed".to_string())?;
        Ok(bytes)
    } else {
        Ok(seed.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixveil_core::TransformError;
    use tempfile::tempdir;

    fn gradient() -> PixelBuffer {
        let data = (0..7 * 5 * 3).map(|i| (i * 11 % 256) as u8).collect();
        PixelBuffer::new(7, 5, data).unwrap()
    }

    #[test]
    fn png_roundtrip_through_cli_commands() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("original.png");
        let encrypted = dir.path().join("encrypted.png");
        let decrypted = dir.path().join("decrypted.png");
        let noise = dir.path().join("noise.json");
        let shuffle = dir.path().join("shuffle.json");
        save_image(&original, &gradient()).unwrap();
        let config = PipelineConfig::default().with_shift_amount(2);
        cmd_encrypt(
            config,
            original.clone(),
            encrypted.clone(),
            noise.clone(),
            shuffle.clone(),
            Some("hex:00ff".into()),
        )
        .unwrap();
        cmd_decrypt(config, encrypted, decrypted.clone(), noise, shuffle).unwrap();
        cmd_verify(original, decrypted.clone()).unwrap();
        assert_eq!(load_image(&decrypted).unwrap(), gradient());
    }

    #[test]
    fn encrypt_refuses_lossy_output() {
        let dir = tempdir().unwrap();
        let err = cmd_encrypt(
            PipelineConfig::default(),
            dir.path().join("in.png"),
            dir.path().join("out.jpg"),
            dir.path().join("noise.json"),
            dir.path().join("shuffle.json"),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("lossless"));
    }

    #[test]
    fn failed_image_write_keeps_previous_artifacts() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("original.png");
        let noise = dir.path().join("noise.json");
        let shuffle = dir.path().join("shuffle.json");
        save_image(&original, &gradient()).unwrap();
        fs::write(&noise, "previous noise").unwrap();
        fs::write(&shuffle, "previous shuffle").unwrap();
        let result = cmd_encrypt(
            PipelineConfig::default(),
            original,
            dir.path().join("missing").join("out.png"),
            noise.clone(),
            shuffle.clone(),
            None,
        );
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&noise).unwrap(), "previous noise");
        assert_eq!(fs::read_to_string(&shuffle).unwrap(), "previous shuffle");
    }

    #[test]
    fn unknown_operation_reports_unsupported_mode() {
        let unsupported = TransformError::UnsupportedMode("xor".into()).to_string();
        let err = Cli::try_parse_from(["pixveil", "--operation", "xor", "show-config"])
            .err()
            .unwrap();
        assert!(err.to_string().contains(&unsupported), "{err}");

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"operation":"xor"}"#).unwrap();
        let cli = Cli::parse_from(["pixveil", "--config", path.to_str().unwrap(), "show-config"]);
        let err = resolve_config(&cli).unwrap_err();
        assert!(format!("{err:#}").contains(&unsupported), "{err:#}");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"operation":"multiply","key":3,"noise_level":10}"#).unwrap();
        let cli = Cli::parse_from([
            "pixveil",
            "--config",
            path.to_str().unwrap(),
            "--shift",
            "-2",
            "--noise-level",
            "20",
            "show-config",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.operation, MaskMode::Multiply);
        assert_eq!(config.key, MaskKey::Scalar(3));
        assert_eq!(config.noise_level, 20);
        assert_eq!(config.shift_amount, -2);
    }

    #[test]
    fn swap_flag_requires_coordinates() {
        let cli = Cli::parse_from(["pixveil", "--operation", "swap", "--key", "5", "show-config"]);
        assert!(resolve_config(&cli).is_err());
        let cli = Cli::parse_from([
            "pixveil",
            "--operation",
            "swap",
            "--key",
            "0,0,1,1",
            "show-config",
        ]);
        assert!(resolve_config(&cli).is_ok());
    }

    #[test]
    fn seeds_accept_hex_prefix() {
        assert_eq!(parse_seed("hex:0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(parse_seed("abc").unwrap(), b"abc".to_vec());
        assert!(parse_seed("hex:zz").is_err());
    }
}
