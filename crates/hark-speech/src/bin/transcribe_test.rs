//! Test binary for recognition backends.
//!
//! Usage: transcribe-test <audio.wav> [provider]
//!
//! Credentials are read from the regular hark configuration file.

use std::env;
use std::fs;
use std::time::Instant;

use anyhow::Context;
use hark_core::ConfigManager;
use hark_speech::{Bytes, build_recognizer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <audio.wav> [provider]", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} question.wav watson", args[0]);
        std::process::exit(1);
    }

    let audio_file = &args[1];

    let mut config = ConfigManager::new()?.load()?;
    if let Some(provider) = args.get(2) {
        config.default_stt = provider.clone();
    }

    println!("Reading audio file: {}", audio_file);
    let audio = fs::read(audio_file).with_context(|| format!("Failed to read {}", audio_file))?;
    println!(
        "Audio size: {} bytes ({:.2} KB)",
        audio.len(),
        audio.len() as f64 / 1024.0
    );

    let recognizer = build_recognizer(&config)?;
    println!("Using provider: {}", recognizer.name());

    println!("Sending recognition request...");
    let start = Instant::now();

    let text = recognizer.recognize(Bytes::from(audio)).await?;
    let elapsed = start.elapsed();

    println!();
    println!("Recognition completed in {:.2}s", elapsed.as_secs_f64());
    println!("---");
    println!("{}", text);
    println!("---");

    Ok(())
}
