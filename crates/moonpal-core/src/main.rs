//! moonpal-ritual: drive one bedtime ritual from the terminal.
//!
//! Usage:
//!   cargo run -p moonpal-core --bin moonpal-ritual -- --energy 0.3 --tag 月亮 --speak
//!   cargo run -p moonpal-core --bin moonpal-ritual -- --playback low
//!   cargo run -p moonpal-core --bin moonpal-ritual -- --regenerate all
//!
//! Runs start → energy / tags / note → text → (speech) → complete against the sled store
//! at `storage_path`. User ids starting with `demo-` stay in memory.

use moonpal_core::{
    create_speech_synthesizer, create_text_generator, Arousal, AudioLibrary, MoonpalConfig, RitualOrchestrator,
    SledStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    user: Option<String>,
    child: Option<String>,
    energy: Option<f64>,
    tags: Vec<String>,
    note: Option<String>,
    paid: bool,
    seed: Option<PathBuf>,
    speak: bool,
    playback: Option<String>,
    regenerate: Option<String>,
    help: bool,
}

fn parse_args() -> CliArgs {
    let mut out = CliArgs::default();
    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--user" => out.user = args.next(),
            "--child" => out.child = args.next(),
            "--energy" => {
                if let Some(e) = args.next() {
                    out.energy = e.parse().ok();
                }
            }
            "--tag" => {
                if let Some(t) = args.next() {
                    out.tags.push(t);
                }
            }
            "--note" => out.note = args.next(),
            "--paid" => out.paid = true,
            "--seed" => out.seed = args.next().map(PathBuf::from),
            "--speak" => out.speak = true,
            "--playback" => out.playback = args.next(),
            "--regenerate" => out.regenerate = args.next(),
            "--help" | "-h" => out.help = true,
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
    }
    out
}

fn print_usage() {
    eprintln!("moonpal-ritual: bedtime ritual driver");
    eprintln!("  --user ID            User id (default demo-cli; demo-* stays in memory)");
    eprintln!("  --child ID           Child profile id");
    eprintln!("  --energy F           Energy level 0..1 (default 0.5)");
    eprintln!("  --tag T              Topic tag, repeatable");
    eprintln!("  --note TEXT          Magic note (kept only with --paid)");
    eprintln!("  --paid               Caller is on the paid tier");
    eprintln!("  --seed FILE          Import templates/statements from a TOML seed first");
    eprintln!("  --speak              Synthesize the chosen text");
    eprintln!("  --playback low|mid|high    Print the pre-recorded clip for an arousal");
    eprintln!("  --regenerate low|mid|high|all  Generate and record new clips (needs a text vendor)");
    eprintln!();
    eprintln!("Config: MOONPAL_CONFIG or config/moonpal.toml; LLM_* and TTS_* env vars override.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args();
    if args.help {
        print_usage();
        return Ok(());
    }

    let config = MoonpalConfig::load()?;
    let store = Arc::new(SledStore::open(&config.storage_path)?.with_public_base_url(config.public_audio_base_url.clone()));
    if let Some(seed) = &args.seed {
        let (templates, statements) = store.import_seed(seed)?;
        println!("Seeded {} templates, {} statements", templates, statements);
    }

    let text = create_text_generator(&config.llm_config(), config.request_timeout());
    let speech = create_speech_synthesizer(&config.tts_config(), config.request_timeout());
    let library = AudioLibrary::new(store.clone(), text.clone(), speech.clone());

    if let Some(raw) = &args.regenerate {
        let assets = if raw == "all" {
            library.regenerate_all().await?
        } else {
            vec![library.regenerate(raw.parse::<Arousal>()?).await?]
        };
        for asset in assets {
            println!("Recorded {} clip v{}: {}", asset.arousal, asset.version, asset.original_text);
        }
        return Ok(());
    }
    if let Some(raw) = &args.playback {
        let arousal: Arousal = raw.parse()?;
        match library.playable(arousal).await? {
            Some(clip) => println!("{} [{}] {}", clip.url, clip.arousal, clip.text),
            None => println!("No available audio"),
        }
        return Ok(());
    }

    let orchestrator = RitualOrchestrator::new(store.clone(), store.clone(), text, speech);
    let user = args.user.as_deref().unwrap_or("demo-cli");
    let session_id = orchestrator.start(user, args.child.as_deref()).await?;
    info!(session_id = %session_id, "Ritual session");

    if let Some(energy) = args.energy {
        orchestrator.update_energy(&session_id, energy).await?;
    }
    if !args.tags.is_empty() {
        orchestrator.update_tags(&session_id, &args.tags).await?;
    }
    if args.note.is_some() {
        orchestrator
            .update_magic_note(&session_id, args.note.as_deref(), args.paid)
            .await?;
    }

    let Some(generated) = orchestrator.generate_text(&session_id).await else {
        eprintln!("Session {} not found", session_id);
        return Ok(());
    };
    println!("{}", generated.text);
    println!("  source: {}{}", generated.source, if generated.used_llm { " (generated)" } else { "" });

    if args.speak {
        match orchestrator.synthesize_speech(&generated.text).await {
            Ok(audio) => println!("  audio: {} ({:.1}s)", orchestrator.audio_url(&audio.id), audio.duration_seconds),
            Err(e) => {
                warn!(error = %e, "Speech synthesis failed; looking for a pre-recorded clip");
                let energy = orchestrator
                    .session(&session_id)
                    .await
                    .map(|s| s.energy_level)
                    .unwrap_or(moonpal_core::DEFAULT_ENERGY);
                match library.playable(Arousal::from_energy(energy)).await? {
                    Some(clip) => println!("  audio (pre-recorded): {}", clip.url),
                    None => eprintln!("  speech failed: {}", e),
                }
            }
        }
    }

    orchestrator.complete(&session_id).await?;
    Ok(())
}
