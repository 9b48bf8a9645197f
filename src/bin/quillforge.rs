//! quillforge CLI: 大纲、章节、记忆、咨询、插图与朗读的命令行入口
//!
//! Usage:
//!   quillforge outline <story.json>                 Generate premise and chapter outline
//!   quillforge chapter <story.json> <n>             Draft chapter n (1-based)
//!   quillforge memory <story.json> <text-file>      Extract continuity memory from text
//!   quillforge consult <story.json> <question>      Ask the story consultant
//!   quillforge beats <story.json> <n> <text-file>   Suggest beats for chapter n
//!   quillforge portrait <story.json> <character>    Render a character portrait
//!   quillforge visual <story.json> <prompt>         Render a scene visual
//!   quillforge narrate <story.json> <text-file>     Read chapter text aloud

use anyhow::{anyhow, bail, Context};
use std::future::Future;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use quillforge::{
    ContinuityMemory, CredentialResolver, FailoverOrchestrator, ForgeConfig, GenerationPipeline,
    MediaPayload, Provider, ProviderChoice, ProviderError, SessionContext, StoryConfig,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quillforge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "outline" | "chapter" | "memory" | "consult" | "beats" | "portrait" | "visual"
        | "narrate" => run(&args[1], &args[2..]).await,
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("quillforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"quillforge: 连载小说生成编排命令行工具

USAGE:
    quillforge <COMMAND> [OPTIONS]

COMMANDS:
    outline <story.json>                Generate premise and 12-20 chapter outline
    chapter <story.json> <n>            Draft chapter n (1-based)
    memory <story.json> <text-file>     Extract continuity memory from chapter text
    consult <story.json> <question>     Ask the story consultant
    beats <story.json> <n> <text-file>  Suggest three beats for chapter n from earlier text
    portrait <story.json> <character>   Render a portrait of character index (0-based)
    visual <story.json> <prompt>        Render a 16:9 scene visual
    narrate <story.json> <text-file>    Read text aloud (Gemini speech, raw PCM)
    config                              Print the effective configuration
    version                             Show version information
    help                                Show this help message

OPTIONS:
    --engine <auto|gemini|groq>         Provider choice (default: auto)
    --config <path>                     YAML configuration file
    --directive <text>                  Extra author directive
    --polish                            Run the polish pass after drafting
    --regen                             Rewrite the chapter per --directive (chapter)
    --memory <path>                     Previous chapter's memory JSON (chapter)
    --memory-out <path>                 Write the extracted memory JSON (chapter)
    --out <path>                        Write the media file (portrait, visual, narrate)

ENVIRONMENT:
    GEMINI_API_KEY / API_KEY            Gemini credential
    GROQ_API_KEY                        Groq credential
    QUILLFORGE_*                        Configuration overrides
    RUST_LOG                            Log filter (default: quillforge=info)"#
    );
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

/// Arguments that are neither flags nor flag values.
fn positionals(args: &[String]) -> Vec<&str> {
    const VALUED: [&str; 6] = [
        "--engine",
        "--config",
        "--directive",
        "--memory",
        "--memory-out",
        "--out",
    ];
    let mut out = Vec::new();
    let mut skip = false;
    for a in args {
        if skip {
            skip = false;
            continue;
        }
        if VALUED.contains(&a.as_str()) {
            skip = true;
        } else if !a.starts_with("--") {
            out.push(a.as_str());
        }
    }
    out
}

fn load_config(args: &[String]) -> anyhow::Result<ForgeConfig> {
    let config = match flag_value(args, "--config") {
        Some(path) => ForgeConfig::load(path)?,
        None => ForgeConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn cmd_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn load_story(path: &str) -> anyhow::Result<Arc<StoryConfig>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let story: StoryConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing story {path}"))?;
    Ok(Arc::new(story))
}

/// Run `op`; on `AuthRequired` at an interactive terminal, ask for a key and try once more.
/// A key that works is saved to the keyring when that is enabled.
async fn with_key_prompt<T, F, Fut>(
    credentials: &CredentialResolver,
    op: F,
) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    match op().await {
        Err(e) if e.needs_user_action() && std::io::stdin().is_terminal() => {
            let provider = e.provider.unwrap_or(Provider::Gemini);
            credentials.invalidate(provider);
            eprintln!("{}", e.message);
            eprint!("Enter {} API key: ", provider.display_name());
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_err()
                || !credentials.supply(provider, line)
            {
                return Err(e);
            }
            let retried = op().await;
            if retried.is_ok() {
                if let Err(err) = credentials.persist_supplied(provider) {
                    warn!(provider = provider.id(), "could not save key: {}", err);
                }
            }
            retried
        }
        other => other,
    }
}

fn write_media(media: &MediaPayload, out: Option<&str>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let bytes = media.decode()?;
            std::fs::write(path, &bytes).with_context(|| format!("writing {path}"))?;
            println!("Wrote {} bytes ({}) to {}", bytes.len(), media.mime_type, path);
        }
        None => println!("{}", media.data_url()),
    }
    Ok(())
}

fn chapter_number(pos: &[&str]) -> anyhow::Result<usize> {
    let n: usize = pos
        .get(1)
        .ok_or_else(|| anyhow!("missing chapter number"))?
        .parse()
        .context("chapter number")?;
    if n == 0 {
        bail!("chapters are numbered from 1");
    }
    Ok(n)
}

async fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let choice: ProviderChoice = flag_value(args, "--engine")
        .unwrap_or("auto")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let session = SessionContext::new(choice).with_polish(has_flag(args, "--polish"));
    let directive = flag_value(args, "--directive");

    let pos = positionals(args);
    let story_path = pos
        .first()
        .copied()
        .ok_or_else(|| anyhow!("missing <story.json>"))?;
    let story = load_story(story_path)?;

    let credentials = CredentialResolver::from_env();
    #[cfg(feature = "keyring-store")]
    let credentials = credentials.with_keyring();
    let credentials = Arc::new(credentials);
    let orchestrator = Arc::new(FailoverOrchestrator::from_config(&config, credentials.clone())?);
    let pipeline = GenerationPipeline::new(orchestrator);

    match command {
        "outline" => {
            let outline = with_key_prompt(&credentials, || {
                pipeline.run_outline(&session, story.clone(), directive)
            })
            .await?;
            println!("{}\n", outline.premise);
            for (i, title) in outline.outline.iter().enumerate() {
                println!("{:>2}. {}", i + 1, title);
            }
        }
        "chapter" => {
            let n = chapter_number(&pos)?;
            let prior: Option<ContinuityMemory> = match flag_value(args, "--memory") {
                Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
                None => None,
            };
            let outcome = if has_flag(args, "--regen") {
                with_key_prompt(&credentials, || {
                    pipeline.regenerate_chapter(
                        &session,
                        n - 1,
                        story.clone(),
                        prior.clone(),
                        directive,
                    )
                })
                .await?
            } else {
                with_key_prompt(&credentials, || {
                    pipeline.run_chapter(&session, n - 1, story.clone(), prior.clone(), directive)
                })
                .await?
            };
            println!("{}", outcome.text);
            if let Some(e) = &outcome.polish_error {
                eprintln!("Polish skipped: {e}");
            }
            match (&outcome.memory, flag_value(args, "--memory-out")) {
                (Some(m), Some(path)) => {
                    std::fs::write(path, serde_json::to_string_pretty(m)?)?;
                }
                (None, Some(_)) => eprintln!("No continuity memory was extracted."),
                _ => {}
            }
        }
        "memory" => {
            let text_path = pos.get(1).ok_or_else(|| anyhow!("missing <text-file>"))?;
            let text = std::fs::read_to_string(Path::new(text_path))?;
            let memory = with_key_prompt(&credentials, || {
                pipeline.extract_memory(&session, story.clone(), &text)
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&memory)?);
        }
        "consult" => {
            let question = pos[1..].join(" ");
            let reply = with_key_prompt(&credentials, || {
                pipeline.consult(&session, story.clone(), &question, directive)
            })
            .await?;
            println!("{}", reply.text);
            for link in &reply.links {
                println!("  - {} <{}>", link.title, link.uri);
            }
        }
        "beats" => {
            let n = chapter_number(&pos)?;
            let text_path = pos.get(2).ok_or_else(|| anyhow!("missing <text-file>"))?;
            let text = std::fs::read_to_string(Path::new(text_path))?;
            let beats = with_key_prompt(&credentials, || {
                pipeline.suggest_beats(&session, story.clone(), n - 1, &text)
            })
            .await?;
            for beat in &beats {
                println!("- {}", beat);
            }
        }
        "portrait" => {
            let idx: usize = pos
                .get(1)
                .ok_or_else(|| anyhow!("missing character index"))?
                .parse()
                .context("character index")?;
            let image = with_key_prompt(&credentials, || {
                pipeline.portrait(&session, story.clone(), idx)
            })
            .await?;
            write_media(&image, flag_value(args, "--out"))?;
        }
        "visual" => {
            let prompt = pos[1..].join(" ");
            let image = with_key_prompt(&credentials, || {
                pipeline.visual(&session, story.clone(), &prompt)
            })
            .await?;
            write_media(&image, flag_value(args, "--out"))?;
        }
        "narrate" => {
            let text_path = pos.get(1).ok_or_else(|| anyhow!("missing <text-file>"))?;
            let text = std::fs::read_to_string(Path::new(text_path))?;
            let audio = with_key_prompt(&credentials, || {
                pipeline.narrate(&session, story.clone(), &text)
            })
            .await?;
            write_media(&audio, flag_value(args, "--out"))?;
        }
        other => bail!("unknown command {other}"),
    }
    Ok(())
}
