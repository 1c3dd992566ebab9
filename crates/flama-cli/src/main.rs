use clap::{Parser, Subcommand};
use flama_agent::{GeminiBackend, ModelConfig, Responder};
use flama_chat::{HandoffOpener, Orchestrator, OrchestratorConfig};
use flama_core::{Department, Role};
use flama_knowledge::{
    export_backup, grounding_for, AttendantConfig, FileSupportStore, KnowledgeEntry, SupportStore,
};
use flama_session::FileSessionStore;
use flama_voice::{
    CaptureConfig, CpalMicrophone, CpalSink, GeminiLiveConfig, GeminiLiveConnector, VoicePipeline,
    VoiceState, VoiceUpdate,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const VOICE_OUTPUT_RATE: u32 = 24_000;

#[derive(Parser)]
#[command(name = "flama", about = "Flama — Central de Atendimento do Colégio Flama")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flama.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive support chat
    Chat {
        /// Enable the live voice session commands
        #[arg(long)]
        voice: bool,
    },
    /// Export knowledge, attendants, and chat logs as a JSON backup
    Export {
        /// Directory the backup file is written to
        #[arg(long, default_value = "./exports")]
        dir: PathBuf,
    },
    /// Inspect the mirrored chat log
    Logs {
        /// Newest-first page size
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        /// Delete every log entry instead of listing
        #[arg(long)]
        clear: bool,
    },
    /// Manage the knowledge base
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },
    /// Manage attendant contacts
    Attendants {
        #[command(subcommand)]
        action: AttendantAction,
    },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// List entries for one department
    List { department: Department },
    /// Add one entry
    Add {
        department: Department,
        topic: String,
        content: String,
        #[arg(default_value = "")]
        keywords: String,
    },
    /// Delete an entry by id
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum AttendantAction {
    /// List configured attendants
    List,
    /// Set the attendant for one department
    Set {
        department: Department,
        name: String,
        phone: String,
    },
}

#[derive(Deserialize)]
struct FlamaConfig {
    model: ModelConfig,
    #[serde(default)]
    voice: Option<GeminiLiveConfig>,
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl FlamaConfig {
    /// Let GEMINI_API_KEY fill any key left empty in the file, so the
    /// config can be committed without secrets.
    fn resolve_keys(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if self.model.api_key.is_empty() {
                self.model.api_key = key.clone();
            }
            if let Some(voice) = self.voice.as_mut() {
                if voice.api_key.is_empty() {
                    voice.api_key = key;
                }
            }
        }
    }
}

/// Terminal handoff: print the deep link for the user to open.
struct TerminalOpener;

impl HandoffOpener for TerminalOpener {
    fn open(&self, url: &str) {
        println!("🔗 Abra o WhatsApp: {url}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let mut config: FlamaConfig = toml::from_str(&config_str)?;
    config.resolve_keys();

    let support: Arc<dyn SupportStore> = Arc::new(
        FileSupportStore::new(config.data_dir.join("support")).await?,
    );

    match cli.command {
        Commands::Chat { voice } => run_chat(config, support, voice).await?,
        Commands::Export { dir } => {
            tokio::fs::create_dir_all(&dir).await?;
            let path = export_backup(support.as_ref(), &dir).await?;
            println!("Backup gravado em {}", path.display());
        }
        Commands::Logs { limit, clear } => {
            if clear {
                support.clear_logs().await?;
                println!("Log de conversas apagado.");
            } else {
                let logs = support.list_logs(limit).await?;
                if logs.is_empty() {
                    println!("Nenhuma mensagem registrada.");
                }
                for entry in &logs {
                    println!(
                        "{} [{}] {}: {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.department,
                        entry.role.as_str(),
                        entry.text
                    );
                }
            }
        }
        Commands::Knowledge { action } => match action {
            KnowledgeAction::List { department } => {
                let entries = support.list_knowledge(department).await?;
                if entries.is_empty() {
                    println!("Nenhum registro para {department}.");
                }
                for entry in &entries {
                    println!("{}  {} — {}", entry.id, entry.topic, entry.content);
                }
            }
            KnowledgeAction::Add {
                department,
                topic,
                content,
                keywords,
            } => {
                let entry = KnowledgeEntry::new(department, topic, content, keywords);
                let id = entry.id;
                support.add_knowledge(entry).await?;
                println!("Registro criado: {id}");
            }
            KnowledgeAction::Delete { id } => {
                if support.delete_knowledge(id).await? {
                    println!("Registro removido.");
                } else {
                    println!("Nenhum registro com esse id.");
                }
            }
        },
        Commands::Attendants { action } => match action {
            AttendantAction::List => {
                let attendants = support.list_attendants().await?;
                if attendants.is_empty() {
                    println!("Nenhum atendente configurado.");
                }
                for attendant in &attendants {
                    println!(
                        "[{}] {} — {}",
                        attendant.department, attendant.name, attendant.phone
                    );
                }
            }
            AttendantAction::Set {
                department,
                name,
                phone,
            } => {
                support
                    .upsert_attendants(vec![AttendantConfig {
                        department,
                        name,
                        phone,
                    }])
                    .await?;
                println!("Atendente de {department} atualizado.");
            }
        },
    }

    Ok(())
}

async fn run_chat(
    config: FlamaConfig,
    support: Arc<dyn SupportStore>,
    voice_enabled: bool,
) -> anyhow::Result<()> {
    let sessions = Arc::new(FileSessionStore::new(config.data_dir.join("session")).await?);
    let model = GeminiBackend::new(config.model);
    let responder = Arc::new(Responder::new(Box::new(model), Arc::clone(&support)));

    let orchestrator = Arc::new(
        Orchestrator::load(
            sessions,
            Arc::clone(&support),
            responder,
            Arc::new(TerminalOpener),
            OrchestratorConfig::default(),
        )
        .await,
    );

    let voice = match (voice_enabled, config.voice) {
        (true, Some(voice_config)) => {
            let connector = Arc::new(GeminiLiveConnector::new(voice_config));
            let microphone = Arc::new(CpalMicrophone::new(CaptureConfig::default()));
            let sink = Arc::new(CpalSink::new(VOICE_OUTPUT_RATE)?);
            let (pipeline, updates) = VoicePipeline::new(connector, microphone, sink);
            let pipeline = Arc::new(pipeline);
            spawn_voice_printer(updates, Arc::clone(&orchestrator));
            Some(pipeline)
        }
        (true, None) => {
            println!("Voz desativada: configure a seção [voice] no arquivo de configuração.");
            None
        }
        _ => None,
    };

    println!("Central Flama — digite /ajuda para ver os comandos.\n");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    let mut printed = print_session(&orchestrator, 0).await;
    if orchestrator.session().await.department.is_none() {
        printed = select_department(&orchestrator, &mut lines).await?;
    }

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/sair" => break,
            "/ajuda" => {
                println!("/setor      escolher outro departamento");
                println!("/transferir falar com um atendente humano");
                println!("/voz        iniciar ou encerrar a sessão de voz");
                println!("/reset      recomeçar a conversa");
                println!("/sair       encerrar");
                continue;
            }
            "/reset" => {
                orchestrator.reset().await;
                printed = select_department(&orchestrator, &mut lines).await?;
                continue;
            }
            "/setor" => {
                printed = select_department(&orchestrator, &mut lines).await?;
                continue;
            }
            "/transferir" => {
                orchestrator.escalate().await;
            }
            "/voz" => {
                match &voice {
                    Some(pipeline) => {
                        let session = orchestrator.session().await;
                        let department = session.department.unwrap_or(Department::General);
                        // An empty query matches the whole department base.
                        let grounding = grounding_for(support.as_ref(), department, "").await;
                        if pipeline.state() == VoiceState::Inactive {
                            println!("🎙️ Sessão de voz iniciada. Use /voz para encerrar.");
                        }
                        pipeline.toggle(department, &grounding).await;
                    }
                    None => println!("Voz indisponível. Inicie com --voice e configure [voice]."),
                }
                continue;
            }
            text => {
                orchestrator.send_user_message(text).await;
            }
        }
        printed = print_session(&orchestrator, printed).await;
    }

    if let Some(pipeline) = &voice {
        pipeline.stop().await;
    }
    info!("Chat encerrado");
    Ok(())
}

/// Print any messages appended since the last call; returns the new count.
async fn print_session(orchestrator: &Orchestrator, printed: usize) -> usize {
    let session = orchestrator.session().await;
    for message in &session.messages[printed.min(session.messages.len())..] {
        let prefix = match message.role {
            Role::User => "Você",
            Role::Bot => "🤖",
            Role::Human => "👤",
            Role::System => "ℹ️",
        };
        println!("{prefix}: {}", message.text);
        if let Some(actions) = &message.suggested_actions {
            println!("   [{}]", actions.join(" | "));
        }
    }
    session.messages.len()
}

async fn select_department(
    orchestrator: &Arc<Orchestrator>,
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
) -> anyhow::Result<usize> {
    println!("Escolha o setor:");
    for (i, department) in Department::ALL.iter().enumerate() {
        println!("  {}. {department}", i + 1);
    }

    while let Some(line) = lines.next_line().await? {
        if let Ok(choice) = line.trim().parse::<usize>() {
            if (1..=Department::ALL.len()).contains(&choice) {
                orchestrator
                    .select_department(Department::ALL[choice - 1])
                    .await;
                return Ok(print_session(orchestrator, 0).await);
            }
        }
        println!("Digite um número entre 1 e {}.", Department::ALL.len());
    }
    Ok(0)
}

/// Mirror voice updates onto the terminal and flush completed turns into
/// the conversation.
fn spawn_voice_printer(
    mut updates: tokio::sync::mpsc::Receiver<VoiceUpdate>,
    orchestrator: Arc<Orchestrator>,
) {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update {
                VoiceUpdate::Live(Some(line)) => println!("{line}"),
                VoiceUpdate::Live(None) => {}
                VoiceUpdate::Turn { role, text } => {
                    orchestrator.append_voice_turn(role, &text).await;
                }
                VoiceUpdate::Notice(notice) => println!("⚠️ {notice}"),
                VoiceUpdate::Stopped => println!("🎙️ Sessão de voz encerrada."),
            }
        }
    });
}
