use crate::{Cli, Commands};
use anyhow::{bail, Context, Result};
use rpassword::prompt_password;
use sealbox_core::{
    BinaryData, BinaryRecord, Card, CardData, ClientConfig, HttpTransport, LocalCache, LoginData,
    LoginPwd, RecordKind, SyncCoordinator, SyncReport, TextData, TextRecord, Vault,
};
use sealbox_core::store::DEFAULT_BUSY_TIMEOUT;
use std::path::Path;
use zeroize::Zeroizing;

struct App {
    config: ClientConfig,
    cache: LocalCache,
    user: Option<String>,
    password: Option<Zeroizing<String>>,
    offline: bool,
}

impl App {
    fn user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .context("No account selected; pass --user or set SEALBOX_USER")
    }

    fn password(&self, prompt: &str) -> Result<Zeroizing<String>> {
        match &self.password {
            Some(password) => Ok(password.clone()),
            None => Ok(Zeroizing::new(prompt_password(prompt)?)),
        }
    }

    fn unlock(&self) -> Result<(Vault, Zeroizing<String>)> {
        let login = self.user()?;
        let password = self.password(&format!("Password for {}: ", login))?;
        let vault = Vault::unlock(self.cache.clone(), login, &password, &self.config.kdf)?;
        Ok((vault, password))
    }

    async fn connect(&self, login: &str, password: &str) -> Result<HttpTransport> {
        HttpTransport::login(
            &self.config.server_url,
            login,
            password,
            self.config.request_timeout(),
        )
        .await
        .with_context(|| format!("Could not authenticate with {}", self.config.server_url))
    }

    fn coordinator(&self, transport: HttpTransport) -> SyncCoordinator<HttpTransport> {
        SyncCoordinator::new(self.cache.clone(), transport)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load_or_default(cli.config.as_deref())?;
    let cache = open_cache(&config.cache_path())?;
    let ctx = App {
        config,
        cache,
        user: cli.user,
        password: cli.password.map(Zeroizing::new),
        offline: cli.offline,
    };

    match cli.command {
        Commands::Register { login } => register(&ctx, &login).await,
        Commands::Login { login } => login_cmd(&ctx, &login).await,

        Commands::AddCard {
            number,
            date,
            code,
            prompt,
            note,
        } => {
            let (vault, password) = ctx.unlock()?;
            vault.add_card(&CardData {
                number,
                date,
                code,
                prompt,
                note,
            })?;
            after_change(&ctx, &vault, &password).await
        }
        Commands::AddLogin {
            prompt,
            login,
            secret,
            note,
        } => {
            let (vault, password) = ctx.unlock()?;
            let secret = match secret {
                Some(secret) => secret,
                None => prompt_password(format!("Secret for {} at {}: ", login, prompt))?,
            };
            vault.add_login(&LoginData {
                prompt,
                login,
                password: secret,
                note,
            })?;
            after_change(&ctx, &vault, &password).await
        }
        Commands::AddText { prompt, text, note } => {
            let (vault, password) = ctx.unlock()?;
            vault.add_text(&TextData { prompt, text, note })?;
            after_change(&ctx, &vault, &password).await
        }
        Commands::AddBinary { prompt, file, note } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let (vault, password) = ctx.unlock()?;
            vault.add_binary(&BinaryData {
                prompt,
                bytes,
                note,
            })?;
            after_change(&ctx, &vault, &password).await
        }

        Commands::GetCard { number } => {
            let (vault, _) = ctx.unlock()?;
            print_card(&vault.card(&number)?);
            Ok(())
        }
        Commands::GetLogin { prompt, login } => {
            let (vault, _) = ctx.unlock()?;
            let data = vault.login_pwd(&prompt, &login)?;
            println!("{} / {}", data.prompt, data.login);
            println!("  password: {}", data.password);
            print_note(&data.note);
            Ok(())
        }
        Commands::GetText { prompt } => {
            let (vault, _) = ctx.unlock()?;
            let data = vault.text(&prompt)?;
            println!("{}", data.text);
            print_note(&data.note);
            Ok(())
        }
        Commands::GetBinary { prompt, out } => {
            let (vault, _) = ctx.unlock()?;
            let data = vault.binary(&prompt)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &data.bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {} bytes to {}", data.bytes.len(), path.display());
                }
                None => println!("{}: {} bytes", data.prompt, data.bytes.len()),
            }
            print_note(&data.note);
            Ok(())
        }

        Commands::List { kind } => {
            let (vault, _) = ctx.unlock()?;
            let kinds = match kind {
                Some(kind) => vec![RecordKind::from(kind)],
                None => RecordKind::ALL.to_vec(),
            };
            for kind in kinds {
                list(&vault, kind)?;
            }
            Ok(())
        }

        Commands::Sync => {
            let (vault, password) = ctx.unlock()?;
            let transport = ctx.connect(vault.login(), &password).await?;
            let report = ctx.coordinator(transport).sync(vault.session()).await?;
            print_report(&report);
            Ok(())
        }

        Commands::ForcePush { kind, key } => {
            let (vault, password) = ctx.unlock()?;
            let kind = RecordKind::from(kind);
            let parts: Vec<&str> = key.iter().map(String::as_str).collect();
            let record_key = vault.session().record_key(kind, &parts)?;
            let coordinator = ctx.coordinator(ctx.connect(vault.login(), &password).await?);
            let session = vault.session();
            match kind {
                RecordKind::Card => coordinator.force_push::<Card>(session, &record_key).await?,
                RecordKind::Login => {
                    coordinator
                        .force_push::<LoginPwd>(session, &record_key)
                        .await?
                }
                RecordKind::Text => {
                    coordinator
                        .force_push::<TextRecord>(session, &record_key)
                        .await?
                }
                RecordKind::Binary => {
                    coordinator
                        .force_push::<BinaryRecord>(session, &record_key)
                        .await?
                }
            }
            println!("Server copy of {} {} replaced", kind, key.join(" / "));
            Ok(())
        }
        Commands::ForcePull { kind, key } => {
            let (vault, password) = ctx.unlock()?;
            let kind = RecordKind::from(kind);
            let parts: Vec<&str> = key.iter().map(String::as_str).collect();
            let record_key = vault.session().record_key(kind, &parts)?;
            let coordinator = ctx.coordinator(ctx.connect(vault.login(), &password).await?);
            let session = vault.session();
            match kind {
                RecordKind::Card => {
                    coordinator.force_pull::<Card>(session, &record_key).await?;
                }
                RecordKind::Login => {
                    coordinator
                        .force_pull::<LoginPwd>(session, &record_key)
                        .await?;
                }
                RecordKind::Text => {
                    coordinator
                        .force_pull::<TextRecord>(session, &record_key)
                        .await?;
                }
                RecordKind::Binary => {
                    coordinator
                        .force_pull::<BinaryRecord>(session, &record_key)
                        .await?;
                }
            }
            println!("Local copy of {} {} replaced", kind, key.join(" / "));
            Ok(())
        }
    }
}

fn open_cache(path: &Path) -> Result<LocalCache> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    LocalCache::open(path, DEFAULT_BUSY_TIMEOUT)
        .with_context(|| format!("Failed to open cache at {}", path.display()))
}

async fn register(ctx: &App, login: &str) -> Result<()> {
    let password = match &ctx.password {
        Some(password) => password.clone(),
        None => {
            let first = Zeroizing::new(prompt_password(format!("New password for {}: ", login))?);
            let second = Zeroizing::new(prompt_password("Confirm password: ")?);
            if first != second {
                bail!("Passwords do not match");
            }
            first
        }
    };
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let transport = HttpTransport::register(
        &ctx.config.server_url,
        login,
        &password,
        ctx.config.request_timeout(),
    )
    .await?;
    let vault = Vault::enroll(ctx.cache.clone(), login, &password, &ctx.config.kdf)?;
    println!("Registered {}", login);

    let report = ctx.coordinator(transport).sync(vault.session()).await?;
    print_report(&report);
    Ok(())
}

async fn login_cmd(ctx: &App, login: &str) -> Result<()> {
    let password = ctx.password(&format!("Password for {}: ", login))?;
    let transport = ctx.connect(login, &password).await?;
    let vault = Vault::enroll(ctx.cache.clone(), login, &password, &ctx.config.kdf)?;
    println!("Logged in as {}", login);

    let report = ctx.coordinator(transport).sync(vault.session()).await?;
    print_report(&report);
    Ok(())
}

/// Push a local change right away unless offline. A failed attempt keeps
/// the change in the cache for the next sync.
async fn after_change(ctx: &App, vault: &Vault, password: &str) -> Result<()> {
    println!("Saved");
    if ctx.offline {
        return Ok(());
    }

    let outcome = async {
        let transport = ctx.connect(vault.login(), password).await?;
        ctx.coordinator(transport).sync(vault.session()).await.map_err(anyhow::Error::from)
    }
    .await;

    match outcome {
        Ok(report) => print_report(&report),
        Err(e) => {
            tracing::warn!("Sync after change failed: {:#}", e);
            eprintln!("Change kept locally; run `sealbox sync` when the server is reachable");
        }
    }
    Ok(())
}

fn list(vault: &Vault, kind: RecordKind) -> Result<()> {
    match kind {
        RecordKind::Card => {
            for card in vault.cards()? {
                println!("card   {}  {}", card.number, card.prompt);
            }
        }
        RecordKind::Login => {
            for login in vault.logins()? {
                println!("login  {} / {}", login.prompt, login.login);
            }
        }
        RecordKind::Text => {
            for text in vault.texts()? {
                println!("text   {}", text.prompt);
            }
        }
        RecordKind::Binary => {
            for binary in vault.binaries()? {
                println!("binary {}  ({} bytes)", binary.prompt, binary.bytes.len());
            }
        }
    }
    Ok(())
}

fn print_card(card: &CardData) {
    println!("{}  {}", card.number, card.prompt);
    println!("  expires: {}", card.date);
    println!("  code:    {}", card.code);
    print_note(&card.note);
}

fn print_note(note: &str) {
    if !note.is_empty() {
        println!("  note:    {}", note);
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "Synced: {} sent, {} received (as of {})",
        report.pushed, report.pulled, report.last_sync
    );
    for error in &report.errors {
        eprintln!("  not stored on server: {}", error);
    }
    if !report.errors.is_empty() {
        eprintln!("Use force-push or force-pull to settle these records");
    }
}
