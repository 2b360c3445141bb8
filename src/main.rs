use std::sync::Arc;

use maildeck::assistant::{ChatGateway, GuidelineStore, OpenRouterClient};
use maildeck::auth::{AccountDirectory, SessionKeys};
use maildeck::config::{AssistantConfig, AuthConfig, ImapConfig, SmtpConfig};
use maildeck::mail::{
    ImapTransport, LogSender, MailSender, MailService, MailServiceConfig, MailTransport,
    SmtpSender,
};
use maildeck::server::{self, AppContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let auth_config = AuthConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export SESSION_SECRET=<long random string>");
        std::process::exit(1);
    });

    let http_port: u16 = std::env::var("MAILDECK_HTTP_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    eprintln!("📬 maildeck v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", http_port);

    // ── Mailbox ─────────────────────────────────────────────────────────
    let imap_config = ImapConfig::from_env();
    if imap_config.is_configured() {
        eprintln!(
            "   IMAP: {}:{} ({})",
            imap_config.host, imap_config.port, imap_config.mailbox
        );
    } else {
        eprintln!("   IMAP: not configured (inbox reads return empty)");
    }
    let transport: Arc<dyn MailTransport> = Arc::new(ImapTransport::new(imap_config.clone()));

    let sender: Arc<dyn MailSender> = match SmtpConfig::from_env() {
        Some(smtp_config) => {
            eprintln!("   SMTP: {}:{}", smtp_config.host, smtp_config.port);
            Arc::new(SmtpSender::new(smtp_config))
        }
        None => {
            eprintln!("   SMTP: log-only (SMTP_HOST not set)");
            Arc::new(LogSender)
        }
    };

    let mail = Arc::new(MailService::new(
        transport,
        sender,
        MailServiceConfig::from_imap(&imap_config),
    ));

    // ── Assistant ───────────────────────────────────────────────────────
    let assistant_config = AssistantConfig::from_env();
    if assistant_config.api_key.is_some() {
        eprintln!("   Assistant: {}", assistant_config.model);
    } else {
        eprintln!("   Assistant: disabled (OPENROUTER_API_KEY not set)");
    }
    let guidelines = Arc::new(GuidelineStore::from_env());
    let gateway = Arc::new(ChatGateway::new(
        Arc::new(OpenRouterClient::new(assistant_config)),
        Arc::clone(&guidelines),
        Arc::clone(&mail),
    ));

    // ── Accounts and sessions ───────────────────────────────────────────
    let accounts = Arc::new(AccountDirectory::new(&auth_config));
    let keys = Arc::new(SessionKeys::new(&auth_config.session_secret));
    eprintln!("   Admin login: {}\n", auth_config.admin_email);

    let app = server::router(AppContext {
        mail,
        gateway,
        guidelines,
        accounts,
        keys,
        imap: imap_config,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", http_port)).await?;
    tracing::info!(port = http_port, "maildeck server started");
    axum::serve(listener, app).await?;

    Ok(())
}
