use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use std::fs;
use std::process;
use tokenpair::{
    auth::{PgDirectory, Principal, PrincipalDirectory},
    cli::{Cli, Commands},
    config::{self, ServerConfig},
    infra::Database,
    logging, TokenPairServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // 快速读取 config.toml 的 [logging] 段（不加载完整配置）
    let early_log = config::load_early_logging_config(cli.config_file.as_deref());

    // 合并日志配置（优先级：CLI > config.toml > 默认值）
    let log_level = cli
        .get_log_level()
        .or(early_log.level)
        .unwrap_or_else(|| "info".to_string());
    let log_format = cli.get_log_format().or(early_log.format);
    let log_file = cli.log_file.clone().or(early_log.file);

    // 子命令只输出到终端
    if let Some(command) = &cli.command {
        logging::init_logging(&log_level, log_format.as_deref(), None, cli.quiet)?;
        return match command {
            Commands::GenerateConfig { path } => generate_config(path),
            Commands::ValidateConfig { path } => validate_config(path),
            Commands::ShowConfig => show_config(&cli),
            Commands::Migrate => run_migrate(&cli).await,
            Commands::AddUser { user_id } => add_user(&cli, user_id).await,
        };
    }

    let _log_guard = logging::init_logging(
        &log_level,
        log_format.as_deref(),
        log_file.as_deref(),
        cli.quiet,
    )?;

    tracing::info!("🚀 tokenpair starting...");

    let config = ServerConfig::load(&cli).context("加载配置失败")?;

    tracing::info!("📊 Server Configuration:");
    tracing::info!("  - Listen: {}:{}", config.host, config.port);
    tracing::info!("  - Store: {}", config.store);
    tracing::info!("  - Token Hash: {}", config.token_hash);
    tracing::info!("  - Access TTL: {}s", config.access_token_ttl_secs);
    tracing::info!("  - Refresh TTL: {}s", config.refresh_token_ttl_secs);
    tracing::info!("  - Store Timeout: {}s", config.store_timeout_secs);
    tracing::info!("  - Log Level: {}", config.log_level);
    if let Some(f) = &log_file {
        tracing::info!("  - Log File: {}", f);
    }

    let server = match TokenPairServer::new(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("❌ 服务器初始化失败: {:#}", e);
            tracing::error!("💡 请检查配置和数据库连接后重试");
            process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("❌ 服务器运行失败: {:#}", e);
        process::exit(1);
    }

    Ok(())
}

/// 生成默认配置文件（包含随机签名密钥）
fn generate_config(path: &str) -> Result<()> {
    let mut secret = [0u8; 48];
    rand::thread_rng().fill_bytes(&mut secret);
    let content = config::config_template(&URL_SAFE_NO_PAD.encode(secret));

    fs::write(path, content).with_context(|| format!("无法写入配置文件: {}", path))?;

    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

/// 验证配置文件
fn validate_config(path: &str) -> Result<()> {
    let config = ServerConfig::from_toml_file(path)
        .with_context(|| format!("配置文件验证失败: {}", path))?;
    config
        .validate()
        .with_context(|| format!("配置文件验证失败: {}", path))?;

    println!("✅ 配置文件有效: {}", path);
    println!("📊 配置摘要:");
    println!("  - Listen: {}:{}", config.host, config.port);
    println!("  - Store: {}", config.store);
    println!("  - Token Hash: {}", config.token_hash);
    println!("  - Seed Users: {}", config.seed_users.len());

    Ok(())
}

/// 显示最终配置（合并后的配置，密钥打码）
fn show_config(cli: &Cli) -> Result<()> {
    let config = ServerConfig::load(cli).context("加载配置失败")?;

    println!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(&config.masked())?);

    Ok(())
}

async fn connect(cli: &Cli) -> Result<(ServerConfig, Database)> {
    let config = ServerConfig::load(cli).context("加载配置失败")?;
    let database = Database::connect(&config.database_url, config.store_timeout())
        .await
        .context("数据库连接失败，请检查 DATABASE_URL")?;
    Ok((config, database))
}

/// 执行数据库迁移
async fn run_migrate(cli: &Cli) -> Result<()> {
    let (_, database) = connect(cli).await?;

    let count = database.migrate().await?;
    if count == 0 {
        println!("✅ 数据库已是最新，无需迁移");
    } else {
        println!("✅ 成功执行 {} 个迁移", count);
    }

    database.close().await;
    Ok(())
}

/// 添加用户
async fn add_user(cli: &Cli, user_id: &str) -> Result<()> {
    let principal: Principal = user_id.parse()?;
    let (config, database) = connect(cli).await?;

    PgDirectory::new(database.pool().clone(), config.store_timeout())
        .add(principal)
        .await
        .with_context(|| format!("添加用户失败: {}", principal))?;

    println!("✅ 用户已添加: {}", principal);
    database.close().await;
    Ok(())
}
