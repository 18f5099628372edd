use clap::{Parser, Subcommand};

impl Cli {
    /// 解析命令行参数
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

/// tokenpair - access/refresh token 对签发与刷新服务
#[derive(Parser, Debug, Default)]
#[command(name = "tokenpair")]
#[command(version)]
#[command(about = "签发成对的 access/refresh token，refresh token 只能使用一次", long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, value_name = "FILE", help = "指定配置文件路径")]
    pub config_file: Option<String>,

    /// 服务器监听地址
    #[arg(long, value_name = "ADDRESS", help = "服务器监听地址")]
    pub host: Option<String>,

    /// HTTP 端口
    #[arg(long, value_name = "PORT", help = "HTTP 监听端口")]
    pub port: Option<u16>,

    /// 日志级别
    #[arg(
        long,
        value_name = "LEVEL",
        help = "日志级别: trace, debug, info, warn, error"
    )]
    pub log_level: Option<String>,

    /// 日志格式
    #[arg(long, value_name = "FORMAT", help = "日志格式: pretty, json, compact")]
    pub log_format: Option<String>,

    /// 日志文件路径
    #[arg(long, value_name = "PATH", help = "日志输出文件路径（按天滚动）")]
    pub log_file: Option<String>,

    /// 数据库连接 URL
    #[arg(long, value_name = "URL", help = "数据库连接字符串")]
    pub database_url: Option<String>,

    /// 签名密钥
    #[arg(long, value_name = "SECRET", help = "token 签名密钥（至少 32 字节）")]
    pub auth_secret: Option<String>,

    /// refresh 记录存储后端
    #[arg(long, value_name = "BACKEND", help = "refresh 记录存储: postgres, memory")]
    pub store: Option<String>,

    /// 启用监控指标
    #[arg(long, help = "启用 Prometheus 监控指标")]
    pub enable_metrics: bool,

    /// 详细输出（可重复使用：-v, -vv, -vvv）
    #[arg(short, action = clap::ArgAction::Count, help = "详细输出级别")]
    pub verbose: u8,

    /// 静默模式
    #[arg(long, short = 'q', help = "静默模式（只输出错误）")]
    pub quiet: bool,

    /// 开发模式（等同于 --log-level debug --log-format pretty --store memory）
    #[arg(long, help = "启用开发模式")]
    pub dev: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 生成默认配置文件（包含随机生成的签名密钥）
    GenerateConfig {
        /// 输出文件路径
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 验证配置文件
    ValidateConfig {
        /// 配置文件路径
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 显示最终配置（合并后的配置，密钥打码）
    ShowConfig,
    /// 执行数据库迁移
    Migrate,
    /// 添加用户
    AddUser {
        /// 用户 GUID
        #[arg(value_name = "UUID")]
        user_id: String,
    },
}

impl Cli {
    /// 获取日志级别（考虑 verbose 和 quiet）
    pub fn get_log_level(&self) -> Option<String> {
        if self.quiet {
            return Some("error".to_string());
        }

        if self.dev {
            return Some("debug".to_string());
        }

        if let Some(level) = &self.log_level {
            return Some(level.clone());
        }

        match self.verbose {
            0 => None,
            1 => Some("info".to_string()),
            2 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        }
    }

    /// 获取日志格式
    pub fn get_log_format(&self) -> Option<String> {
        if self.dev {
            return Some("pretty".to_string());
        }
        self.log_format.clone()
    }

    /// 获取存储后端
    pub fn get_store(&self) -> Option<String> {
        if self.store.is_some() {
            return self.store.clone();
        }
        if self.dev {
            return Some("memory".to_string());
        }
        None
    }
}
