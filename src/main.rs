use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;
use wenxin_hub::{Config, Manager};

const USAGE: &str = "用法: wenxin-hub <prompt_type> <message>...";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("加载配置失败")?;

    init_tracing(&cfg);

    let mut args = std::env::args().skip(1);
    let Some(prompt_type) = args.next() else {
        bail!("{USAGE}");
    };
    let messages: Vec<String> = args.collect();
    if messages.is_empty() {
        bail!("{USAGE}");
    }

    let manager = Manager::start(&cfg).await.context("启动百度工作池失败")?;
    if !manager.supports(&prompt_type) {
        tracing::warn!("未配置的提示词类型: {prompt_type}");
    }

    // 所有消息并发提交，由工作池按账号限速派发。
    let requests = futures::future::join_all(
        messages
            .iter()
            .map(|message| manager.request(message, &prompt_type)),
    );

    tokio::select! {
        results = requests => {
            for result in results {
                match sonic_rs::to_string(&result) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!("序列化结果失败: {e}"),
                }
            }
        }
        _ = shutdown_signal() => {}
    }

    manager.shutdown().await;
    Ok(())
}

fn init_tracing(cfg: &Config) {
    // 依赖库日志默认 warn，但本项目自身日志至少 info，避免 RUST_LOG=warn 把请求日志滤掉。
    // 供应商请求/响应体是否输出由 cfg.debug（LogLevel）单独控制。
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let env = env.trim();
    let filter = if env.is_empty() {
        EnvFilter::new("warn,wenxin_hub=info")
    } else if env.contains("wenxin_hub") {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(format!("{env},wenxin_hub=info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!(level = ?cfg.log_level(), "供应商日志等级");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("收到退出信号，准备关闭工作池...");
}
