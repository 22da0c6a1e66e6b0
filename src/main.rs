use anyhow::Result;
use exercise_pool::utils::logging;
use exercise_pool::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load(None)?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行补货（题目保存在 replenish.items_file）
    App::initialize(config).await?.run().await?;

    Ok(())
}
