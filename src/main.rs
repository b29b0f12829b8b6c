use anyhow::Result;
use std::path::PathBuf;

use quiz_engine::utils::logging;
use quiz_engine::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 第一个参数为可选的配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
