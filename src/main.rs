//! Narratoria - 三阶段叙事智能体
//!
//! 入口：加载配置、初始化日志、装配引擎与工具，并运行行式 REPL。

use std::path::PathBuf;

use anyhow::Context;
use narratoria::{agent::create_agent_components, config::load_config, observability, repl::Repl};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 可选：第一个参数为额外的配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let components = create_agent_components(&cfg).context("Failed to create engine")?;

    Repl::new(components).run().await.context("REPL failed")?;
    Ok(())
}
