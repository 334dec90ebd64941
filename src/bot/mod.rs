pub mod delivery;
pub mod sessions;
pub mod telegram;

use crate::config::Config;
use anyhow::Result;

pub async fn run(config: Config) -> Result<()> {
    telegram::run(config).await
}
