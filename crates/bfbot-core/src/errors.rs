/// Core error type for the bot.
///
/// The adapter crate maps transport failures where it classifies them; only
/// the conditions the core itself raises live here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
