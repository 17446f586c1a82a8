use crate::sync::WaitMode;

/// Environment variable selecting the default [`WaitMode`].
pub const WAIT_MODE_ENV: &str = "XCORO_WAIT_MODE";

const DEFAULT_NAME: &str = "handoff";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub wait_mode: WaitMode,
    /// Shown in log records
    pub name: String,
}

impl ChannelConfig {
    pub fn new(wait_mode: WaitMode) -> Self {
        Self {
            wait_mode,
            name: DEFAULT_NAME.to_owned(),
        }
    }

    /// Reads the wait mode from [`WAIT_MODE_ENV`].
    ///
    /// Unset means [`WaitMode::Block`]; an unparsable value is logged and
    /// also falls back to blocking.
    pub fn from_env() -> Self {
        Self::new(wait_mode_from(std::env::var(WAIT_MODE_ENV).ok().as_deref()))
    }

    pub fn with_wait_mode(mut self, wait_mode: WaitMode) -> Self {
        self.wait_mode = wait_mode;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn wait_mode_from(value: Option<&str>) -> WaitMode {
    match value.map(str::parse::<WaitMode>) {
        None => WaitMode::default(),
        Some(Ok(mode)) => mode,
        Some(Err(err)) => {
            log::warn!("{WAIT_MODE_ENV}: {err}, falling back to {}", WaitMode::default());
            WaitMode::default()
        }
    }
}
