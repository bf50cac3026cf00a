use specseek::SpecSeekError;

#[derive(Debug)]
pub enum CliError {
    Config {
        source: String,
    },
    Io {
        source: String,
        path: Option<String>,
    },
    Core {
        source: SpecSeekError,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config { source } => write!(f, "Error interpreting arguments: {}", source),
            CliError::Io { source, path } => {
                if let Some(path) = path {
                    write!(f, "Error reading file {}: {}", path, source)
                } else {
                    write!(f, "Error reading file: {}", source)
                }
            }
            CliError::Core { source } => write!(f, "{}", source),
        }
    }
}

impl From<SpecSeekError> for CliError {
    fn from(e: SpecSeekError) -> Self {
        CliError::Core { source: e }
    }
}
