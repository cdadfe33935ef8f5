pub type VektaResult<T> = Result<T, VektaError>;

#[derive(thiserror::Error, Debug)]
pub enum VektaError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("pixel format error: {0}")]
    Format(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VektaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VektaError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(VektaError::render("x").to_string().contains("render error:"));
        assert!(
            VektaError::format("x")
                .to_string()
                .contains("pixel format error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VektaError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
