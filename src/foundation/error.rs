/// Convenience result type used across renderchain.
pub type ChainResult<T> = Result<T, ChainError>;

/// Top-level error taxonomy used by the filter graph engine.
#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    /// A realized value disagrees with the description declared for it earlier.
    ///
    /// Always a bug in a concrete filter; never tolerated silently.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The pool or device could not allocate a requested texture.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// A dependency failed while it was being rendered on demand.
    #[error("upstream failure in '{stage}'")]
    Upstream {
        /// Tag of the filter whose render action failed.
        stage: String,
        /// The error raised by that filter or one of its own dependencies.
        #[source]
        source: Box<ChainError>,
    },

    /// The configured chain cannot be compiled for the current source/target.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChainError {
    /// Build a [`ChainError::ContractViolation`] value.
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }

    /// Build a [`ChainError::ResourceExhaustion`] value.
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhaustion(msg.into())
    }

    /// Build a [`ChainError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wrap `source` as a failure of the filter tagged `stage`.
    pub fn upstream(stage: impl Into<String>, source: ChainError) -> Self {
        Self::Upstream {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Return `true` for [`ChainError::ContractViolation`], looking through upstream wrappers.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self.innermost_chain_error(), Self::ContractViolation(_))
    }

    /// Return `true` for [`ChainError::ResourceExhaustion`], looking through upstream wrappers.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self.innermost_chain_error(), Self::ResourceExhaustion(_))
    }

    /// Innermost error in the `source()` chain (may be `self`).
    pub fn innermost(&self) -> &(dyn std::error::Error + 'static) {
        let mut cur: &(dyn std::error::Error + 'static) = self;
        while let Some(next) = cur.source() {
            cur = next;
        }
        cur
    }

    /// Innermost error that is still a [`ChainError`].
    pub fn innermost_chain_error(&self) -> &ChainError {
        let mut cur = self;
        while let Self::Upstream { source, .. } = cur {
            cur = source;
        }
        cur
    }

    /// Render the cause chain outermost-first, one frame per line.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        let mut cur: Option<&(dyn std::error::Error + 'static)> = Some(self);
        let mut depth = 0usize;
        while let Some(e) = cur {
            if depth > 0 {
                out.push('\n');
            }
            out.push_str(&format!("  {depth}: {e}"));
            depth += 1;
            cur = e.source();
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
