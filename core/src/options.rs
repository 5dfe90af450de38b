//! Consumer options.

use serde::{Deserialize, Serialize};

/// Behavior switches for one consumer render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Do not request automatically; only `refetch` issues requests
    pub manual: bool,

    /// Consult the cache before requesting
    ///
    /// Successful responses are written to the cache regardless.
    pub use_cache: bool,

    /// Prefetch during server renders
    pub ssr: bool,

    /// Abort the outstanding request when a new one starts or the consumer unmounts
    pub auto_cancel: bool,
}

impl Options {
    /// Built-in defaults: automatic, cached, server-prefetched, auto-cancelling
    pub const DEFAULT: Self = Self {
        manual: false,
        use_cache: true,
        ssr: true,
        auto_cancel: true,
    };

    /// Shallow-merge `overrides` over these options
    #[must_use]
    pub const fn merged(self, overrides: &OptionsOverride) -> Self {
        Self {
            manual: match overrides.manual {
                Some(value) => value,
                None => self.manual,
            },
            use_cache: match overrides.use_cache {
                Some(value) => value,
                None => self.use_cache,
            },
            ssr: match overrides.ssr {
                Some(value) => value,
                None => self.ssr,
            },
            auto_cancel: match overrides.auto_cancel {
                Some(value) => value,
                None => self.auto_cancel,
            },
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Partial options supplied per call or as configured defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsOverride {
    /// See [`Options::manual`]
    pub manual: Option<bool>,
    /// See [`Options::use_cache`]
    pub use_cache: Option<bool>,
    /// See [`Options::ssr`]
    pub ssr: Option<bool>,
    /// See [`Options::auto_cancel`]
    pub auto_cancel: Option<bool>,
}

impl OptionsOverride {
    /// No overrides
    #[must_use]
    pub const fn none() -> Self {
        Self {
            manual: None,
            use_cache: None,
            ssr: None,
            auto_cancel: None,
        }
    }

    /// Override `manual`
    #[must_use]
    pub const fn manual(mut self, value: bool) -> Self {
        self.manual = Some(value);
        self
    }

    /// Override `use_cache`
    #[must_use]
    pub const fn use_cache(mut self, value: bool) -> Self {
        self.use_cache = Some(value);
        self
    }

    /// Override `ssr`
    #[must_use]
    pub const fn ssr(mut self, value: bool) -> Self {
        self.ssr = Some(value);
        self
    }

    /// Override `auto_cancel`
    #[must_use]
    pub const fn auto_cancel(mut self, value: bool) -> Self {
        self.auto_cancel = Some(value);
        self
    }
}

impl From<Options> for OptionsOverride {
    fn from(options: Options) -> Self {
        Self {
            manual: Some(options.manual),
            use_cache: Some(options.use_cache),
            ssr: Some(options.ssr),
            auto_cancel: Some(options.auto_cancel),
        }
    }
}
